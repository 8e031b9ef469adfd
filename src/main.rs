use anyhow::Result;
use clap::Parser;
use scratchscript_core::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    scratchscript_core::run_cli(&args)
}
