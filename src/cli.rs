use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "scratchscript",
    about = "ScratchScript compiler: turns .scrs source into Scratch 3 (.sb3) projects."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a source file into an .sb3 project.
    #[command(alias = "compile")]
    Build {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(
            short,
            long,
            value_name = "OUTPUT",
            help = "Where to write the project. Defaults to INPUT with an .sb3 extension."
        )]
        output: Option<PathBuf>,

        #[arg(short, long, help = "Print compiler debug logs to stderr.")]
        console: bool,

        #[arg(
            long,
            default_value = "Sprite1",
            help = "Name of the sprite that receives the compiled scripts."
        )]
        sprite: String,
    },

    /// Show the catalog entry for a diagnostic code, e.g. E11.
    Explain {
        #[arg(value_name = "CODE")]
        code: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_flags() {
        let args = Args::parse_from(["scratchscript", "build", "main.scrs", "-o", "out.sb3", "-c"]);
        match args.command {
            Command::Build {
                input,
                output,
                console,
                sprite,
            } => {
                assert_eq!(input, PathBuf::from("main.scrs"));
                assert_eq!(output, Some(PathBuf::from("out.sb3")));
                assert!(console);
                assert_eq!(sprite, "Sprite1");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_compile_alias() {
        let args = Args::parse_from(["scratchscript", "compile", "main.scrs"]);
        assert!(matches!(args.command, Command::Build { .. }));
    }

    #[test]
    fn test_explain() {
        let args = Args::parse_from(["scratchscript", "explain", "E3"]);
        assert!(matches!(args.command, Command::Explain { code } if code == "E3"));
    }
}
