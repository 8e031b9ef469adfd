pub mod ast;
pub mod attach;
pub mod block;
pub mod builder;
pub mod cli;
pub mod custom_block;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod primitives;
pub mod project;
pub mod target;
pub mod types;
pub mod visitor;

use anyhow::Result;
use ast::Program;
use cli::Command;
use diagnostic::{CompileError, Diagnostic};
use lexer::Lexer;
use parser::Parser as SsParser;
use project::ProjectCompiler;
use std::path::{Path, PathBuf};
use visitor::Visitor;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Sprite that receives scripts unless `@stage` redirects them.
    pub sprite_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            sprite_name: "Sprite1".to_string(),
        }
    }
}

/// Result of one compilation. Diagnostics live on the session.
#[derive(Debug)]
pub struct Compilation {
    pub project: ProjectCompiler,
}

impl Compilation {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.project.diagnostics()
    }

    pub fn success(&self) -> bool {
        self.project.success()
    }
}

pub fn run_cli(args: &cli::Args) -> Result<()> {
    match &args.command {
        Command::Explain { code } => match diagnostic::explain(code) {
            Some(text) => {
                println!("{}", text);
                Ok(())
            }
            None => Err(anyhow::anyhow!("Unknown diagnostic code '{}'.", code)),
        },
        Command::Build {
            input,
            output,
            console,
            sprite,
        } => {
            if *console {
                init_console_logging();
            }
            let progress = CliProgress::new("Compile", 4);

            progress.emit(1, "Resolving input path");
            let input = canonicalize_file(input)?;

            progress.emit(2, "Reading source");
            let source = std::fs::read_to_string(&input)?;

            progress.emit(3, "Lexing, parsing, and compiling");
            let options = CompileOptions {
                sprite_name: sprite.clone(),
            };
            let compilation = compile_source(&source, &options);
            let filename = pretty_path(&input);
            diagnostic::render_diagnostics(compilation.diagnostics(), &filename, &source);
            if !compilation.project.can_package() {
                return Err(CompileError {
                    diagnostics: compilation.diagnostics().to_vec(),
                }
                .into());
            }

            let output = output.clone().unwrap_or_else(|| input.with_extension("sb3"));
            progress.emit(4, "Building .sb3");
            project::write_sb3(&compilation.project, &output)?;
            log::info!("wrote '{}'", pretty_path(&output));
            Ok(())
        }
    }
}

/// Lexes and parses `source`; the first lexer or parser error becomes an `E10` diagnostic.
pub fn parse_source(source: &str) -> std::result::Result<Program, Diagnostic> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer
        .tokenize()
        .map_err(|e| Diagnostic::new("E10", Some(e.span), &[e.message.as_str()]))?;
    let mut parser = SsParser::new(tokens);
    parser
        .parse_program()
        .map_err(|e| Diagnostic::new("E10", Some(e.span), &[e.message.as_str()]))
}

pub fn compile_source(source: &str, options: &CompileOptions) -> Compilation {
    let mut project = ProjectCompiler::new(&options.sprite_name);
    match parse_source(source) {
        Ok(program) => Visitor::new(&mut project).visit_program(&program),
        Err(diagnostic) => project.report(diagnostic),
    }
    Compilation { project }
}

/// Compiles and packages in one step. Fails with `CompileError` unless packaging is allowed.
pub fn compile_source_to_sb3_bytes(source: &str, options: &CompileOptions) -> Result<Vec<u8>> {
    let compilation = compile_source(source, options);
    if !compilation.project.can_package() {
        return Err(CompileError {
            diagnostics: compilation.diagnostics().to_vec(),
        }
        .into());
    }
    project::build_sb3_bytes(&compilation.project)
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

fn pretty_path(path: &Path) -> String {
    let raw = path.display().to_string();
    if let Some(stripped) = raw.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        raw
    }
}

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static CONSOLE_LOGGER: ConsoleLogger = ConsoleLogger;

fn init_console_logging() {
    if log::set_logger(&CONSOLE_LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }
}

struct CliProgress {
    prefix: &'static str,
    total: usize,
}

impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
