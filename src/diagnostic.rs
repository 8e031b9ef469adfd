use crate::ast::Span;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

struct CatalogEntry {
    code: &'static str,
    message: &'static str,
    note: Option<&'static str>,
}

const fn entry(code: &'static str, message: &'static str, note: Option<&'static str>) -> CatalogEntry {
    CatalogEntry { code, message, note }
}

/// Message templates. `{0}`, `{1}` are replaced positionally.
static CATALOG: &[CatalogEntry] = &[
    entry("W1", "Division by zero is not recommended.", None),
    entry("E2", "ICE: compiler failed to parse an expression.", None),
    entry(
        "E3",
        "Variable \"{0}\" was already defined.",
        Some("Did you mean to assign a value?"),
    ),
    entry("E4", "Attributes must be defined at the beginning of the file.", None),
    entry(
        "W5",
        "Could not infer the type of variable \"{0}\".",
        Some("Defaulting to string."),
    ),
    entry("E7", "Variable \"{0}\" is not defined.", None),
    entry(
        "E8",
        "Cannot assign a value of type \"{0}\" to a variable of type \"{1}\".",
        None,
    ),
    entry("E9", "Unexpected identifier \"{0}\".", None),
    entry("E10", "Syntax error: {0}", None),
    entry("E11", "Type mismatch: expected \"{0}\", received \"{1}\".", None),
    entry(
        "E12",
        "Cannot define function with name \"{0}\"; a variable with such name already exists.",
        None,
    ),
    entry("E13", "Function with name \"{0}\" is already defined.", None),
    entry("E14", "Argument names cannot match the function name.", None),
    entry("E15", "Argument names cannot match already defined variables.", None),
    entry("E16", "Functions must be defined as top-level statements.", None),
    entry("E17", "Cannot return in a non-function context.", None),
    entry(
        "W18",
        "Could not infer the return type of function \"{0}\".",
        Some("Defaulting to string."),
    ),
    entry(
        "W19",
        "Could not infer the type of argument \"{0}\" of function \"{1}\".",
        Some("Defaulting to string."),
    ),
    entry("E20", "Unknown attribute \"{0}\".", Some("Known attributes: stage, ignore_errors.")),
    entry("E21", "Function \"{0}\" is not defined.", None),
    entry(
        "E22",
        "Function \"{0}\" takes {1} argument(s), but {2} were given.",
        None,
    ),
    entry("E23", "Argument \"{0}\" is declared more than once.", None),
    entry(
        "W24",
        "Errors are ignored for this file.",
        Some("The project is packaged even if compilation fails."),
    ),
    entry(
        "E25",
        "Cannot define variable with name \"{0}\"; a function with such name already exists.",
        None,
    ),
];

fn lookup(code: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.code == code)
}

fn render_template(template: &str, args: &[&str]) -> String {
    let mut out = template.to_string();
    for (index, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{}}}", index), arg);
    }
    out
}

/// A catalogued compiler diagnostic. Codes starting with `E` are fatal, `W` advisory.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
    pub note: Option<String>,
}

impl Diagnostic {
    pub fn new(code: &str, span: Option<Span>, args: &[&str]) -> Self {
        let severity = if code.starts_with('W') {
            Severity::Warning
        } else {
            Severity::Error
        };
        let (message, note) = match lookup(code) {
            Some(entry) => (
                render_template(entry.message, args),
                entry.note.map(|n| render_template(n, args)),
            ),
            None => (format!("{} {}", code, args.join(" ")), None),
        };
        Self {
            code: code.to_string(),
            severity,
            message,
            span,
            note,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    fn report(&self, filename: &str, color: bool) -> ariadne::Report<'static, (String, std::ops::Range<usize>)> {
        use ariadne::{Color, Config, Label, Report, ReportKind};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let label_color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };
        let span = self.span.unwrap_or_else(Span::dummy);
        let range = span.offset..span.end();

        let mut report = Report::build(kind, filename.to_string(), span.offset)
            .with_code(&self.code)
            .with_message(&self.message)
            .with_config(Config::default().with_color(color));
        if self.span.is_some() {
            report = report.with_label(
                Label::new((filename.to_string(), range))
                    .with_message(&self.message)
                    .with_color(label_color),
            );
        }
        if let Some(note) = &self.note {
            report = report.with_note(note);
        }
        report
            .with_help(format!(
                "for more information, try `scratchscript explain {}`",
                self.code
            ))
            .finish()
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::Source;

        let result = self
            .report(filename, true)
            .eprint((filename.to_string(), Source::from(source)));
        if let Err(err) = result {
            log::warn!("failed to render diagnostic {}: {}", self.code, err);
        }
    }

    pub fn render_to_string(&self, filename: &str, source: &str) -> String {
        use ariadne::Source;

        let mut out = Vec::new();
        if self
            .report(filename, false)
            .write((filename.to_string(), Source::from(source)), &mut out)
            .is_err()
        {
            return self.to_string();
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.span {
            Some(span) => write!(
                f,
                "{}[{}] at line {}, column {}: {}",
                kind, self.code, span.pos.line, span.pos.column, self.message
            ),
            None => write!(f, "{}[{}]: {}", kind, self.code, self.message),
        }
    }
}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}

/// Catalog text for `code`, used by `scratchscript explain`.
pub fn explain(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    let entry = lookup(&code)?;
    let kind = if code.starts_with('W') { "warning" } else { "error" };
    let mut text = format!("{} ({}): {}", entry.code, kind, entry.message);
    if let Some(note) = entry.note {
        text.push_str("\nnote: ");
        text.push_str(note);
    }
    Some(text)
}

/// Compilation stopped with at least one error.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let errors = self.diagnostics.iter().filter(|d| d.is_error()).count();
        write!(f, "Compilation failed with {} error(s).", errors)
    }
}

impl Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;

    #[test]
    fn test_template_arguments_are_positional() {
        let d = Diagnostic::new("E8", None, &["string", "number"]);
        assert_eq!(
            d.message,
            "Cannot assign a value of type \"string\" to a variable of type \"number\"."
        );
        assert!(d.is_error());
    }

    #[test]
    fn test_severity_follows_code_prefix() {
        assert_eq!(Diagnostic::new("W1", None, &[]).severity, Severity::Warning);
        assert_eq!(Diagnostic::new("E17", None, &[]).severity, Severity::Error);
    }

    #[test]
    fn test_note_is_attached() {
        let d = Diagnostic::new("E3", None, &["x"]);
        assert_eq!(d.note.as_deref(), Some("Did you mean to assign a value?"));
    }

    #[test]
    fn test_unknown_code_still_builds() {
        let d = Diagnostic::new("E99", None, &["a"]);
        assert_eq!(d.message, "E99 a");
    }

    #[test]
    fn test_render_to_string_mentions_code_and_help() {
        let source = "let x = 1\nlet x = 2\n";
        let span = Span::new(Position::new(2, 5), 14, 1);
        let out = Diagnostic::new("E3", Some(span), &["x"]).render_to_string("main.scrs", source);
        assert!(out.contains("E3"));
        assert!(out.contains("already defined"));
        assert!(out.contains("scratchscript explain E3"));
    }

    #[test]
    fn test_explain() {
        let text = explain("w1").unwrap();
        assert!(text.starts_with("W1 (warning)"));
        assert!(explain("E404").is_none());
    }

    #[test]
    fn test_display_includes_position() {
        let span = Span::new(Position::new(3, 7), 20, 2);
        let d = Diagnostic::new("E9", Some(span), &["y"]);
        assert_eq!(
            d.to_string(),
            "error[E9] at line 3, column 7: Unexpected identifier \"y\"."
        );
    }

    #[test]
    fn test_compile_error_counts_errors_only() {
        let err = CompileError {
            diagnostics: vec![
                Diagnostic::new("W1", None, &[]),
                Diagnostic::new("E7", None, &["z"]),
            ],
        };
        assert_eq!(err.to_string(), "Compilation failed with 1 error(s).");
    }
}
