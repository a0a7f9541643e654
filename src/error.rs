use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::fmt;

/// A byte range into the source text. Tokens, AST nodes and errors all
/// carry one, so a diagnostic can always point at the offending code.
#[derive(Debug, Clone)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn single(pos: usize) -> Self {
        Self::new(pos, pos + 1)
    }
}

/// Which stage of the pipeline rejected the program. The runtime has no
/// guest-level exception handling, so every kind is fatal to the run.
#[derive(Debug, Clone, Copy)]
pub enum ErrorKind {
    LexError,
    ParseError,
    RuntimeError,
}

impl ErrorKind {
    fn title(self) -> &'static str {
        match self {
            ErrorKind::LexError => "Lexical Error",
            ErrorKind::ParseError => "Parse Error",
            ErrorKind::RuntimeError => "Runtime Error",
        }
    }

    fn color(self) -> Color {
        match self {
            ErrorKind::LexError => Color::Red,
            ErrorKind::ParseError => Color::Yellow,
            ErrorKind::RuntimeError => Color::Magenta,
        }
    }
}

/// The one diagnostic type of the interpreter. Lexer, parser and evaluator
/// all report through it.
#[derive(Debug, Clone)]
pub struct MinipyError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
}

impl MinipyError {
    fn new(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            help: None,
        }
    }

    pub fn lex_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LexError, span, message)
    }

    pub fn parse_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, span, message)
    }

    pub fn runtime_error(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, span, message)
    }

    /// Attaches a usage hint, shown as a help note under the report.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Renders the error against its source text. Diagnostics go to
    /// stderr; the guest program's own output stays on the configured
    /// sink.
    pub fn report(&self, source: &str, filename: Option<&str>) {
        let id = filename.unwrap_or("<repl>");
        let color = self.kind.color();

        let mut report = Report::build(ReportKind::Error, id, self.span.start)
            .with_message(format!(
                "{}: {}",
                self.kind.title().fg(color),
                self.message
            ))
            .with_label(
                Label::new((id, self.span.start..self.span.end))
                    .with_message(&self.message)
                    .with_color(color),
            );
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report.finish().eprint((id, Source::from(source))).ok();
    }
}

impl fmt::Display for MinipyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind.title(), self.message)
    }
}

impl std::error::Error for MinipyError {}
