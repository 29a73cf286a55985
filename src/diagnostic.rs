use crate::span::Span;

/// A lowering or parsing error.
///
/// Every diagnostic is fatal: lowering stops at the first one, the IR
/// reader collects one per failing kernel.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Attach `span` if this diagnostic was raised without one.
    ///
    /// Pure helpers (type spelling, lane access) have no node at hand;
    /// the visitor fills in the span of the node being printed.
    pub fn or_span(mut self, span: Span) -> Self {
        if self.span.is_dummy() {
            self.span = span;
        }
        self
    }

    /// Render the diagnostic to stderr using ariadne.
    ///
    /// Diagnostics without a real span are printed as a plain line.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        if self.span.is_dummy() || source.is_empty() {
            eprintln!("{}", self.plain());
            return;
        }

        let end = (self.span.end as usize).min(source.len());
        let start = (self.span.start as usize).min(end);

        let mut report = Report::build(ReportKind::Error, filename, start)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, start..end))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        if report
            .finish()
            .eprint((filename, Source::from(source)))
            .is_err()
        {
            eprintln!("{}", self.plain());
        }
    }

    /// One-line rendering used when there is no source to point into.
    pub fn plain(&self) -> String {
        let mut out = format!("error: {}", self.message);
        for note in &self.notes {
            out.push_str(&format!("\n  note: {}", note));
        }
        if let Some(help) = &self.help {
            out.push_str(&format!("\n  help: {}", help));
        }
        out
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Render a list of diagnostics.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}
