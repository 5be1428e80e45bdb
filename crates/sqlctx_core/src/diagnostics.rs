//! Collection of conditions raised while building a statement.
use sqlctx_error::{ErrorCode, Severity};

/// Receives conditions selected by the pass.
///
/// Implementations own rendering. The pass only chooses a code and its
/// arguments.
pub trait DiagnosticsSink {
    fn report(&mut self, severity: Severity, code: ErrorCode, args: &[String]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub args: Vec<String>,
}

/// In-memory diagnostics area for one session.
#[derive(Debug, Default)]
pub struct DiagnosticsArea {
    entries: Vec<Diagnostic>,
}

impl DiagnosticsArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.entries.iter().any(|d| d.code == code)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl DiagnosticsSink for DiagnosticsArea {
    fn report(&mut self, severity: Severity, code: ErrorCode, args: &[String]) {
        self.entries.push(Diagnostic {
            severity,
            code,
            args: args.to_vec(),
        });
    }
}
