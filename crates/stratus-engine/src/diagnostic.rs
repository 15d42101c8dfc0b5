//! Source locations and user-facing diagnostics

use std::fmt;

/// A source position attached to syntax nodes.
///
/// Lines are 1-based. A column of 0 means the column is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Span with a known line but no column information
    pub const fn line(line: u32) -> Self {
        Self { line, column: 0 }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.column == 0 {
            write!(f, "{}", self.line)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A located message for the CLI or an editor integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub path: String,
    pub line: u32,
    pub column: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, path: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.into(),
            line: span.line.max(1),
            column: (span.column > 0).then_some(span.column),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(
                f,
                "{}:{}:{}: {}: {}",
                self.path, self.line, column, self.severity, self.message
            ),
            None => write!(f, "{}:{}: {}: {}", self.path, self.line, self.severity, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display_with_column() {
        let diag = Diagnostic::new(Severity::Error, "main.st", Span::new(3, 7), "bad thing");
        assert_eq!(diag.to_string(), "main.st:3:7: error: bad thing");
    }

    #[test]
    fn test_diagnostic_display_without_column() {
        let diag = Diagnostic::new(Severity::Warning, "main.st", Span::line(9), "careful");
        assert_eq!(diag.column, None);
        assert_eq!(diag.to_string(), "main.st:9: warning: careful");
    }

    #[test]
    fn test_unknown_line_clamps_to_one() {
        let diag = Diagnostic::new(Severity::Info, "x.st", Span::default(), "note");
        assert_eq!(diag.line, 1);
    }
}
