//! User-facing error reports.
//!
//! Every phase reports its failures as [`Diagnostic`]s, rendered as
//! `[line N] Error <Phase>: <message>`.

use std::fmt;

use crate::error::{ParseError, RuntimeError, ScanError};

/// Pipeline phase a diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Scanning,
    Parsing,
    Interpreting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scanning => write!(f, "Scanning"),
            Self::Parsing => write!(f, "Parsing"),
            Self::Interpreting => write!(f, "Interpreting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub phase: Phase,
    /// 1-based source line, when one is known.
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            line: None,
            message: message.into(),
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[line {line}]")?,
            None => write!(f, "[line ?]")?,
        }
        write!(f, " Error {}: {}", self.phase, self.message)
    }
}

impl From<&ScanError> for Diagnostic {
    fn from(error: &ScanError) -> Self {
        Diagnostic::new(Phase::Scanning, error.to_string()).with_line(error.line())
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(error: &ParseError) -> Self {
        Diagnostic::new(Phase::Parsing, error.to_string()).with_line(error.line())
    }
}

impl From<&RuntimeError> for Diagnostic {
    fn from(error: &RuntimeError) -> Self {
        let diagnostic = Diagnostic::new(Phase::Interpreting, error.to_string());
        match error.line() {
            Some(line) => diagnostic.with_line(line),
            None => diagnostic,
        }
    }
}

/// Diagnostics gathered over one run, in the order they were produced.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.is_empty()
    }

    /// True when execution was cut short by a runtime error.
    pub fn has_runtime_error(&self) -> bool {
        self.iter().any(|d| d.phase == Phase::Interpreting)
    }

    pub fn filter_by_phase(&self, phase: Phase) -> Vec<&Diagnostic> {
        self.iter().filter(|d| d.phase == phase).collect()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenType};

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::new(Phase::Parsing, "Expect expression. (at ';')").with_line(10);
        assert_eq!(diag.to_string(), "[line 10] Error Parsing: Expect expression. (at ';')");

        let diag = Diagnostic::new(Phase::Interpreting, "Failed to write output");
        assert_eq!(diag.to_string(), "[line ?] Error Interpreting: Failed to write output");
    }

    #[test]
    fn test_from_phase_errors() {
        let scan = ScanError::UnterminatedString { line: 2 };
        assert_eq!(
            Diagnostic::from(&scan).to_string(),
            "[line 2] Error Scanning: Unterminated string."
        );

        let token = Token::new(TokenType::Identifier, "x", 5);
        let runtime = RuntimeError::undefined(&token);
        assert_eq!(
            Diagnostic::from(&runtime).to_string(),
            "[line 5] Error Interpreting: Undefined variable 'x'."
        );
    }

    #[test]
    fn test_filter_by_phase() {
        let mut result = Diagnostics::new();
        assert!(!result.has_errors());

        result.push(Diagnostic::new(Phase::Scanning, "a"));
        result.push(Diagnostic::new(Phase::Parsing, "b"));
        assert!(!result.has_runtime_error());

        result.push(Diagnostic::new(Phase::Interpreting, "c"));

        assert_eq!(result.len(), 3);
        assert!(result.has_errors());
        assert!(result.has_runtime_error());
        assert_eq!(result.filter_by_phase(Phase::Parsing).len(), 1);
    }
}
