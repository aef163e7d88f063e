//! Parse diagnostic types.

use std::fmt;
use webpipe_core::{Severity, Span};

/// A positional diagnostic produced while parsing.
///
/// Diagnostics never abort parsing; each one is anchored to the byte range
/// of the construct that triggered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// The kind of problem.
    pub kind: DiagnosticKind,
    /// Half-open byte range into the source.
    pub span: Span,
    /// How serious the problem is.
    pub severity: Severity,
}

impl ParseDiagnostic {
    /// Create a diagnostic with the default severity of its kind.
    #[must_use]
    pub fn new(kind: DiagnosticKind, span: Span) -> Self {
        let severity = kind.default_severity();
        Self {
            kind,
            span,
            severity,
        }
    }

    /// Get the span of this diagnostic.
    #[must_use]
    pub const fn span(&self) -> (usize, usize) {
        (self.span.start, self.span.end)
    }

    const fn kind_code(&self) -> u32 {
        match &self.kind {
            DiagnosticKind::UnrecognizedSyntax(_) => 1,
            DiagnosticKind::InvalidStatusCode(_) => 2,
            DiagnosticKind::UnclosedBacktick => 3,
            DiagnosticKind::InvalidConfigProperty(_) => 4,
            DiagnosticKind::UnclosedBlock(_) => 5,
            DiagnosticKind::MissingWhen(_) => 6,
            DiagnosticKind::NestingTooDeep(_) => 7,
        }
    }

    /// Stable code string, e.g. `P0002`.
    #[must_use]
    pub fn code(&self) -> String {
        format!("P{:04}", self.kind_code())
    }

    /// Get the diagnostic message.
    #[must_use]
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.kind, self.span)
    }
}

impl std::error::Error for ParseDiagnostic {}

/// Kinds of parse diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A line no top-level production accepts.
    UnrecognizedSyntax(String),
    /// A `result` branch status code outside `[100, 599]`.
    InvalidStatusCode(u32),
    /// The file contains an odd number of backticks.
    UnclosedBacktick,
    /// A config property whose value cannot be parsed.
    InvalidConfigProperty(String),
    /// A `config` block without its closing brace.
    UnclosedBlock(String),
    /// An `it` block without a `when` clause.
    MissingWhen(String),
    /// `result` branches nested past the given depth.
    NestingTooDeep(usize),
}

impl DiagnosticKind {
    /// Severity attached to this kind when it is reported.
    #[must_use]
    pub const fn default_severity(&self) -> Severity {
        match self {
            Self::InvalidStatusCode(_) | Self::NestingTooDeep(_) => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedSyntax(text) => write!(f, "unrecognized syntax: {text}"),
            Self::InvalidStatusCode(code) => {
                write!(f, "invalid HTTP status code {code}: expected 100-599")
            }
            Self::UnclosedBacktick => write!(f, "unclosed backtick string"),
            Self::InvalidConfigProperty(key) => write!(f, "invalid value for config property '{key}'"),
            Self::UnclosedBlock(name) => write!(f, "config block '{name}' is missing its closing '}}'"),
            Self::MissingWhen(name) => write!(f, "test '{name}' has no 'when' clause"),
            Self::NestingTooDeep(max) => {
                write!(f, "result branches nested deeper than {max} levels")
            }
        }
    }
}
