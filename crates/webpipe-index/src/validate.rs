//! Reference validation.
//!
//! Compares scanned references and declarations against the symbol table.
//!
//! # Error Codes
//!
//! | Code | Description |
//! |------|-------------|
//! | W1001 | Unknown pipeline |
//! | W1002 | Unknown variable (warning) |
//! | W1003 | Unknown partial (warning) |
//! | W2001 | Duplicate pipeline declaration (warning) |
//! | W2002 | Duplicate variable declaration (warning) |

use std::collections::HashSet;

use thiserror::Error;
use webpipe_core::{Program, Severity, Span};

use crate::partials::PartialResolution;
use crate::symbols::{SymbolKey, SymbolTable};

/// Reference validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // === Unknown references (W1xxx) ===
    /// W1001: Pipeline referenced but never declared.
    UnknownPipeline,
    /// W1002: Typed variable referenced but never declared.
    UnknownVariable,
    /// W1003: Partial used but neither inline nor global.
    UnknownPartial,

    // === Duplicates (W2xxx) ===
    /// W2001: Pipeline declared more than once.
    DuplicatePipeline,
    /// W2002: Variable declared more than once.
    DuplicateVariable,
}

impl ErrorCode {
    /// Get the error code string (e.g., "W1001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownPipeline => "W1001",
            Self::UnknownVariable => "W1002",
            Self::UnknownPartial => "W1003",
            Self::DuplicatePipeline => "W2001",
            Self::DuplicateVariable => "W2002",
        }
    }

    /// Check if this is a warning (not an error).
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        !matches!(self, Self::UnknownPipeline)
    }

    /// Get the severity level.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        if self.is_warning() {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A reference validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct ValidationError {
    /// Error code.
    pub code: ErrorCode,
    /// Error message.
    pub message: String,
    /// The offending identifier.
    pub span: Span,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
        }
    }

    /// Severity derived from the code.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.code.severity()
    }
}

/// Validate references and declarations of one document.
///
/// Results are ordered by position.
pub fn validate(program: &Program, symbols: &SymbolTable) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_references(symbols, &mut errors);
    validate_partials(symbols, &mut errors);
    validate_duplicates(program, &mut errors);

    errors.sort_by_key(|e| (e.span.start, e.code.code()));
    errors
}

fn validate_references(symbols: &SymbolTable, errors: &mut Vec<ValidationError>) {
    for (name, spans) in &symbols.pipeline_refs {
        let key = SymbolKey::Pipeline(name.clone());
        if symbols.is_declared(&key) {
            continue;
        }
        for &span in spans {
            errors.push(ValidationError::new(
                ErrorCode::UnknownPipeline,
                format!("Unknown pipeline '{name}'"),
                span,
            ));
        }
    }

    for (key, spans) in &symbols.variable_refs {
        let symbol = SymbolKey::from_key(key);
        if symbols.is_declared(&symbol) {
            continue;
        }
        for &span in spans {
            errors.push(ValidationError::new(
                ErrorCode::UnknownVariable,
                format!("Unknown variable '{symbol}'"),
                span,
            ));
        }
    }
}

fn validate_partials(symbols: &SymbolTable, errors: &mut Vec<ValidationError>) {
    let partials = &symbols.handlebars;
    for (name, usages) in &partials.usages_by_name {
        for &usage in usages {
            if partials.resolve_partial(name, usage.start) == PartialResolution::Unresolved {
                errors.push(ValidationError::new(
                    ErrorCode::UnknownPartial,
                    format!("Unknown partial '{name}'"),
                    usage,
                ));
            }
        }
    }
}

fn validate_duplicates(program: &Program, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for pipeline in &program.pipelines {
        if !seen.insert(pipeline.value.name.as_str()) {
            errors.push(ValidationError::new(
                ErrorCode::DuplicatePipeline,
                format!("Pipeline '{}' is already declared", pipeline.value.name),
                pipeline.value.name_span,
            ));
        }
    }

    let mut seen = HashSet::new();
    for var in &program.variables {
        if !seen.insert(var.value.key()) {
            errors.push(ValidationError::new(
                ErrorCode::DuplicateVariable,
                format!(
                    "Variable '{} {}' is already declared",
                    var.value.var_type, var.value.name
                ),
                var.value.name_span,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyze, IndexOptions};

    fn errors(text: &str) -> Vec<ValidationError> {
        analyze(text, &IndexOptions::default()).reference_diagnostics
    }

    #[test]
    fn test_error_codes_and_severity() {
        assert_eq!(ErrorCode::UnknownPipeline.code(), "W1001");
        assert_eq!(ErrorCode::UnknownPipeline.severity(), Severity::Error);
        assert_eq!(ErrorCode::UnknownVariable.severity(), Severity::Warning);
        assert_eq!(ErrorCode::DuplicateVariable.to_string(), "W2002");
    }

    #[test]
    fn test_unknown_pipeline() {
        let text = "GET /x\n  |> pipeline: missing\n";
        let errors = errors(text);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UnknownPipeline);
        assert_eq!(errors[0].span.text(text), "missing");
        assert_eq!(errors[0].to_string(), "[W1001] Unknown pipeline 'missing'");
    }

    #[test]
    fn test_unknown_variable() {
        let text = "pg known = `1`\npipeline p =\n  |> pg: known\n  |> pg: unknown\n";
        let errors = errors(text);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UnknownVariable);
        assert_eq!(errors[0].span.text(text), "unknown");
    }

    #[test]
    fn test_duplicate_variable_warns_on_second() {
        let text = "pg q = `a`\npg q = `a`\n";
        let errors = errors(text);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::DuplicateVariable);
        assert_eq!(errors[0].severity(), Severity::Warning);
        assert_eq!(errors[0].span, Span::new(14, 15));
    }

    #[test]
    fn test_duplicate_pipeline_warns_on_each_later_declaration() {
        let text = "pipeline a = |> jq: `1`\npipeline a = |> jq: `2`\npipeline a = |> jq: `3`\n";
        let errors = errors(text);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.code == ErrorCode::DuplicatePipeline));
        assert!(errors[0].span.start < errors[1].span.start);
    }

    #[test]
    fn test_unknown_partial() {
        let text = "handlebars page = `{{> header}}{{> footer}}`\nhandlebars header = `<h1/>`\n";
        let errors = errors(text);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UnknownPartial);
        assert_eq!(errors[0].span.text(text), "footer");
    }
}
