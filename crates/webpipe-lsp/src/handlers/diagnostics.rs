//! Diagnostics handler for publishing syntax and reference problems.

use lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};
use webpipe_core::Severity;
use webpipe_index::{DocumentAnalysis, EngineDiagnostic};

use super::utils::LineIndex;

/// Convert every diagnostic of an analysis to LSP diagnostics.
///
/// Syntax diagnostics come first, then reference diagnostics.
pub fn analysis_to_diagnostics(analysis: &DocumentAnalysis, source: &str) -> Vec<Diagnostic> {
    let line_index = LineIndex::new(source);
    analysis
        .all_diagnostics()
        .iter()
        .map(|d| engine_diagnostic_to_lsp(d, &line_index))
        .collect()
}

/// Convert a single diagnostic.
pub fn engine_diagnostic_to_lsp(
    diagnostic: &EngineDiagnostic,
    line_index: &LineIndex<'_>,
) -> Diagnostic {
    Diagnostic {
        range: line_index.span_to_range(diagnostic.span),
        severity: Some(to_lsp_severity(diagnostic.severity)),
        code: Some(NumberOrString::String(diagnostic.code.clone())),
        source: Some("webpipe".to_string()),
        message: diagnostic.message.clone(),
        related_information: None,
        tags: None,
        code_description: None,
        data: None,
    }
}

const fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
    }
}
