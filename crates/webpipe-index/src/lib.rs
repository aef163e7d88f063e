//! Symbol index for webpipe documents.
//!
//! This crate links every declaration in a document to every reference:
//!
//! - [`scanner`] finds positional references (steps, `when` clauses, mocks)
//! - [`partials`] resolves template partials with inline-first scoping
//! - [`symbols`] merges both with the parser's declarations
//! - [`validate`] reports unknown and duplicate symbols
//! - [`context`] classifies the identifier under a cursor
//!
//! [`analyze`] runs the whole pipeline for one document version.
//!
//! # Example
//!
//! ```
//! use webpipe_index::{analyze, IndexOptions, SymbolKey};
//!
//! let text = "pipeline foo = |> jq: `{}`\nGET /x |> pipeline: foo\n";
//! let analysis = analyze(text, &IndexOptions::default());
//!
//! let foo = SymbolKey::Pipeline("foo".to_string());
//! assert_eq!(analysis.symbols.references_of(&foo).len(), 1);
//! assert!(analysis.all_diagnostics().is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod partials;
pub mod pattern;
pub mod scanner;
pub mod symbols;
pub mod validate;

use serde::Serialize;
use webpipe_core::{Program, Severity, Span};
use webpipe_parser::ParseDiagnostic;

pub use context::{resolve_context, SymbolContext};
pub use partials::{HandlebarsSymbols, InlineScope, PartialResolution, DEFAULT_TEMPLATE_ENGINE};
pub use scanner::{scan_references, ScannedReferences};
pub use symbols::{build_symbol_table, SymbolKey, SymbolTable};
pub use validate::{validate, ErrorCode, ValidationError};

/// Index options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// Variable type and step name that hold template content.
    pub template_engine: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            template_engine: DEFAULT_TEMPLATE_ENGINE.to_string(),
        }
    }
}

/// Everything known about one version of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAnalysis {
    /// The parsed program.
    pub program: Program,
    /// Syntax diagnostics from the parser.
    pub parse_diagnostics: Vec<ParseDiagnostic>,
    /// Declarations and references.
    pub symbols: SymbolTable,
    /// Unknown and duplicate symbol diagnostics.
    pub reference_diagnostics: Vec<ValidationError>,
}

/// A diagnostic from any stage, in a uniform shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineDiagnostic {
    /// Stable code, `P0001` for syntax or `W1001` for references.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// Byte range in the document.
    pub span: Span,
    /// Severity.
    pub severity: Severity,
}

impl From<&ParseDiagnostic> for EngineDiagnostic {
    fn from(diag: &ParseDiagnostic) -> Self {
        Self {
            code: diag.code(),
            message: diag.message(),
            span: diag.span,
            severity: diag.severity,
        }
    }
}

impl From<&ValidationError> for EngineDiagnostic {
    fn from(err: &ValidationError) -> Self {
        Self {
            code: err.code.code().to_string(),
            message: err.message.clone(),
            span: err.span,
            severity: err.severity(),
        }
    }
}

impl DocumentAnalysis {
    /// Parse diagnostics followed by reference diagnostics.
    #[must_use]
    pub fn all_diagnostics(&self) -> Vec<EngineDiagnostic> {
        self.parse_diagnostics
            .iter()
            .map(EngineDiagnostic::from)
            .chain(self.reference_diagnostics.iter().map(EngineDiagnostic::from))
            .collect()
    }

    /// Whether any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.parse_diagnostics.iter().any(|d| d.severity.is_error())
            || self.reference_diagnostics.iter().any(|e| e.severity().is_error())
    }
}

/// Parse, scan and index one document.
#[must_use]
pub fn analyze(text: &str, options: &IndexOptions) -> DocumentAnalysis {
    let parsed = webpipe_parser::parse(text);
    let scanned = scan_references(text);
    let handlebars = HandlebarsSymbols::collect(&parsed.program, text, &options.template_engine);
    let symbols = build_symbol_table(&parsed, scanned, handlebars);
    let reference_diagnostics = validate(&parsed.program, &symbols);

    DocumentAnalysis {
        program: parsed.program,
        parse_diagnostics: parsed.diagnostics,
        symbols,
        reference_diagnostics,
    }
}
