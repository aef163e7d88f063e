//! Error-tolerant parser for webpipe files.
//!
//! This crate turns webpipe source text into a [`Program`] plus a list of
//! positional [`ParseDiagnostic`]s. Parsing never fails: malformed lines are
//! reported and skipped, so an editor always has a best-effort tree to work
//! with.
//!
//! # Features
//!
//! - Config blocks, variables, named pipelines, routes and `describe` tests
//! - Indentation-aware `result` branches
//! - Byte-precise spans for every name, status code and step config
//! - Declaration ranges for pipelines and variables, collected in the same pass
//!
//! # Example
//!
//! ```
//! use webpipe_parser::parse;
//!
//! let source = "pipeline greet =\n  |> jq: `{ hello: \"world\" }`\n";
//!
//! let result = parse(source);
//! assert!(result.diagnostics.is_empty());
//! assert_eq!(result.program.pipelines.len(), 1);
//! assert_eq!(result.pipeline_ranges["greet"].name_span.text(source), "greet");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod describe;
mod diagnostic;
mod parser;

use std::collections::HashMap;

use serde::Serialize;

pub use diagnostic::{DiagnosticKind, ParseDiagnostic};
pub use parser::{HTTP_METHODS, MAX_NESTING};
pub use webpipe_core::{Program, Span, Spanned};

/// Where a named declaration lives in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeclarationRange {
    /// The whole declaration, from its keyword to the end of its last step
    /// or closing backtick.
    pub span: Span,
    /// Just the declared name.
    pub name_span: Span,
}

/// Result of parsing a webpipe file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    /// The parsed program.
    pub program: Program,
    /// Diagnostics in the order they were produced.
    pub diagnostics: Vec<ParseDiagnostic>,
    /// Named pipeline declarations; the last declaration of a name wins.
    pub pipeline_ranges: HashMap<String, DeclarationRange>,
    /// Variable declarations keyed by `type::name`; the last one wins.
    pub variable_ranges: HashMap<String, DeclarationRange>,
}

/// Parse webpipe source code.
///
/// # Returns
///
/// A `ParseResult` with the program, diagnostics and declaration ranges.
#[must_use]
pub fn parse(source: &str) -> ParseResult {
    parser::Parser::new(source).parse_program()
}

/// Parse webpipe source code, returning only the program.
#[must_use]
pub fn parse_program(source: &str) -> Program {
    parse(source).program
}

/// Parse webpipe source code, returning the program and its diagnostics.
#[must_use]
pub fn parse_program_with_diagnostics(source: &str) -> (Program, Vec<ParseDiagnostic>) {
    let result = parse(source);
    (result.program, result.diagnostics)
}

/// Declaration ranges of every named pipeline in `source`.
#[must_use]
pub fn get_pipeline_ranges(source: &str) -> HashMap<String, DeclarationRange> {
    parse(source).pipeline_ranges
}

/// Declaration ranges of every variable in `source`, keyed by `type::name`.
#[must_use]
pub fn get_variable_ranges(source: &str) -> HashMap<String, DeclarationRange> {
    parse(source).variable_ranges
}
