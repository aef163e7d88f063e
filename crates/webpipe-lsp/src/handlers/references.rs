//! Find references handler for locating all usages.
//!
//! Provides references for:
//! - Pipelines (steps, routes, `when executing pipeline`, mocks)
//! - Typed variables (steps, `when executing variable`, mocks), and for
//!   template variables every partial usage that resolves to them
//! - Partials (usages in scope of the same definition)

use lsp_types::{Location, ReferenceParams, Uri};
use webpipe_index::DocumentAnalysis;

use super::utils::{context_at, occurrences, LineIndex};

/// Handle a find references request.
pub fn handle_references(
    params: &ReferenceParams,
    source: &str,
    analysis: &DocumentAnalysis,
    uri: &Uri,
    template_engine: &str,
) -> Option<Vec<Location>> {
    let position = params.text_document_position.position;
    let include_declaration = params.context.include_declaration;

    let context = context_at(source, &analysis.symbols, position)?;
    let line_index = LineIndex::new(source);

    let locations: Vec<Location> = occurrences(&analysis.symbols, &context, template_engine)
        .into_iter()
        .filter(|o| include_declaration || !o.is_declaration)
        .map(|o| Location {
            uri: uri.clone(),
            range: line_index.span_to_range(o.span),
        })
        .collect();

    if locations.is_empty() {
        None
    } else {
        Some(locations)
    }
}
