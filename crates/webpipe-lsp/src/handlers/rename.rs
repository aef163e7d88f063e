//! Rename handler for refactoring pipelines, variables and partials.
//!
//! Renames update the declaration and every reference in the file. For
//! template variables the partial usages that resolve to them are renamed
//! too; an inline partial is renamed only inside its own template.

use lsp_types::{
    PrepareRenameResponse, RenameParams, TextDocumentPositionParams, TextEdit, WorkspaceEdit,
};
use std::collections::HashMap;
use webpipe_index::DocumentAnalysis;

use super::utils::{context_at, is_identifier, occurrences, LineIndex};

/// Handle a prepare rename request (check if rename is valid at position).
pub fn handle_prepare_rename(
    params: &TextDocumentPositionParams,
    source: &str,
    analysis: &DocumentAnalysis,
) -> Option<PrepareRenameResponse> {
    let context = context_at(source, &analysis.symbols, params.position)?;
    let span = context.span();

    Some(PrepareRenameResponse::RangeWithPlaceholder {
        range: LineIndex::new(source).span_to_range(span),
        placeholder: span.text(source).to_string(),
    })
}

/// Handle a rename request.
///
/// Returns an error when the new name is not a valid identifier.
#[allow(clippy::mutable_key_type)] // Uri is required as key by LSP WorkspaceEdit API
pub fn handle_rename(
    params: &RenameParams,
    source: &str,
    analysis: &DocumentAnalysis,
    template_engine: &str,
) -> Result<Option<WorkspaceEdit>, String> {
    let new_name = &params.new_name;
    if !is_identifier(new_name) {
        return Err(format!("'{new_name}' is not a valid name"));
    }

    let position = params.text_document_position.position;
    let uri = params.text_document_position.text_document.uri.clone();

    let Some(context) = context_at(source, &analysis.symbols, position) else {
        return Ok(None);
    };

    let line_index = LineIndex::new(source);
    let edits: Vec<TextEdit> = occurrences(&analysis.symbols, &context, template_engine)
        .into_iter()
        .map(|o| TextEdit {
            range: line_index.span_to_range(o.span),
            new_text: new_name.clone(),
        })
        .collect();

    if edits.is_empty() {
        return Ok(None);
    }

    tracing::debug!("Renaming {} occurrences to {}", edits.len(), new_name);

    let mut changes = HashMap::new();
    changes.insert(uri, edits);

    Ok(Some(WorkspaceEdit {
        changes: Some(changes),
        document_changes: None,
        change_annotations: None,
    }))
}
