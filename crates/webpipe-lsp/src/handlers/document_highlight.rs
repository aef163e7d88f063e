//! Document highlight handler for highlighting all occurrences.
//!
//! The declaration is highlighted as a write, every reference as a read.

use lsp_types::{DocumentHighlight, DocumentHighlightKind, DocumentHighlightParams};
use webpipe_index::DocumentAnalysis;

use super::utils::{context_at, occurrences, LineIndex};

/// Handle a document highlight request.
pub fn handle_document_highlight(
    params: &DocumentHighlightParams,
    source: &str,
    analysis: &DocumentAnalysis,
    template_engine: &str,
) -> Option<Vec<DocumentHighlight>> {
    let position = params.text_document_position_params.position;
    let context = context_at(source, &analysis.symbols, position)?;
    let line_index = LineIndex::new(source);

    let highlights: Vec<DocumentHighlight> =
        occurrences(&analysis.symbols, &context, template_engine)
            .into_iter()
            .map(|o| DocumentHighlight {
                range: line_index.span_to_range(o.span),
                kind: Some(if o.is_declaration {
                    DocumentHighlightKind::WRITE
                } else {
                    DocumentHighlightKind::READ
                }),
            })
            .collect();

    if highlights.is_empty() {
        None
    } else {
        Some(highlights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{
        PartialResultParams, Position, TextDocumentIdentifier, TextDocumentPositionParams, Uri,
        WorkDoneProgressParams,
    };
    use webpipe_index::{analyze, IndexOptions};

    fn highlights(source: &str, line: u32, character: u32) -> Option<Vec<DocumentHighlight>> {
        let uri: Uri = "file:///test.wp".parse().expect("valid uri");
        let params = DocumentHighlightParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position: Position::new(line, character),
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let analysis = analyze(source, &IndexOptions::default());
        handle_document_highlight(&params, source, &analysis, "handlebars")
    }

    #[test]
    fn test_variable_highlights() {
        let source = "pg q = `SELECT 1`\npipeline a =\n  |> pg: q\n  |> pg: q\n";
        let found = highlights(source, 2, 9).expect("highlights");
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].kind, Some(DocumentHighlightKind::WRITE));
        assert!(found[1..]
            .iter()
            .all(|h| h.kind == Some(DocumentHighlightKind::READ)));
    }

    #[test]
    fn test_unresolved_partial_highlights_usages_only() {
        let source = "handlebars page = `{{> nav}}{{> nav}}`\n";
        let found = highlights(source, 0, 24).expect("highlights");
        assert_eq!(found.len(), 2);
        assert!(found
            .iter()
            .all(|h| h.kind == Some(DocumentHighlightKind::READ)));
    }

    #[test]
    fn test_nothing_under_cursor() {
        assert!(highlights("GET /x |> jq: `.`\n", 0, 1).is_none());
    }
}
