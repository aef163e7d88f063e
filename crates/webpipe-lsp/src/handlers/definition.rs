//! Go-to-definition handler.
//!
//! Provides navigation to symbol definitions:
//! - Pipeline reference → `pipeline name =`
//! - Typed variable reference → `type name = ...`
//! - Partial usage → inline `{{#*inline "name"}}` in the same template, else
//!   the template variable

use lsp_types::{GotoDefinitionParams, GotoDefinitionResponse, Location, Uri};
use webpipe_index::DocumentAnalysis;

use super::utils::{context_at, definition_span, LineIndex};

/// Handle a go-to-definition request.
pub fn handle_goto_definition(
    params: &GotoDefinitionParams,
    source: &str,
    analysis: &DocumentAnalysis,
    uri: &Uri,
) -> Option<GotoDefinitionResponse> {
    let position = params.text_document_position_params.position;

    let context = context_at(source, &analysis.symbols, position)?;
    tracing::debug!("Go-to-definition for {:?}", context);

    let span = definition_span(&analysis.symbols, &context)?;
    let range = LineIndex::new(source).span_to_range(span);

    Some(GotoDefinitionResponse::Scalar(Location {
        uri: uri.clone(),
        range,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{
        PartialResultParams, Position, TextDocumentIdentifier, TextDocumentPositionParams,
        WorkDoneProgressParams,
    };
    use webpipe_index::{analyze, IndexOptions};

    const SOURCE: &str = "\
pg getUser = `SELECT 1`

pipeline loadUser =
  |> pg: getUser

GET /users |> pipeline: loadUser
";

    fn definition_at(line: u32, character: u32) -> Option<GotoDefinitionResponse> {
        let uri: Uri = "file:///test.wp".parse().expect("valid uri");
        let params = GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                position: Position::new(line, character),
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let analysis = analyze(SOURCE, &IndexOptions::default());
        handle_goto_definition(&params, SOURCE, &analysis, &uri)
    }

    fn target_line(response: Option<GotoDefinitionResponse>) -> Option<(u32, u32)> {
        match response? {
            GotoDefinitionResponse::Scalar(location) => {
                Some((location.range.start.line, location.range.start.character))
            }
            _ => None,
        }
    }

    #[test]
    fn test_pipeline_reference() {
        assert_eq!(target_line(definition_at(5, 26)), Some((2, 9)));
    }

    #[test]
    fn test_variable_reference() {
        assert_eq!(target_line(definition_at(3, 10)), Some((0, 3)));
    }

    #[test]
    fn test_no_symbol() {
        assert_eq!(definition_at(5, 1), None);
        assert_eq!(definition_at(40, 0), None);
    }
}
