//! Document symbols handler for outline view.
//!
//! Lists the top-level declarations of a webpipe file in source order:
//! config blocks, named pipelines, typed variables, routes and describe
//! blocks.

use lsp_types::{DocumentSymbol, DocumentSymbolParams, DocumentSymbolResponse, SymbolKind};
use webpipe_core::{PipelineRef, Span};
use webpipe_index::DocumentAnalysis;

use super::utils::LineIndex;

/// Handle a document symbols request.
pub fn handle_document_symbols(
    _params: &DocumentSymbolParams,
    source: &str,
    analysis: &DocumentAnalysis,
) -> Option<DocumentSymbolResponse> {
    let line_index = LineIndex::new(source);
    let program = &analysis.program;

    let mut entries: Vec<(usize, DocumentSymbol)> = Vec::with_capacity(program.len());

    for config in &program.configs {
        let count = config.value.properties.len();
        entries.push((
            config.span.start,
            symbol(
                format!("config {}", config.value.name),
                Some(format!("{count} properties")),
                SymbolKind::NAMESPACE,
                config.span,
                config.span,
                &line_index,
            ),
        ));
    }

    for pipeline in &program.pipelines {
        entries.push((
            pipeline.span.start,
            symbol(
                pipeline.value.name.clone(),
                Some("pipeline".to_string()),
                SymbolKind::FUNCTION,
                pipeline.span,
                pipeline.value.name_span,
                &line_index,
            ),
        ));
    }

    for variable in &program.variables {
        entries.push((
            variable.span.start,
            symbol(
                variable.value.name.clone(),
                Some(variable.value.var_type.clone()),
                SymbolKind::VARIABLE,
                variable.span,
                variable.value.name_span,
                &line_index,
            ),
        ));
    }

    for route in &program.routes {
        let detail = match &route.value.pipeline {
            PipelineRef::Named(name) => Some(format!("pipeline {name}")),
            PipelineRef::Inline(_) => None,
        };
        entries.push((
            route.span.start,
            symbol(
                format!("{} {}", route.value.method, route.value.path),
                detail,
                SymbolKind::METHOD,
                route.span,
                route.span,
                &line_index,
            ),
        ));
    }

    for describe in &program.describes {
        let count = describe.value.tests.len();
        entries.push((
            describe.span.start,
            symbol(
                format!("describe \"{}\"", describe.value.name),
                Some(format!("{count} tests")),
                SymbolKind::MODULE,
                describe.span,
                describe.span,
                &line_index,
            ),
        ));
    }

    if entries.is_empty() {
        return None;
    }

    entries.sort_by_key(|(start, _)| *start);
    Some(DocumentSymbolResponse::Nested(
        entries.into_iter().map(|(_, s)| s).collect(),
    ))
}

#[allow(deprecated)] // DocumentSymbol::deprecated field is deprecated but required
fn symbol(
    name: String,
    detail: Option<String>,
    kind: SymbolKind,
    span: Span,
    selection: Span,
    line_index: &LineIndex<'_>,
) -> DocumentSymbol {
    DocumentSymbol {
        name,
        detail,
        kind,
        tags: None,
        deprecated: None,
        range: line_index.span_to_range(span),
        selection_range: line_index.span_to_range(selection),
        children: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpipe_index::{analyze, IndexOptions};

    #[test]
    fn test_document_symbols_in_source_order() {
        let source = r#"config pg {
  host: "localhost"
}

pg getUser = `SELECT 1`

pipeline loadUser =
  |> pg: getUser

GET /users |> pipeline: loadUser

describe "users"
  it "loads"
    when executing pipeline loadUser
    then status is 200
"#;
        let analysis = analyze(source, &IndexOptions::default());
        let params = DocumentSymbolParams {
            text_document: lsp_types::TextDocumentIdentifier {
                uri: "file:///test.wp".parse().expect("valid uri"),
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };

        let Some(DocumentSymbolResponse::Nested(symbols)) =
            handle_document_symbols(&params, source, &analysis)
        else {
            panic!("expected nested symbols");
        };

        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "config pg",
                "getUser",
                "loadUser",
                "GET /users",
                "describe \"users\""
            ]
        );
        assert_eq!(symbols[2].kind, SymbolKind::FUNCTION);
        assert_eq!(symbols[2].selection_range.start.character, 9);
        assert_eq!(symbols[3].detail.as_deref(), Some("pipeline loadUser"));
        assert_eq!(symbols[4].detail.as_deref(), Some("1 tests"));
    }

    #[test]
    fn test_empty_document() {
        let analysis = analyze("", &IndexOptions::default());
        let params = DocumentSymbolParams {
            text_document: lsp_types::TextDocumentIdentifier {
                uri: "file:///test.wp".parse().expect("valid uri"),
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        assert!(handle_document_symbols(&params, "", &analysis).is_none());
    }
}
