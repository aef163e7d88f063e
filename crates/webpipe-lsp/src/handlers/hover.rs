//! Hover handler for displaying information about symbols.
//!
//! Provides hover information for:
//! - Pipelines: step count and reference count
//! - Typed variables: the declared body
//! - Partials: where the usage resolves

use lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};
use webpipe_core::Program;
use webpipe_index::{
    DocumentAnalysis, PartialResolution, SymbolContext, SymbolKey, SymbolTable,
};

use super::utils::{context_at, LineIndex};

/// Longest variable body shown verbatim.
const MAX_PREVIEW_LINES: usize = 12;

/// Handle a hover request.
pub fn handle_hover(
    params: &HoverParams,
    source: &str,
    analysis: &DocumentAnalysis,
) -> Option<Hover> {
    let position = params.text_document_position_params.position;
    let context = context_at(source, &analysis.symbols, position)?;

    tracing::debug!("Hover for {:?}", context);

    let info = match &context {
        SymbolContext::Symbol { key, .. } => symbol_info(key, &analysis.program, &analysis.symbols),
        SymbolContext::Partial { name, span, .. } => partial_info(name, span.start, &analysis.symbols),
    };

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: info,
        }),
        range: Some(LineIndex::new(source).span_to_range(context.span())),
    })
}

fn symbol_info(key: &SymbolKey, program: &Program, symbols: &SymbolTable) -> String {
    let refs = symbols.references_of(key).len();
    let mut info = format!("```webpipe\n{key}\n```\n");

    match key {
        SymbolKey::Pipeline(name) => match program.pipeline(name) {
            Some(pipeline) => {
                let steps = pipeline.value.pipeline.steps.len();
                info.push_str(&format!("\n{steps} step{}", plural(steps)));
            }
            None => info.push_str("\n*Not declared in this file*"),
        },
        SymbolKey::Variable { var_type, name } => match program.variable(var_type, name) {
            Some(variable) => {
                let body = &variable.value.value;
                let lines: Vec<&str> = body.lines().collect();
                info.push_str(&format!("\n```{var_type}\n"));
                for line in lines.iter().take(MAX_PREVIEW_LINES) {
                    info.push_str(line);
                    info.push('\n');
                }
                if lines.len() > MAX_PREVIEW_LINES {
                    info.push_str("...\n");
                }
                info.push_str("```");
            }
            None => info.push_str("\n*Not declared in this file*"),
        },
    }

    info.push_str(&format!("\n\n{refs} reference{}", plural(refs)));
    info
}

fn partial_info(name: &str, offset: usize, symbols: &SymbolTable) -> String {
    let target = match symbols.handlebars.resolve_partial(name, offset) {
        PartialResolution::Inline { .. } => "inline partial defined in this template",
        PartialResolution::Global { .. } => "global partial",
        PartialResolution::Unresolved => "*unknown partial*",
    };
    format!("**{name}**: {target}")
}

const fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{
        Position, TextDocumentIdentifier, TextDocumentPositionParams, Uri,
        WorkDoneProgressParams,
    };
    use webpipe_index::{analyze, IndexOptions};

    const SOURCE: &str = "\
pg getUser = `SELECT * FROM users`
handlebars row = `<tr/>`

pipeline loadUser =
  |> pg: getUser
  |> handlebars: `{{> row}}{{> cell}}`
";

    fn hover_text(line: u32, character: u32) -> Option<String> {
        let uri: Uri = "file:///test.wp".parse().expect("valid uri");
        let params = HoverParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position: Position::new(line, character),
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
        };
        let analysis = analyze(SOURCE, &IndexOptions::default());
        match handle_hover(&params, SOURCE, &analysis)?.contents {
            HoverContents::Markup(markup) => Some(markup.value),
            _ => None,
        }
    }

    #[test]
    fn test_variable_hover_shows_body() {
        let text = hover_text(4, 10).expect("hover");
        assert!(text.contains("pg getUser"));
        assert!(text.contains("SELECT * FROM users"));
        assert!(text.contains("1 reference"));
    }

    #[test]
    fn test_pipeline_hover() {
        let text = hover_text(3, 12).expect("hover");
        assert!(text.contains("pipeline loadUser"));
        assert!(text.contains("2 steps"));
        assert!(text.contains("0 references"));
    }

    #[test]
    fn test_partial_hover() {
        let global = hover_text(5, 23).expect("hover");
        assert!(global.contains("global partial"));
        let unknown = hover_text(5, 33).expect("hover");
        assert!(unknown.contains("unknown partial"));
    }

    #[test]
    fn test_no_hover_on_keywords() {
        assert!(hover_text(3, 2).is_none());
    }
}
