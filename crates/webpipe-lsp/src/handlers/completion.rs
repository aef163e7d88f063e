//! Completion handler for autocompletion.
//!
//! Provides context-aware completions for:
//! - Pipeline names (after `|> pipeline:`, `when executing pipeline`,
//!   `mock pipeline`)
//! - Variable names of the right type (after `|> pg:`,
//!   `when executing variable pg`, `mock pg.`)
//! - Step types (after `|>`)
//! - Partial names inside template content (after `{{>`)

use lsp_types::{CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use webpipe_index::pattern::compile;
use webpipe_index::DocumentAnalysis;

use super::utils::LineIndex;

static PIPELINE_STEP: Lazy<Regex> =
    Lazy::new(|| compile(r"\|>[ \t]*pipeline[ \t]*:[ \t]*(?:IDENT)?$"));
static VARIABLE_STEP: Lazy<Regex> =
    Lazy::new(|| compile(r"\|>[ \t]*(IDENT)[ \t]*:[ \t]*(?:IDENT)?$"));
static STEP_TYPE: Lazy<Regex> = Lazy::new(|| compile(r"\|>[ \t]*(?:IDENT)?$"));
static WHEN_PIPELINE: Lazy<Regex> =
    Lazy::new(|| compile(r"\bwhen[ \t]+executing[ \t]+pipeline[ \t]+(?:IDENT)?$"));
static WHEN_VARIABLE: Lazy<Regex> =
    Lazy::new(|| compile(r"\bwhen[ \t]+executing[ \t]+variable[ \t]+(IDENT)[ \t]+(?:IDENT)?$"));
static MOCK_PIPELINE: Lazy<Regex> =
    Lazy::new(|| compile(r"\bmock[ \t]+pipeline[ \t]+(?:IDENT)?$"));
static MOCK_VARIABLE: Lazy<Regex> = Lazy::new(|| compile(r"\bmock[ \t]+(IDENT)\.(?:IDENT)?$"));
static PARTIAL: Lazy<Regex> = Lazy::new(|| compile(r"\{\{~?#?>[ \t]*[^\s}~]*$"));

/// Completion context detected from cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionContext {
    /// A pipeline name is expected.
    PipelineName,
    /// A variable name of the given type is expected.
    VariableName {
        /// The variable type, e.g. `pg`.
        var_type: String,
    },
    /// A step type is expected after `|>`.
    StepType,
    /// A partial name inside template content.
    PartialName {
        /// Byte offset of the cursor.
        offset: usize,
    },
    /// Nothing to complete.
    Unknown,
}

/// Handle a completion request.
pub fn handle_completion(
    params: &CompletionParams,
    source: &str,
    analysis: &DocumentAnalysis,
) -> Option<CompletionResponse> {
    let position = params.text_document_position.position;
    let offset = LineIndex::new(source).offset_of(position)?;
    let context = detect_context(source, offset, analysis);

    tracing::debug!("Completion context: {:?} at {:?}", context, position);

    let items = match context {
        CompletionContext::PipelineName => complete_pipelines(analysis),
        CompletionContext::VariableName { var_type } => complete_variables(&var_type, analysis),
        CompletionContext::StepType => complete_step_types(analysis),
        CompletionContext::PartialName { offset } => complete_partials(offset, analysis),
        CompletionContext::Unknown => return None,
    };

    if items.is_empty() {
        None
    } else {
        Some(CompletionResponse::Array(items))
    }
}

/// Detect the completion context from the text before the cursor.
pub fn detect_context(
    source: &str,
    offset: usize,
    analysis: &DocumentAnalysis,
) -> CompletionContext {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let before_cursor = &source[line_start..offset];

    if analysis.symbols.handlebars.region_at(offset).is_some() {
        if PARTIAL.is_match(before_cursor) {
            return CompletionContext::PartialName { offset };
        }
        return CompletionContext::Unknown;
    }

    if PIPELINE_STEP.is_match(before_cursor)
        || WHEN_PIPELINE.is_match(before_cursor)
        || MOCK_PIPELINE.is_match(before_cursor)
    {
        return CompletionContext::PipelineName;
    }

    let typed = [&*VARIABLE_STEP, &*WHEN_VARIABLE, &*MOCK_VARIABLE]
        .iter()
        .find_map(|re| re.captures(before_cursor)?.get(1));
    if let Some(var_type) = typed {
        return CompletionContext::VariableName {
            var_type: var_type.as_str().to_string(),
        };
    }

    if STEP_TYPE.is_match(before_cursor) {
        return CompletionContext::StepType;
    }

    CompletionContext::Unknown
}

fn complete_pipelines(analysis: &DocumentAnalysis) -> Vec<CompletionItem> {
    analysis
        .symbols
        .pipeline_names
        .iter()
        .map(|name| CompletionItem {
            label: name.clone(),
            kind: Some(CompletionItemKind::FUNCTION),
            detail: Some("pipeline".to_string()),
            ..Default::default()
        })
        .collect()
}

fn complete_variables(var_type: &str, analysis: &DocumentAnalysis) -> Vec<CompletionItem> {
    analysis
        .symbols
        .variable_names(var_type)
        .map(|name| CompletionItem {
            label: name.to_string(),
            kind: Some(CompletionItemKind::VARIABLE),
            detail: Some(var_type.to_string()),
            ..Default::default()
        })
        .collect()
}

fn complete_step_types(analysis: &DocumentAnalysis) -> Vec<CompletionItem> {
    std::iter::once("pipeline")
        .chain(analysis.symbols.variables_by_type.keys().map(String::as_str))
        .map(|step| CompletionItem {
            label: step.to_string(),
            kind: Some(CompletionItemKind::KEYWORD),
            detail: Some("step".to_string()),
            ..Default::default()
        })
        .collect()
}

fn complete_partials(offset: usize, analysis: &DocumentAnalysis) -> Vec<CompletionItem> {
    let partials = &analysis.symbols.handlebars;

    let inline = partials
        .inline_defs_by_content
        .iter()
        .filter(|scope| scope.range.contains(offset))
        .flat_map(|scope| scope.inline_by_name.keys())
        .map(|name| partial_item(name, "inline partial"));

    let global = partials
        .decl_by_name
        .keys()
        .map(|name| partial_item(name, "partial"));

    let mut items: Vec<CompletionItem> = inline.chain(global).collect();
    items.sort_by(|a, b| a.label.cmp(&b.label));
    items.dedup_by(|a, b| a.label == b.label);
    items
}

fn partial_item(name: &str, detail: &str) -> CompletionItem {
    CompletionItem {
        label: name.to_string(),
        kind: Some(CompletionItemKind::MODULE),
        detail: Some(detail.to_string()),
        ..Default::default()
    }
}
