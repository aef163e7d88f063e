//! Cursor context resolution.
//!
//! Classifies the identifier under a cursor by matching the enclosing line
//! against the reference and declaration shapes. Shapes are tried in a fixed
//! priority order and the first one whose identifier span contains the
//! offset wins:
//!
//! 1. pipeline lines (`pipeline name =`, `|> pipeline: name`)
//! 2. variable declarations (`type name = \``)
//! 3. step references (`|> type: name`)
//! 4. BDD `when` and `mock` clauses
//! 5. partial usages and inline definitions inside template content

use once_cell::sync::Lazy;
use regex::Regex;
use webpipe_core::Span;

use crate::pattern::compile;
use crate::scanner::{bdd_hits, step_hits, RefHit};
use crate::symbols::{SymbolKey, SymbolTable};

static PIPELINE_DECL: Lazy<Regex> =
    Lazy::new(|| compile(r"^[ \t]*pipeline[ \t]+(IDENT)[ \t]*="));
static VARIABLE_DECL: Lazy<Regex> =
    Lazy::new(|| compile(r"^[ \t]*(IDENT)[ \t]+(IDENT)[ \t]*=[ \t]*`"));

/// Type words that never start a variable declaration.
const RESERVED_TYPES: &[&str] = &["pipeline", "config", "describe", "it"];

/// What the cursor is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolContext {
    /// A pipeline or typed variable, at a declaration or a reference.
    Symbol {
        /// Which symbol.
        key: SymbolKey,
        /// The identifier under the cursor.
        span: Span,
    },
    /// A partial name inside template content.
    Partial {
        /// Partial name.
        name: String,
        /// The identifier under the cursor.
        span: Span,
        /// The content region the cursor is in.
        region: Span,
    },
}

impl SymbolContext {
    /// The identifier span under the cursor.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Symbol { span, .. } | Self::Partial { span, .. } => *span,
        }
    }
}

/// Largest char boundary not after `offset`.
fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Start and end (exclusive of the newline) of the line containing `offset`.
fn line_bounds(text: &str, offset: usize) -> (usize, usize) {
    let start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
    (start, end)
}

fn hit_to_context(hit: RefHit, base: usize) -> SymbolContext {
    let shift = |span: Span| Span::new(base + span.start, base + span.end);
    match hit {
        RefHit::Pipeline { name, span } => SymbolContext::Symbol {
            key: SymbolKey::Pipeline(name),
            span: shift(span),
        },
        RefHit::Variable {
            var_type,
            name,
            span,
        } => SymbolContext::Symbol {
            key: SymbolKey::variable(var_type, name),
            span: shift(span),
        },
    }
}

/// Classify the cursor at byte `offset` in `text`.
///
/// Returns `None` when the cursor is not on a known symbol shape.
#[must_use]
pub fn resolve_context(text: &str, offset: usize, symbols: &SymbolTable) -> Option<SymbolContext> {
    if offset > text.len() {
        return None;
    }
    let offset = floor_char_boundary(text, offset);
    let (line_start, line_end) = line_bounds(text, offset);
    let line = &text[line_start..line_end];
    let local = offset - line_start;

    if let Some(context) = pipeline_line(line, local, line_start) {
        return Some(context);
    }
    if let Some(context) = variable_declaration(line, local, line_start) {
        return Some(context);
    }

    let steps = step_hits(line);
    if let Some(hit) = steps
        .iter()
        .find(|hit| matches!(hit, RefHit::Variable { .. }) && hit.span().contains(local))
    {
        return Some(hit_to_context(hit.clone(), line_start));
    }

    if let Some(hit) = bdd_hits(line).into_iter().find(|hit| hit.span().contains(local)) {
        return Some(hit_to_context(hit, line_start));
    }

    partial_context(offset, symbols)
}

fn pipeline_line(line: &str, local: usize, base: usize) -> Option<SymbolContext> {
    if let Some(name) = PIPELINE_DECL.captures(line).and_then(|c| c.get(1)) {
        if Span::new(name.start(), name.end()).contains(local) {
            return Some(SymbolContext::Symbol {
                key: SymbolKey::Pipeline(name.as_str().to_string()),
                span: Span::new(base + name.start(), base + name.end()),
            });
        }
    }

    step_hits(line)
        .into_iter()
        .find(|hit| matches!(hit, RefHit::Pipeline { .. }) && hit.span().contains(local))
        .map(|hit| hit_to_context(hit, base))
}

fn variable_declaration(line: &str, local: usize, base: usize) -> Option<SymbolContext> {
    let caps = VARIABLE_DECL.captures(line)?;
    let (var_type, name) = (caps.get(1)?, caps.get(2)?);
    if RESERVED_TYPES.contains(&var_type.as_str()) {
        return None;
    }
    let span = Span::new(name.start(), name.end());
    span.contains(local).then(|| SymbolContext::Symbol {
        key: SymbolKey::variable(var_type.as_str(), name.as_str()),
        span: Span::new(base + span.start, base + span.end),
    })
}

fn partial_context(offset: usize, symbols: &SymbolTable) -> Option<SymbolContext> {
    let partials = &symbols.handlebars;
    let region = partials.region_at(offset)?;

    if let Some((name, span, region)) = partials.inline_name_at(offset) {
        return Some(SymbolContext::Partial {
            name: name.to_string(),
            span,
            region,
        });
    }

    partials
        .usages_by_name
        .iter()
        .find_map(|(name, usages)| {
            usages
                .iter()
                .find(|usage| region.encloses(usage) && usage.contains(offset))
                .map(|&span| SymbolContext::Partial {
                    name: name.clone(),
                    span,
                    region,
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyze, IndexOptions};

    const DOC: &str = "\
pg getUser = `SELECT 1`

handlebars header = `<h1/>`

pipeline loadUser =
  |> pg: getUser
  |> handlebars: `{{#*inline \"row\"}}r{{/inline}}{{> row}}{{> header}}`

GET /users |> pipeline: loadUser

describe \"users\"
  with mock pg.getUser returning `[]`
  it \"loads\"
    when executing pipeline loadUser
    then status is 200
";

    fn context_at(needle: &str, nth: usize, delta: usize) -> Option<SymbolContext> {
        let offset = DOC
            .match_indices(needle)
            .nth(nth)
            .map(|(i, _)| i + delta)
            .unwrap_or(usize::MAX);
        let symbols = analyze(DOC, &IndexOptions::default()).symbols;
        resolve_context(DOC, offset, &symbols)
    }

    fn key_at(needle: &str, nth: usize) -> Option<SymbolKey> {
        match context_at(needle, nth, 1)? {
            SymbolContext::Symbol { key, .. } => Some(key),
            SymbolContext::Partial { .. } => None,
        }
    }

    #[test]
    fn test_pipeline_declaration_and_references() {
        let expected = Some(SymbolKey::Pipeline("loadUser".to_string()));
        assert_eq!(key_at("loadUser", 0), expected);
        assert_eq!(key_at("loadUser", 1), expected);
        assert_eq!(key_at("loadUser", 2), expected);
    }

    #[test]
    fn test_variable_declaration_step_and_mock() {
        let expected = Some(SymbolKey::variable("pg", "getUser"));
        assert_eq!(key_at("getUser", 0), expected);
        assert_eq!(key_at("getUser", 1), expected);
        assert_eq!(key_at("getUser", 2), expected);
    }

    #[test]
    fn test_span_is_identifier_only() {
        let context = context_at("getUser", 1, 0);
        let span = context.map(|c| c.span());
        assert_eq!(span.map(|s| s.text(DOC)), Some("getUser"));
    }

    #[test]
    fn test_partial_usage_and_inline_definition() {
        match context_at("{{> row", 0, 5) {
            Some(SymbolContext::Partial { name, span, .. }) => {
                assert_eq!(name, "row");
                assert_eq!(span.text(DOC), "row");
            }
            other => panic!("expected partial, got {other:?}"),
        }
        match context_at("\"row\"", 0, 1) {
            Some(SymbolContext::Partial { name, .. }) => assert_eq!(name, "row"),
            other => panic!("expected inline definition, got {other:?}"),
        }
        match context_at("{{> header", 0, 6) {
            Some(SymbolContext::Partial { name, .. }) => assert_eq!(name, "header"),
            other => panic!("expected partial, got {other:?}"),
        }
    }

    #[test]
    fn test_nothing_under_cursor() {
        assert_eq!(context_at("then status", 0, 6), None);
        assert_eq!(context_at("GET", 0, 1), None);
        let symbols = analyze(DOC, &IndexOptions::default()).symbols;
        assert_eq!(resolve_context(DOC, DOC.len() + 10, &symbols), None);
    }
}
