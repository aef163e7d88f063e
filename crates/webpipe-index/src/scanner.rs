//! Positional reference scanner.
//!
//! References are found by matching fixed textual shapes rather than by
//! walking the AST, because several of them (mocks, `when` clauses) sit in
//! places the grammar has no reason to model as references. Each hit records
//! the span of the referenced identifier only.
//!
//! | Shape | Kind |
//! |-------|------|
//! | `\|> pipeline: <name>` | pipeline |
//! | `when executing pipeline <name>` | pipeline |
//! | `with\|and mock pipeline <name> returning` | pipeline |
//! | `\|> <type>: <name>` (type is not `pipeline`) | variable `type::name` |
//! | `when executing variable <type> <name>` | variable `type::name` |
//! | `with\|and mock <type>.<name> returning` | variable `type::name` |

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use webpipe_core::{variable_key, Span};

use crate::pattern::compile;

/// `|> <type>: <name>`; group 1 is the step type, group 2 the name.
pub(crate) static STEP_REF: Lazy<Regex> =
    Lazy::new(|| compile(r"\|>[ \t]*(IDENT)[ \t]*:[ \t]*(IDENT)"));

/// `when executing pipeline <name>`.
pub(crate) static WHEN_PIPELINE: Lazy<Regex> =
    Lazy::new(|| compile(r"\bwhen[ \t]+executing[ \t]+pipeline[ \t]+(IDENT)"));

/// `when executing variable <type> <name>`.
pub(crate) static WHEN_VARIABLE: Lazy<Regex> =
    Lazy::new(|| compile(r"\bwhen[ \t]+executing[ \t]+variable[ \t]+(IDENT)[ \t]+(IDENT)"));

/// `with|and mock pipeline <name> returning`.
pub(crate) static MOCK_PIPELINE: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(?:with|and)[ \t]+mock[ \t]+pipeline[ \t]+(IDENT)[ \t]+returning\b")
});

/// `with|and mock <type>.<name> returning`.
pub(crate) static MOCK_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    compile(r"\b(?:with|and)[ \t]+mock[ \t]+(IDENT)\.(IDENT)[ \t]+returning\b")
});

/// References found in a document, grouped by symbol key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedReferences {
    /// Variable references keyed by `type::name`, in source order.
    pub variable_refs: BTreeMap<String, Vec<Span>>,
    /// Pipeline references keyed by pipeline name, in source order.
    pub pipeline_refs: BTreeMap<String, Vec<Span>>,
}

/// One reference hit, relative to the text it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefHit {
    Pipeline { name: String, span: Span },
    Variable { var_type: String, name: String, span: Span },
}

impl RefHit {
    pub(crate) const fn span(&self) -> Span {
        match self {
            Self::Pipeline { span, .. } | Self::Variable { span, .. } => *span,
        }
    }
}

fn group_span(caps: &Captures<'_>, group: usize) -> Option<(String, Span)> {
    caps.get(group)
        .map(|m| (m.as_str().to_string(), Span::new(m.start(), m.end())))
}

/// Whether the identifier ending at `end` stands alone (followed by
/// whitespace or the end of input).
fn is_bare(text: &str, end: usize) -> bool {
    text[end..].chars().next().map_or(true, char::is_whitespace)
}

/// `|> pipeline: <name>` and `|> <type>: <name>` hits in `text`.
pub(crate) fn step_hits(text: &str) -> Vec<RefHit> {
    let mut hits = Vec::new();
    for caps in STEP_REF.captures_iter(text) {
        let (Some((step_type, _)), Some((name, span))) = (group_span(&caps, 1), group_span(&caps, 2))
        else {
            continue;
        };
        if !is_bare(text, span.end) {
            continue;
        }
        if step_type == "pipeline" {
            hits.push(RefHit::Pipeline { name, span });
        } else {
            hits.push(RefHit::Variable {
                var_type: step_type,
                name,
                span,
            });
        }
    }
    hits
}

/// `when executing ...` and `with|and mock ...` hits in `text`.
pub(crate) fn bdd_hits(text: &str) -> Vec<RefHit> {
    let mut hits = Vec::new();

    for caps in WHEN_PIPELINE.captures_iter(text) {
        if let Some((name, span)) = group_span(&caps, 1) {
            if is_bare(text, span.end) {
                hits.push(RefHit::Pipeline { name, span });
            }
        }
    }
    for caps in WHEN_VARIABLE.captures_iter(text) {
        if let (Some((var_type, _)), Some((name, span))) = (group_span(&caps, 1), group_span(&caps, 2)) {
            if is_bare(text, span.end) {
                hits.push(RefHit::Variable { var_type, name, span });
            }
        }
    }
    for caps in MOCK_PIPELINE.captures_iter(text) {
        if let Some((name, span)) = group_span(&caps, 1) {
            hits.push(RefHit::Pipeline { name, span });
        }
    }
    for caps in MOCK_VARIABLE.captures_iter(text) {
        if let (Some((var_type, _)), Some((name, span))) = (group_span(&caps, 1), group_span(&caps, 2)) {
            hits.push(RefHit::Variable { var_type, name, span });
        }
    }

    hits
}

/// Scan `text` for every pipeline and variable reference.
#[must_use]
pub fn scan_references(text: &str) -> ScannedReferences {
    let mut hits = step_hits(text);
    hits.extend(bdd_hits(text));
    hits.sort_by_key(RefHit::span);

    let mut refs = ScannedReferences::default();
    for hit in hits {
        match hit {
            RefHit::Pipeline { name, span } => {
                refs.pipeline_refs.entry(name).or_default().push(span);
            }
            RefHit::Variable {
                var_type,
                name,
                span,
            } => {
                refs.variable_refs
                    .entry(variable_key(&var_type, &name))
                    .or_default()
                    .push(span);
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_step_reference() {
        let text = "pipeline foo =\n  |> jq: `{}`\n\nGET /x\n  |> pipeline: foo\n";
        let refs = scan_references(text);
        let spans = &refs.pipeline_refs["foo"];
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text(text), "foo");
        assert_eq!(spans[0].start, text.rfind("foo").unwrap_or(0));
        assert!(refs.variable_refs.is_empty());
    }

    #[test]
    fn test_variable_step_reference_is_keyed_by_type() {
        let text = "|> pg: getUser\n|> pg: getUser\n|> mysql: getUser";
        let refs = scan_references(text);
        assert_eq!(refs.variable_refs["pg::getUser"].len(), 2);
        assert_eq!(refs.variable_refs["mysql::getUser"].len(), 1);
    }

    #[test]
    fn test_literal_configs_are_not_references() {
        let text = "|> jq: `.foo`\n|> log: \"hello\"\n|> pg: half`x`";
        let refs = scan_references(text);
        assert!(refs.variable_refs.is_empty());
        assert!(refs.pipeline_refs.is_empty());
    }

    #[test]
    fn test_bdd_references() {
        let text = "\
describe \"d\"
  with mock pipeline auth returning `{}`
  and mock pg.getUser returning `[]`
  it \"x\"
    when executing pipeline loadUser
  it \"y\"
    when executing variable pg getUser
";
        let refs = scan_references(text);
        assert_eq!(refs.pipeline_refs["auth"][0].text(text), "auth");
        assert_eq!(refs.pipeline_refs["loadUser"][0].text(text), "loadUser");

        let get_user = &refs.variable_refs["pg::getUser"];
        assert_eq!(get_user.len(), 2);
        assert!(get_user[0].start < get_user[1].start);
        assert!(get_user.iter().all(|s| s.text(text) == "getUser"));
    }

    #[test]
    fn test_mock_without_returning_is_ignored() {
        let refs = scan_references("with mock pipeline auth\n");
        assert!(refs.pipeline_refs.is_empty());
    }

    #[test]
    fn test_references_are_in_source_order() {
        let text = "when executing pipeline p\n|> pipeline: p\nwith mock pipeline p returning `1`";
        let spans = &scan_references(text).pipeline_refs["p"];
        assert_eq!(spans.len(), 3);
        assert!(spans.windows(2).all(|w| w[0].start < w[1].start));
    }
}
