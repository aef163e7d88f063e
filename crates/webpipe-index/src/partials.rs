//! Partial-template symbols.
//!
//! Template content lives in two places: the body of a variable whose type is
//! the template engine (`handlebars card = \`...\``) and the backtick config
//! of a `|> handlebars: \`...\`` step. Inside each such region this module
//! records inline partial definitions (`{{#*inline "name"}}...{{/inline}}`)
//! and partial usages (`{{> name}}`, `{{#> name}}`).
//!
//! A usage resolves to an inline definition in the same region first, then
//! to a global template variable of the same name. Inline definitions are
//! never visible outside their region.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use webpipe_core::{Program, Span, Step, StepConfig};

use crate::pattern::compile;

/// Default template engine name.
pub const DEFAULT_TEMPLATE_ENGINE: &str = "handlebars";

/// Usage name that refers to the caller's block, never to a declaration.
const PARTIAL_BLOCK: &str = "@partial-block";

static INLINE_OPEN: Lazy<Regex> =
    Lazy::new(|| compile(r#"\{\{~?#\*inline\s+"([^"]+)"\s*~?\}\}"#));
static INLINE_CLOSE: Lazy<Regex> = Lazy::new(|| compile(r"\{\{~?/inline\s*~?\}\}"));
static USAGE: Lazy<Regex> = Lazy::new(|| compile(r"\{\{~?#?>\s*([^\s}~]+)"));

/// Inline partials defined inside one content region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineScope {
    /// The content region the definitions belong to.
    pub range: Span,
    /// Span of each inline partial's quoted name.
    pub inline_by_name: BTreeMap<String, Span>,
    /// Span of each inline partial's whole `{{#*inline}}...{{/inline}}` block.
    pub inline_block_by_name: BTreeMap<String, Span>,
}

/// Template symbols for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlebarsSymbols {
    /// Global partials: template variable name to its name span.
    pub decl_by_name: BTreeMap<String, Span>,
    /// Every template content region, in source order.
    pub content_ranges: Vec<Span>,
    /// Partial usages by name, in source order.
    pub usages_by_name: BTreeMap<String, Vec<Span>>,
    /// Inline definitions, one scope per region that defines any.
    pub inline_defs_by_content: Vec<InlineScope>,
}

/// What a partial usage refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialResolution {
    /// An inline definition in the usage's own content region.
    Inline {
        /// Span of the inline partial's name.
        name_span: Span,
        /// Span of the whole inline block.
        block_span: Span,
        /// The content region both live in.
        region: Span,
    },
    /// A global template variable.
    Global {
        /// Span of the variable's name.
        name_span: Span,
    },
    /// Nothing by that name is visible.
    Unresolved,
}

impl HandlebarsSymbols {
    /// Collect template symbols from a parsed document.
    ///
    /// `text` must be the source the program was parsed from.
    #[must_use]
    pub fn collect(program: &Program, text: &str, template_engine: &str) -> Self {
        let mut symbols = Self::default();

        for var in &program.variables {
            if var.value.var_type == template_engine {
                symbols
                    .decl_by_name
                    .insert(var.value.name.clone(), var.value.name_span);
                symbols.content_ranges.push(var.value.value_span);
            }
        }

        for pipeline in program.all_pipelines() {
            for step in &pipeline.steps {
                if let Step::Regular {
                    name,
                    config: StepConfig::Backtick(_),
                    config_span,
                } = &step.value
                {
                    if name == template_engine {
                        symbols.content_ranges.push(*config_span);
                    }
                }
            }
        }

        symbols.content_ranges.sort();
        symbols.content_ranges.dedup();

        let ranges = symbols.content_ranges.clone();
        for range in ranges {
            symbols.scan_region(text, range);
        }
        symbols
    }

    fn scan_region(&mut self, text: &str, range: Span) {
        let content = range.text(text);
        if content.is_empty() {
            return;
        }

        for caps in USAGE.captures_iter(content) {
            let Some(name) = caps.get(1) else { continue };
            if name.as_str() == PARTIAL_BLOCK {
                continue;
            }
            self.usages_by_name
                .entry(name.as_str().to_string())
                .or_default()
                .push(Span::new(range.start + name.start(), range.start + name.end()));
        }

        let mut scope = InlineScope {
            range,
            ..InlineScope::default()
        };
        for caps in INLINE_OPEN.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let block_end = INLINE_CLOSE
                .find_at(content, whole.end())
                .map_or(content.len(), |m| m.end());
            scope.inline_by_name.insert(
                name.as_str().to_string(),
                Span::new(range.start + name.start(), range.start + name.end()),
            );
            scope.inline_block_by_name.insert(
                name.as_str().to_string(),
                Span::new(range.start + whole.start(), range.start + block_end),
            );
        }
        if !scope.inline_by_name.is_empty() {
            self.inline_defs_by_content.push(scope);
        }
    }

    /// The content region containing `offset`, if any.
    #[must_use]
    pub fn region_at(&self, offset: usize) -> Option<Span> {
        self.content_ranges
            .iter()
            .copied()
            .find(|range| range.contains(offset))
    }

    /// Resolve a usage of partial `name` located at `offset`.
    #[must_use]
    pub fn resolve_partial(&self, name: &str, offset: usize) -> PartialResolution {
        let local = self
            .inline_defs_by_content
            .iter()
            .filter(|scope| scope.range.contains(offset))
            .find_map(|scope| {
                let name_span = *scope.inline_by_name.get(name)?;
                let block_span = *scope.inline_block_by_name.get(name)?;
                Some(PartialResolution::Inline {
                    name_span,
                    block_span,
                    region: scope.range,
                })
            });
        if let Some(local) = local {
            return local;
        }

        match self.decl_by_name.get(name) {
            Some(&name_span) => PartialResolution::Global { name_span },
            None => PartialResolution::Unresolved,
        }
    }

    /// Usages of `name` that resolve to the global declaration.
    pub fn global_usages<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Span> + 'a {
        self.usages_by_name
            .get(name)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |usage| {
                matches!(
                    self.resolve_partial(name, usage.start),
                    PartialResolution::Global { .. }
                )
            })
    }

    /// Usages of `name` inside `region` (the scope of an inline definition).
    pub fn usages_in<'a>(&'a self, name: &str, region: Span) -> impl Iterator<Item = Span> + 'a {
        self.usages_by_name
            .get(name)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |usage| region.encloses(usage))
    }

    /// The inline definition whose name span contains `offset`.
    #[must_use]
    pub fn inline_name_at(&self, offset: usize) -> Option<(&str, Span, Span)> {
        self.inline_defs_by_content.iter().find_map(|scope| {
            scope
                .inline_by_name
                .iter()
                .find(|(_, span)| span.contains(offset))
                .map(|(name, span)| (name.as_str(), *span, scope.range))
        })
    }
}
