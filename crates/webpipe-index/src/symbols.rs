//! The per-document symbol table.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use webpipe_core::{split_variable_key, variable_key, Span};
use webpipe_parser::{DeclarationRange, ParseResult};

use crate::partials::HandlebarsSymbols;
use crate::scanner::ScannedReferences;

/// Identity of a pipeline or typed variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKey {
    /// A named pipeline.
    Pipeline(String),
    /// A typed variable.
    Variable {
        /// Variable type, e.g. `pg`.
        var_type: String,
        /// Variable name.
        name: String,
    },
}

impl SymbolKey {
    /// Key for a typed variable.
    pub fn variable(var_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Variable {
            var_type: var_type.into(),
            name: name.into(),
        }
    }

    /// Parse a table key: `type::name` is a variable, anything else a pipeline.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match split_variable_key(key) {
            Some((var_type, name)) => Self::variable(var_type, name),
            None => Self::Pipeline(key.to_string()),
        }
    }

    /// The table key: `type::name` or the bare pipeline name.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Pipeline(name) => name.clone(),
            Self::Variable { var_type, name } => variable_key(var_type, name),
        }
    }

    /// The bare declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Pipeline(name) | Self::Variable { name, .. } => name,
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline(name) => write!(f, "pipeline {name}"),
            Self::Variable { var_type, name } => write!(f, "{var_type} {name}"),
        }
    }
}

/// Declarations and references of one document version.
///
/// Immutable once built. Position tables keep the last declaration of a
/// duplicated name; the name sets collapse duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    /// Declared variable names by type.
    pub variables_by_type: BTreeMap<String, BTreeSet<String>>,
    /// Declared pipeline names.
    pub pipeline_names: BTreeSet<String>,
    /// Name token of each variable declaration, keyed `type::name`.
    pub variable_positions: HashMap<String, Span>,
    /// Name token of each pipeline declaration.
    pub pipeline_positions: HashMap<String, Span>,
    /// Variable references keyed `type::name`, in source order.
    pub variable_refs: BTreeMap<String, Vec<Span>>,
    /// Pipeline references, in source order.
    pub pipeline_refs: BTreeMap<String, Vec<Span>>,
    /// Template partial symbols.
    pub handlebars: HandlebarsSymbols,
}

impl SymbolTable {
    /// Span of the declared name for `key`.
    #[must_use]
    pub fn declaration_of(&self, key: &SymbolKey) -> Option<Span> {
        match key {
            SymbolKey::Pipeline(name) => self.pipeline_positions.get(name).copied(),
            SymbolKey::Variable { .. } => self.variable_positions.get(&key.key()).copied(),
        }
    }

    /// Reference spans for `key`, in source order.
    #[must_use]
    pub fn references_of(&self, key: &SymbolKey) -> &[Span] {
        let refs = match key {
            SymbolKey::Pipeline(name) => self.pipeline_refs.get(name),
            SymbolKey::Variable { .. } => self.variable_refs.get(&key.key()),
        };
        refs.map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether `key` has a declaration.
    #[must_use]
    pub fn is_declared(&self, key: &SymbolKey) -> bool {
        match key {
            SymbolKey::Pipeline(name) => self.pipeline_names.contains(name),
            SymbolKey::Variable { var_type, name } => self
                .variables_by_type
                .get(var_type)
                .is_some_and(|names| names.contains(name)),
        }
    }

    /// Declared variable names of one type, sorted.
    pub fn variable_names<'a>(&'a self, var_type: &str) -> impl Iterator<Item = &'a str> {
        self.variables_by_type
            .get(var_type)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }
}

fn name_positions(ranges: &HashMap<String, DeclarationRange>) -> HashMap<String, Span> {
    ranges
        .iter()
        .map(|(key, range)| (key.clone(), range.name_span))
        .collect()
}

/// Merge parser declarations, scanned references and template symbols.
#[must_use]
pub fn build_symbol_table(
    parsed: &ParseResult,
    scanned: ScannedReferences,
    handlebars: HandlebarsSymbols,
) -> SymbolTable {
    let program = &parsed.program;

    let mut variables_by_type: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for var in &program.variables {
        variables_by_type
            .entry(var.value.var_type.clone())
            .or_default()
            .insert(var.value.name.clone());
    }

    let pipeline_names = program
        .pipelines
        .iter()
        .map(|p| p.value.name.clone())
        .collect();

    let variable_positions = name_positions(&parsed.variable_ranges);
    let pipeline_positions = name_positions(&parsed.pipeline_ranges);

    SymbolTable {
        variables_by_type,
        pipeline_names,
        variable_positions,
        pipeline_positions,
        variable_refs: scanned.variable_refs,
        pipeline_refs: scanned.pipeline_refs,
        handlebars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analyze, IndexOptions};

    #[test]
    fn test_symbol_key_round_trip() {
        let var = SymbolKey::variable("pg", "getUser");
        assert_eq!(var.key(), "pg::getUser");
        assert_eq!(SymbolKey::from_key("pg::getUser"), var);
        assert_eq!(SymbolKey::from_key("loadUser"), SymbolKey::Pipeline("loadUser".to_string()));
        assert_eq!(var.name(), "getUser");
        assert_eq!(var.to_string(), "pg getUser");
    }

    #[test]
    fn test_duplicates_collapse_and_last_position_wins() {
        let text = "pg q = `a`\npg q = `a`\n";
        let symbols = analyze(text, &IndexOptions::default()).symbols;
        assert_eq!(symbols.variables_by_type["pg"].len(), 1);
        let key = SymbolKey::variable("pg", "q");
        assert_eq!(symbols.declaration_of(&key), Some(Span::new(14, 15)));
        assert!(symbols.is_declared(&key));
    }

    #[test]
    fn test_declarations_and_references_line_up() {
        let text = "pipeline foo = |> jq: `{}`\nGET /x |> pipeline: foo\n";
        let symbols = analyze(text, &IndexOptions::default()).symbols;
        let key = SymbolKey::Pipeline("foo".to_string());
        assert_eq!(symbols.declaration_of(&key).map(|s| s.text(text)), Some("foo"));
        let refs = symbols.references_of(&key);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].start, text.rfind("foo").unwrap_or(0));
        assert!(symbols.references_of(&SymbolKey::Pipeline("bar".to_string())).is_empty());
    }

    #[test]
    fn test_variable_names_by_type() {
        let text = "pg b = `1`\npg a = `2`\nmysql c = `3`\n";
        let symbols = analyze(text, &IndexOptions::default()).symbols;
        assert_eq!(symbols.variable_names("pg").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(symbols.variable_names("redis").count(), 0);
    }
}
