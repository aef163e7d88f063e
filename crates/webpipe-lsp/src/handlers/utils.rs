//! Shared utility functions for LSP handlers.
//!
//! Position conversion between byte offsets and LSP positions, plus the
//! symbol lookups every navigation handler needs.

use lsp_types::{Position, Range};
use webpipe_core::Span;
use webpipe_index::{resolve_context, PartialResolution, SymbolContext, SymbolKey, SymbolTable};

/// A line index for offset and position conversion.
///
/// Columns are counted in UTF-16 code units, the protocol default.
/// Building the index is O(n); lookups binary search the line starts.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    /// Byte offset of the start of each line (including line 0 at offset 0).
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    /// Build a line index from source text.
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    /// Convert a byte offset to a (line, column) position (0-based).
    pub fn offset_to_position(&self, offset: usize) -> (u32, u32) {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }

        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        let col = self.source[line_start..offset].encode_utf16().count();

        (line as u32, col as u32)
    }

    /// Convert a (line, column) position to a byte offset.
    ///
    /// Returns None if the position is past the end of its line.
    pub fn position_to_offset(&self, line: u32, col: u32) -> Option<usize> {
        let line_start = *self.line_starts.get(line as usize)?;
        let line_end = self
            .line_starts
            .get(line as usize + 1)
            .map_or(self.source.len(), |next| next - 1);
        let text = &self.source[line_start..line_end];

        let mut units = 0usize;
        for (i, ch) in text.char_indices() {
            if units >= col as usize {
                return Some(line_start + i);
            }
            units += ch.len_utf16();
        }
        (units >= col as usize).then_some(line_end)
    }

    /// Convert a byte span to an LSP range.
    pub fn span_to_range(&self, span: Span) -> Range {
        let (start_line, start_col) = self.offset_to_position(span.start);
        let (end_line, end_col) = self.offset_to_position(span.end);
        Range {
            start: Position::new(start_line, start_col),
            end: Position::new(end_line, end_col),
        }
    }

    /// Convert an LSP position to a byte offset.
    pub fn offset_of(&self, position: Position) -> Option<usize> {
        self.position_to_offset(position.line, position.character)
    }

    /// Get the number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// The symbol under an LSP position.
pub fn context_at(source: &str, symbols: &SymbolTable, position: Position) -> Option<SymbolContext> {
    let offset = LineIndex::new(source).offset_of(position)?;
    resolve_context(source, offset, symbols)
}

/// One place a symbol appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    /// The identifier.
    pub span: Span,
    /// Whether this is the declaring occurrence.
    pub is_declaration: bool,
}

/// The declaration a context points at.
pub fn definition_span(symbols: &SymbolTable, context: &SymbolContext) -> Option<Span> {
    match context {
        SymbolContext::Symbol { key, .. } => symbols.declaration_of(key),
        SymbolContext::Partial { name, span, .. } => {
            match symbols.handlebars.resolve_partial(name, span.start) {
                PartialResolution::Inline { name_span, .. }
                | PartialResolution::Global { name_span } => Some(name_span),
                PartialResolution::Unresolved => None,
            }
        }
    }
}

/// Every occurrence of the symbol a context points at, in source order.
///
/// A template variable and the global partial of the same name are one
/// symbol. An inline partial only occurs inside its own content region.
pub fn occurrences(
    symbols: &SymbolTable,
    context: &SymbolContext,
    template_engine: &str,
) -> Vec<Occurrence> {
    let mut found = match context {
        SymbolContext::Symbol { key, .. } => key_occurrences(symbols, key, template_engine),
        SymbolContext::Partial { name, span, .. } => {
            let partials = &symbols.handlebars;
            match partials.resolve_partial(name, span.start) {
                PartialResolution::Inline {
                    name_span, region, ..
                } => std::iter::once(declaration(name_span))
                    .chain(partials.usages_in(name, region).map(reference))
                    .collect(),
                PartialResolution::Global { .. } => key_occurrences(
                    symbols,
                    &SymbolKey::variable(template_engine, name.as_str()),
                    template_engine,
                ),
                PartialResolution::Unresolved => partials
                    .usages_by_name
                    .get(name)
                    .into_iter()
                    .flatten()
                    .filter(|usage| {
                        partials.resolve_partial(name, usage.start) == PartialResolution::Unresolved
                    })
                    .copied()
                    .map(reference)
                    .collect(),
            }
        }
    };

    found.sort_by_key(|o| (o.span.start, !o.is_declaration));
    found.dedup_by_key(|o| o.span);
    found
}

fn key_occurrences(symbols: &SymbolTable, key: &SymbolKey, template_engine: &str) -> Vec<Occurrence> {
    let mut found: Vec<Occurrence> = symbols
        .declaration_of(key)
        .map(declaration)
        .into_iter()
        .chain(symbols.references_of(key).iter().copied().map(reference))
        .collect();

    if let SymbolKey::Variable { var_type, name } = key {
        if var_type == template_engine {
            found.extend(symbols.handlebars.global_usages(name).map(reference));
        }
    }
    found
}

const fn declaration(span: Span) -> Occurrence {
    Occurrence {
        span,
        is_declaration: true,
    }
}

const fn reference(span: Span) -> Occurrence {
    Occurrence {
        span,
        is_declaration: false,
    }
}

/// Whether `name` is a valid declaration name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
