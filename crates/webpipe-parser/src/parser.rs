//! Recursive-descent parser for webpipe files.
//!
//! A single byte cursor walks the source left to right. At each top-level
//! position the productions are tried in a fixed order (config, named
//! pipeline, variable, route, describe). Every attempt is a backtracking
//! sub-parse: the caller takes a [`Checkpoint`], runs the production, and
//! restores the checkpoint when the production returns a [`ParseFailure`].
//! A failure never escapes the attempt that produced it.
//!
//! # Organization
//!
//! 1. **Cursor** - checkpoints, whitespace, tokens
//! 2. **Top level** - the main loop and unrecognized-line recovery
//! 3. **Config blocks**
//! 4. **Pipelines** - named pipelines, steps, result branches
//! 5. **Variables and routes**
//!
//! BDD productions (`describe`, `it`, mocks, conditions) live in
//! [`crate::describe`].

use std::collections::HashMap;
use std::str::FromStr;

use webpipe_core::{
    variable_key, BranchType, Config, ConfigProperty, ConfigValue, Decimal, NamedPipeline,
    Pipeline, PipelineRef, Program, ResultBranch, Route, Span, Spanned, Step, StepConfig,
    Variable,
};

use crate::diagnostic::{DiagnosticKind, ParseDiagnostic};
use crate::{DeclarationRange, ParseResult};

/// HTTP methods accepted at the start of a route or a `when calling` clause.
pub const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Words that never name a variable type.
const RESERVED_TYPES: &[&str] = &["pipeline", "config", "describe", "it"];

/// Longest snippet quoted in an unrecognized-syntax diagnostic.
const SNIPPET_LEN: usize = 60;

/// Deepest `result` branch nesting the parser descends into.
pub const MAX_NESTING: usize = 64;

/// Local failure of one production attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParseFailure {
    /// Cursor position where the production gave up.
    pub pos: usize,
    /// What the production expected to find.
    pub expected: &'static str,
}

pub(crate) type PResult<T> = Result<T, ParseFailure>;

/// Saved parser state for backtracking.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    pos: usize,
    diagnostics: usize,
}

/// Parser state for one document.
pub(crate) struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    diagnostics: Vec<ParseDiagnostic>,
    pipeline_ranges: HashMap<String, DeclarationRange>,
    variable_ranges: HashMap<String, DeclarationRange>,
    /// Result branches currently being parsed.
    depth: usize,
}

const fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

const fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            diagnostics: Vec::new(),
            pipeline_ranges: HashMap::new(),
            variable_ranges: HashMap::new(),
            depth: 0,
        }
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    pub(crate) const fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub(crate) fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.bytes.len());
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            diagnostics: self.diagnostics.len(),
        }
    }

    /// Roll back the cursor and any diagnostics recorded since `cp`.
    pub(crate) fn restore(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.diagnostics.truncate(cp.diagnostics);
    }

    pub(crate) fn fail<T>(&self, expected: &'static str) -> PResult<T> {
        Err(ParseFailure {
            pos: self.pos,
            expected,
        })
    }

    /// Run a production, restoring the cursor if it fails.
    pub(crate) fn attempt<T>(&mut self, production: impl FnOnce(&mut Self) -> PResult<T>) -> Option<T> {
        let cp = self.checkpoint();
        match production(self) {
            Ok(value) => Some(value),
            Err(_) => {
                self.restore(cp);
                None
            }
        }
    }

    pub(crate) fn report(&mut self, kind: DiagnosticKind, span: Span) {
        self.diagnostics.push(ParseDiagnostic::new(kind, span));
    }

    /// Skip spaces and tabs, returning how many bytes were skipped.
    pub(crate) fn skip_inline_ws(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Skip all whitespace, newlines and `#` comments.
    pub(crate) fn skip_ws(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'#') => self.skip_to_line_end(),
                _ => break,
            }
        }
    }

    fn skip_to_line_end(&mut self) {
        self.pos = self.line_end(self.pos);
    }

    pub(crate) fn require_inline_ws(&mut self) -> PResult<()> {
        if self.skip_inline_ws() == 0 {
            return self.fail("whitespace");
        }
        Ok(())
    }

    /// Offset of the `\n` ending the line containing `pos`, or the end of input.
    fn line_end(&self, pos: usize) -> usize {
        self.bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.bytes.len(), |i| pos + i)
    }

    fn line_start(&self, pos: usize) -> usize {
        self.bytes[..pos]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1)
    }

    fn column(&self, pos: usize) -> usize {
        pos - self.line_start(pos)
    }

    /// Succeed if only whitespace or a comment remains on the current line.
    ///
    /// A closing `}` also ends a config line. Nothing is consumed.
    fn expect_line_end(&mut self) -> PResult<()> {
        let cp = self.checkpoint();
        self.skip_inline_ws();
        let ok = matches!(self.peek(), None | Some(b'\n' | b'\r' | b'#' | b'}'));
        self.restore(cp);
        if ok {
            Ok(())
        } else {
            self.fail("end of line")
        }
    }

    pub(crate) fn at_token_boundary(&self) -> bool {
        self.peek().map_or(true, |b| b.is_ascii_whitespace())
    }

    pub(crate) fn expect_char(&mut self, c: u8, expected: &'static str) -> PResult<usize> {
        if self.peek() == Some(c) {
            let start = self.pos;
            self.pos += 1;
            Ok(start)
        } else {
            self.fail(expected)
        }
    }

    /// Match `kw` as a whole word. The cursor only moves on success.
    pub(crate) fn keyword(&mut self, kw: &'static str) -> PResult<Span> {
        if !self.starts_with(kw) {
            return self.fail(kw);
        }
        let end = self.pos + kw.len();
        if self.bytes.get(end).is_some_and(|&b| is_ident_char(b)) {
            return self.fail(kw);
        }
        let span = Span::new(self.pos, end);
        self.pos = end;
        Ok(span)
    }

    pub(crate) fn identifier(&mut self) -> PResult<(String, Span)> {
        match self.peek() {
            Some(b) if is_ident_start(b) => {}
            _ => return self.fail("identifier"),
        }
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        let span = Span::new(start, self.pos);
        Ok((span.text(self.src).to_string(), span))
    }

    /// Consume bytes while `pred` holds. Stops only on ASCII bytes, so the
    /// resulting span always lies on character boundaries.
    pub(crate) fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> Span {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        Span::new(start, self.pos)
    }

    /// A run of non-whitespace bytes.
    pub(crate) fn bare_token(&mut self) -> PResult<(String, Span)> {
        let span = self.take_while(|b| !b.is_ascii_whitespace());
        if span.is_empty() {
            return self.fail("token");
        }
        Ok((span.text(self.src).to_string(), span))
    }

    /// Backtick string; the span covers the content between the backticks.
    pub(crate) fn backtick_string(&mut self) -> PResult<(String, Span)> {
        self.expect_char(b'`', "'`'")?;
        let content_start = self.pos;
        let Some(len) = self.bytes[content_start..].iter().position(|&b| b == b'`') else {
            return self.fail("closing '`'");
        };
        let span = Span::at(content_start, len);
        self.pos = span.end + 1;
        Ok((span.text(self.src).to_string(), span))
    }

    /// Double-quoted single-line string; the span covers the content.
    pub(crate) fn quoted_string(&mut self) -> PResult<(String, Span)> {
        self.expect_char(b'"', "'\"'")?;
        let content_start = self.pos;
        loop {
            match self.peek() {
                None | Some(b'\n') => return self.fail("closing '\"'"),
                Some(b'\\') => self.advance(2),
                Some(b'"') => break,
                Some(_) => self.pos += 1,
            }
        }
        let span = Span::new(content_start, self.pos);
        self.pos += 1;
        Ok((span.text(self.src).replace("\\\"", "\""), span))
    }

    /// Everything up to the end of the line, trimmed; must not be empty.
    pub(crate) fn rest_of_line(&mut self) -> PResult<(String, Span)> {
        let start = self.pos;
        let end = self.line_end(start);
        let text = self.src[start..end].trim_end();
        if text.is_empty() {
            return self.fail("value");
        }
        let span = Span::at(start, text.len());
        self.pos = span.end;
        Ok((text.to_string(), span))
    }

    // ========================================================================
    // Top level
    // ========================================================================

    /// Parse the whole document.
    pub(crate) fn parse_program(mut self) -> ParseResult {
        let mut program = Program::new();

        loop {
            self.skip_ws();
            if self.is_eof() {
                break;
            }
            let start = self.pos;

            if let Some(config) = self.attempt(Self::config) {
                program.configs.push(config);
            } else if let Some(pipeline) = self.attempt(Self::named_pipeline) {
                program.pipelines.push(pipeline);
            } else if let Some(variable) = self.attempt(Self::variable) {
                program.variables.push(variable);
            } else if let Some(route) = self.attempt(Self::route) {
                program.routes.push(route);
            } else if let Some(describe) = self.attempt(Self::describe) {
                program.describes.push(describe);
            } else {
                self.skip_unrecognized_line(start);
            }

            if self.pos <= start {
                // Every production consumes its leading keyword; this only
                // guards against a future production that does not.
                self.skip_unrecognized_line(start);
            }
        }

        self.check_backticks();

        ParseResult {
            program,
            diagnostics: self.diagnostics,
            pipeline_ranges: self.pipeline_ranges,
            variable_ranges: self.variable_ranges,
        }
    }

    /// Report the current line and move the cursor past it.
    fn skip_unrecognized_line(&mut self, start: usize) {
        let end = self.line_end(start);
        let text = self.src[start..end].trim_end();
        let snippet: String = text.chars().take(SNIPPET_LEN).collect();
        self.report(
            DiagnosticKind::UnrecognizedSyntax(snippet),
            Span::at(start, text.len()),
        );
        // `start` sits on a non-whitespace byte, so the line is never empty.
        self.pos = end.max(start + 1).min(self.bytes.len());
    }

    /// Whole-file parity check: an odd number of backticks means one is unclosed.
    fn check_backticks(&mut self) {
        let mut count = 0usize;
        let mut last = None;
        for (i, &b) in self.bytes.iter().enumerate() {
            if b == b'`' {
                count += 1;
                last = Some(i);
            }
        }
        if count % 2 == 1 {
            if let Some(i) = last {
                self.report(DiagnosticKind::UnclosedBacktick, Span::at(i, 1));
            }
        }
    }

    // ========================================================================
    // Config blocks
    // ========================================================================

    fn config(&mut self) -> PResult<Spanned<Config>> {
        let start = self.pos;
        self.keyword("config")?;
        self.require_inline_ws()?;
        let (name, name_span) = self.identifier()?;
        self.skip_inline_ws();
        self.expect_char(b'{', "'{'")?;

        let header = Span::new(start, name_span.end);
        let mut properties = Vec::new();
        loop {
            let before = self.checkpoint();
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                break;
            }
            if self.is_eof() {
                self.restore(before);
                self.report(DiagnosticKind::UnclosedBlock(name.clone()), header);
                break;
            }
            if let Some(property) = self.attempt(Self::config_property) {
                properties.push(property);
                continue;
            }
            if let Some(key) = self.peek_property_key() {
                let line_start = self.pos;
                let end = self.line_end(line_start);
                let len = self.src[line_start..end].trim_end().len();
                self.report(
                    DiagnosticKind::InvalidConfigProperty(key),
                    Span::at(line_start, len),
                );
                self.pos = end;
                continue;
            }
            self.restore(before);
            self.report(DiagnosticKind::UnclosedBlock(name.clone()), header);
            break;
        }

        Ok(Spanned::new(
            Config { name, properties },
            Span::new(start, self.pos),
        ))
    }

    /// Key of a `key:` line at the cursor, without consuming anything.
    fn peek_property_key(&mut self) -> Option<String> {
        let cp = self.checkpoint();
        let key = self.identifier().ok().and_then(|(key, _)| {
            self.skip_inline_ws();
            (self.peek() == Some(b':')).then_some(key)
        });
        self.restore(cp);
        key
    }

    fn config_property(&mut self) -> PResult<ConfigProperty> {
        let (key, _) = self.identifier()?;
        self.skip_inline_ws();
        self.expect_char(b':', "':'")?;
        self.skip_inline_ws();
        let value = self.config_value()?;
        self.expect_line_end()?;
        Ok(ConfigProperty { key, value })
    }

    fn config_value(&mut self) -> PResult<ConfigValue> {
        match self.peek() {
            Some(b'$') => {
                self.pos += 1;
                let (var, _) = self.identifier()?;
                let default = self.attempt(|p| {
                    p.skip_inline_ws();
                    if !p.starts_with("||") {
                        return p.fail("'||'");
                    }
                    p.advance(2);
                    p.skip_inline_ws();
                    if p.peek() == Some(b'"') {
                        p.quoted_string().map(|(s, _)| s)
                    } else {
                        p.config_word().map(|(s, _)| s)
                    }
                });
                Ok(ConfigValue::EnvVar { var, default })
            }
            Some(b'"') => Ok(ConfigValue::String(self.quoted_string()?.0)),
            _ => {
                let (word, _) = self.config_word()?;
                Ok(match word.as_str() {
                    "true" => ConfigValue::Boolean(true),
                    "false" => ConfigValue::Boolean(false),
                    _ => match parse_number(&word) {
                        Some(n) => ConfigValue::Number(n),
                        None => ConfigValue::String(word),
                    },
                })
            }
        }
    }

    /// A bare config word: stops at whitespace, comments and `}`.
    fn config_word(&mut self) -> PResult<(String, Span)> {
        let span = self.take_while(|b| !b.is_ascii_whitespace() && b != b'#' && b != b'}');
        if span.is_empty() {
            return self.fail("config value");
        }
        Ok((span.text(self.src).to_string(), span))
    }

    // ========================================================================
    // Pipelines
    // ========================================================================

    fn named_pipeline(&mut self) -> PResult<Spanned<NamedPipeline>> {
        let start = self.pos;
        self.keyword("pipeline")?;
        self.require_inline_ws()?;
        let (name, name_span) = self.identifier()?;
        self.skip_inline_ws();
        self.expect_char(b'=', "'='")?;
        let pipeline = self.pipeline(None);

        let span = Span::new(start, self.pos);
        self.pipeline_ranges
            .insert(name.clone(), DeclarationRange { span, name_span });

        Ok(Spanned::new(
            NamedPipeline {
                name,
                name_span,
                pipeline,
            },
            span,
        ))
    }

    /// Zero or more steps. Stops at the first position that is not a `|>`
    /// step, leaving the cursor after the last step (trailing whitespace is
    /// not consumed).
    ///
    /// Inside a result branch, `min_column` is the branch label's column and
    /// only steps indented past it belong to the branch.
    fn pipeline(&mut self, min_column: Option<usize>) -> Pipeline {
        let mut steps = Vec::new();
        loop {
            let cp = self.checkpoint();
            self.skip_ws();
            let nested_ok = min_column.map_or(true, |min| self.column(self.pos) > min);
            if !self.starts_with("|>") || !nested_ok {
                self.restore(cp);
                break;
            }
            match self.attempt(|p| p.step(min_column)) {
                Some(step) => steps.push(step),
                None => {
                    self.restore(cp);
                    break;
                }
            }
        }
        Pipeline { steps }
    }

    /// One `|>` step. `min_column` bounds the branches of a `result` step
    /// the same way it bounds steps in [`Self::pipeline`].
    fn step(&mut self, min_column: Option<usize>) -> PResult<Spanned<Step>> {
        let start = self.pos;
        if !self.starts_with("|>") {
            return self.fail("'|>'");
        }
        self.advance(2);
        self.skip_inline_ws();

        if self.at_result_keyword() {
            self.keyword("result")?;
            let mut branches = Vec::new();
            if self.depth >= MAX_NESTING {
                // The rest of the line is dropped rather than parsed as siblings.
                let end = self.line_end(self.pos);
                self.report(DiagnosticKind::NestingTooDeep(MAX_NESTING), Span::new(start, end));
                self.pos = end;
                return Ok(Spanned::new(
                    Step::Result { branches },
                    Span::new(start, self.pos),
                ));
            }
            loop {
                let cp = self.checkpoint();
                self.skip_ws();
                // A label at or left of the enclosing branch belongs to an outer result.
                if min_column.is_some_and(|min| self.column(self.pos) <= min) {
                    self.restore(cp);
                    break;
                }
                match self.attempt(Self::result_branch) {
                    Some(branch) => branches.push(branch),
                    None => {
                        self.restore(cp);
                        break;
                    }
                }
            }
            return Ok(Spanned::new(
                Step::Result { branches },
                Span::new(start, self.pos),
            ));
        }

        let (name, _) = self.identifier()?;
        self.skip_inline_ws();
        self.expect_char(b':', "':'")?;
        self.skip_inline_ws();
        let (config, config_span) = self.step_config()?;

        Ok(Spanned::new(
            Step::Regular {
                name,
                config,
                config_span,
            },
            Span::new(start, self.pos),
        ))
    }

    /// `result` not followed by `:` (which would make it an ordinary step type).
    fn at_result_keyword(&mut self) -> bool {
        let cp = self.checkpoint();
        let found = self.keyword("result").is_ok() && {
            self.skip_inline_ws();
            self.peek() != Some(b':')
        };
        self.restore(cp);
        found
    }

    fn result_branch(&mut self) -> PResult<ResultBranch> {
        let label_column = self.column(self.pos);
        let (label, _) = self.identifier()?;
        self.skip_inline_ws();
        self.expect_char(b'(', "'('")?;
        self.skip_inline_ws();
        let status_span = self.take_while(|b| b.is_ascii_digit());
        if status_span.is_empty() {
            return self.fail("status code");
        }
        let status_code = status_span.text(self.src).parse::<u32>().unwrap_or(u32::MAX);
        self.skip_inline_ws();
        self.expect_char(b')', "')'")?;
        self.skip_inline_ws();
        self.expect_char(b':', "':'")?;

        if !(100..=599).contains(&status_code) {
            self.report(DiagnosticKind::InvalidStatusCode(status_code), status_span);
        }

        self.depth += 1;
        let pipeline = self.pipeline(Some(label_column));
        self.depth -= 1;
        Ok(ResultBranch {
            branch_type: BranchType::from_label(&label),
            status_code,
            status_span,
            pipeline,
        })
    }

    fn step_config(&mut self) -> PResult<(StepConfig, Span)> {
        match self.peek() {
            Some(b'`') => {
                let (text, span) = self.backtick_string()?;
                Ok((StepConfig::Backtick(text), span))
            }
            Some(b'"') => {
                let (text, span) = self.quoted_string()?;
                Ok((StepConfig::Quoted(text), span))
            }
            _ => {
                let (name, span) = self.identifier()?;
                if !self.at_token_boundary() {
                    return self.fail("bare identifier");
                }
                Ok((StepConfig::Identifier(name), span))
            }
        }
    }

    // ========================================================================
    // Variables and routes
    // ========================================================================

    fn variable(&mut self) -> PResult<Spanned<Variable>> {
        let start = self.pos;
        let (var_type, _) = self.identifier()?;
        if RESERVED_TYPES.contains(&var_type.as_str()) {
            return self.fail("variable type");
        }
        self.require_inline_ws()?;
        let (name, name_span) = self.identifier()?;
        self.skip_inline_ws();
        self.expect_char(b'=', "'='")?;
        self.skip_ws();
        let (value, value_span) = self.backtick_string()?;

        let span = Span::new(start, self.pos);
        self.variable_ranges.insert(
            variable_key(&var_type, &name),
            DeclarationRange { span, name_span },
        );

        Ok(Spanned::new(
            Variable {
                var_type,
                name,
                name_span,
                value,
                value_span,
            },
            span,
        ))
    }

    fn route(&mut self) -> PResult<Spanned<Route>> {
        let start = self.pos;
        let (method, _) = self.identifier()?;
        if !HTTP_METHODS.contains(&method.as_str()) {
            return self.fail("HTTP method");
        }
        self.require_inline_ws()?;
        if self.peek() != Some(b'/') {
            return self.fail("route path");
        }
        let (path, _) = self.bare_token()?;
        let pipeline = self.pipeline(None);

        let pipeline = match named_reference(&pipeline) {
            Some(name) => PipelineRef::Named(name),
            None => PipelineRef::Inline(pipeline),
        };

        Ok(Spanned::new(
            Route {
                method,
                path,
                pipeline,
            },
            Span::new(start, self.pos),
        ))
    }
}

/// The pipeline name when `pipeline` is exactly one `|> pipeline: <name>` step.
fn named_reference(pipeline: &Pipeline) -> Option<String> {
    match pipeline.steps.as_slice() {
        [only] => match &only.value {
            Step::Regular {
                name,
                config: StepConfig::Identifier(target),
                ..
            } if name == "pipeline" => Some(target.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn parse_number(word: &str) -> Option<Decimal> {
    let numeric = word
        .bytes()
        .enumerate()
        .all(|(i, b)| b.is_ascii_digit() || b == b'.' || (i == 0 && b == b'-'));
    if !numeric || !word.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    Decimal::from_str(word).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParseResult {
        Parser::new(src).parse_program()
    }

    #[test]
    fn test_attempt_restores_cursor_and_diagnostics() {
        let mut parser = Parser::new("hello world");
        let result: Option<()> = parser.attempt(|p| {
            p.identifier()?;
            p.report(DiagnosticKind::UnclosedBacktick, Span::new(0, 1));
            p.fail("never")
        });
        assert!(result.is_none());
        assert_eq!(parser.pos(), 0);
        assert!(parser.diagnostics.is_empty());
    }

    #[test]
    fn test_keyword_requires_word_boundary() {
        let mut parser = Parser::new("pipelines");
        assert!(parser.keyword("pipeline").is_err());
        assert_eq!(parser.pos(), 0);

        let mut parser = Parser::new("pipeline x");
        assert_eq!(parser.keyword("pipeline"), Ok(Span::new(0, 8)));
    }

    #[test]
    fn test_backtick_string_span_is_content() {
        let mut parser = Parser::new("`abc` rest");
        let (text, span) = parser.backtick_string().unwrap();
        assert_eq!(text, "abc");
        assert_eq!(span, Span::new(1, 4));
        assert_eq!(parser.pos(), 5);
    }

    #[test]
    fn test_unclosed_backtick_fails_without_moving() {
        let mut parser = Parser::new("`never closed");
        assert!(parser.attempt(Parser::backtick_string).is_none());
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn test_pipeline_range_excludes_trailing_whitespace() {
        let src = "pipeline a =\n  |> jq: `.`\n\n\n";
        let result = parse(src);
        let range = result.pipeline_ranges["a"];
        assert_eq!(range.span.text(src), "pipeline a =\n  |> jq: `.`");
        assert_eq!(range.name_span.text(src), "a");
    }

    #[test]
    fn test_route_single_pipeline_step_is_named() {
        let result = parse("GET /users\n  |> pipeline: listUsers\n");
        let route = &result.program.routes[0].value;
        assert_eq!(route.pipeline, PipelineRef::Named("listUsers".to_string()));
    }

    #[test]
    fn test_result_branch_nesting_follows_indentation() {
        let src = "\
pipeline p =
  |> result
    ok(200):
      |> jq: `a`
    notFound(404):
      |> jq: `b`
  |> log: `after`
";
        let result = parse(src);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let steps = &result.program.pipelines[0].value.pipeline.steps;
        assert_eq!(steps.len(), 2);
        let Step::Result { branches } = &steps[0].value else {
            panic!("expected result step");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[1].branch_type, BranchType::Custom("notFound".to_string()));
        assert_eq!(branches[1].pipeline.steps.len(), 1);
    }

    #[test]
    fn test_nested_result_leaves_outer_sibling_branch() {
        let src = "\
pipeline p =
  |> result
    ok(200):
      |> result
        ok(201):
          |> jq: `a`
    notFound(404):
      |> jq: `b`
";
        let result = parse(src);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let steps = &result.program.pipelines[0].value.pipeline.steps;
        let Step::Result { branches: outer } = &steps[0].value else {
            panic!("expected result step");
        };
        assert_eq!(outer.len(), 2);
        assert_eq!(outer[1].status_code, 404);
        assert_eq!(outer[1].pipeline.steps.len(), 1);

        let Step::Result { branches: inner } = &outer[0].pipeline.steps[0].value else {
            panic!("expected nested result step");
        };
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].status_code, 201);
    }

    #[test]
    fn test_single_line_nesting_stops_at_limit() {
        let src = format!("pipeline p = {}|> jq: `.`\n", "|> result ok(200): ".repeat(5000));
        let result = parse(&src);

        assert_eq!(result.program.pipelines.len(), 1);
        assert_eq!(result.program.pipelines[0].value.pipeline.depth(), MAX_NESTING);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::NestingTooDeep(MAX_NESTING)));
        assert!(result.diagnostics.iter().all(|d| d.span.end <= src.len()));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("5432"), Some(Decimal::from(5432)));
        assert_eq!(parse_number("-1.5"), Decimal::from_str("-1.5").ok());
        assert_eq!(parse_number("localhost"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("1-2"), None);
    }
}
