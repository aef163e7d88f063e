//! `describe` / `it` test blocks.

use webpipe_core::{Condition, ConditionType, Describe, It, Mock, Span, Spanned, When};

use crate::diagnostic::DiagnosticKind;
use crate::parser::{PResult, Parser, HTTP_METHODS};

impl Parser<'_> {
    pub(crate) fn describe(&mut self) -> PResult<Spanned<Describe>> {
        let start = self.pos();
        self.keyword("describe")?;
        self.require_inline_ws()?;
        let (name, _) = self.quoted_string()?;

        let mut mocks = Vec::new();
        let mut tests = Vec::new();
        loop {
            let cp = self.checkpoint();
            self.skip_ws();
            if let Some(mock) = self.attempt(Self::mock) {
                mocks.push(mock);
            } else if let Some(test) = self.attempt(Self::it) {
                tests.extend(test);
            } else {
                self.restore(cp);
                break;
            }
        }

        Ok(Spanned::new(
            Describe { name, mocks, tests },
            Span::new(start, self.pos()),
        ))
    }

    /// `it "name"` followed by its clauses. Yields `None` (after reporting)
    /// when the block has no `when` clause.
    fn it(&mut self) -> PResult<Option<It>> {
        let start = self.pos();
        self.keyword("it")?;
        self.require_inline_ws()?;
        let (name, _) = self.quoted_string()?;
        let header = Span::new(start, self.pos());

        let mut mocks = Vec::new();
        let mut when = None;
        let mut input = None;
        let mut conditions = Vec::new();
        loop {
            let cp = self.checkpoint();
            self.skip_ws();
            if let Some(mock) = self.attempt(Self::mock) {
                mocks.push(mock);
            } else if let Some(clause) = self.attempt(Self::when_clause) {
                when = Some(clause);
            } else if let Some(value) = self.attempt(Self::input_clause) {
                input = Some(value);
            } else if let Some(condition) = self.attempt(Self::condition) {
                conditions.push(condition);
            } else {
                self.restore(cp);
                break;
            }
        }

        let Some(when) = when else {
            self.report(DiagnosticKind::MissingWhen(name), header);
            return Ok(None);
        };

        Ok(Some(It {
            name,
            mocks,
            when,
            input,
            conditions,
        }))
    }

    /// `with mock <target> returning <value>` (or `and mock ...`).
    fn mock(&mut self) -> PResult<Mock> {
        self.keyword("with").or_else(|_| self.keyword("and"))?;
        self.require_inline_ws()?;
        self.keyword("mock")?;
        self.require_inline_ws()?;
        let target = self.mock_target()?;
        self.require_inline_ws()?;
        self.keyword("returning")?;
        self.skip_inline_ws();
        let return_value = self.clause_value()?;
        Ok(Mock {
            target,
            return_value,
        })
    }

    /// `pipeline <name>` or `<type>.<name>`.
    fn mock_target(&mut self) -> PResult<String> {
        let named = self.attempt(|p| {
            p.keyword("pipeline")?;
            p.require_inline_ws()?;
            p.identifier()
        });
        if let Some((name, _)) = named {
            return Ok(format!("pipeline {name}"));
        }

        let (head, _) = self.identifier()?;
        if self.peek() == Some(b'.') {
            self.advance(1);
            let (tail, _) = self.identifier()?;
            return Ok(format!("{head}.{tail}"));
        }
        Ok(head)
    }

    fn when_clause(&mut self) -> PResult<When> {
        self.keyword("when")?;
        self.require_inline_ws()?;

        if self.keyword("calling").is_ok() {
            self.require_inline_ws()?;
            let (method, _) = self.identifier()?;
            if !HTTP_METHODS.contains(&method.as_str()) {
                return self.fail("HTTP method");
            }
            self.require_inline_ws()?;
            let (path, _) = self.bare_token()?;
            return Ok(When::CallingRoute { method, path });
        }

        self.keyword("executing")?;
        self.require_inline_ws()?;
        if self.keyword("pipeline").is_ok() {
            self.require_inline_ws()?;
            let (name, _) = self.identifier()?;
            return Ok(When::ExecutingPipeline(name));
        }

        self.keyword("variable")?;
        self.require_inline_ws()?;
        let (var_type, _) = self.identifier()?;
        self.require_inline_ws()?;
        let (name, _) = self.identifier()?;
        Ok(When::ExecutingVariable { var_type, name })
    }

    fn input_clause(&mut self) -> PResult<String> {
        self.keyword("with")?;
        self.require_inline_ws()?;
        self.keyword("input")?;
        self.skip_inline_ws();
        self.clause_value()
    }

    /// `then|and <field> [`jq`] <comparison> <value>`.
    fn condition(&mut self) -> PResult<Condition> {
        let condition_type = if self.keyword("then").is_ok() {
            ConditionType::Then
        } else {
            self.keyword("and")?;
            ConditionType::And
        };
        self.require_inline_ws()?;
        let (field, _) = self.identifier()?;
        self.require_inline_ws()?;

        let jq_expr = if self.peek() == Some(b'`') {
            let (expr, _) = self.backtick_string()?;
            self.require_inline_ws()?;
            Some(expr)
        } else {
            None
        };

        let (mut comparison, _) = self.identifier()?;
        let negated = self.attempt(|p| {
            p.require_inline_ws()?;
            p.keyword("not")
        });
        if negated.is_some() {
            comparison.push_str(" not");
        }
        self.skip_inline_ws();
        let value = self.clause_value()?;

        Ok(Condition {
            condition_type,
            field,
            jq_expr,
            comparison,
            value,
        })
    }

    /// A backtick string, a quoted string or the rest of the line.
    fn clause_value(&mut self) -> PResult<String> {
        match self.peek() {
            Some(b'`') => self.backtick_string().map(|(s, _)| s),
            Some(b'"') => self.quoted_string().map(|(s, _)| s),
            _ => self.rest_of_line().map(|(s, _)| s),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostic::DiagnosticKind;
    use crate::parse;
    use webpipe_core::{ConditionType, When};

    #[test]
    fn test_describe_with_mocks_and_conditions() {
        let src = r#"
describe "users"
  with mock pg.listUsers returning `[]`

  it "lists users"
    when calling GET /users
    with input `{"page": 1}`
    and mock pipeline auth returning `{"ok": true}`
    then status is 200
    and output `.users | length` equals 0
"#;
        let result = parse(src);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        let describe = &result.program.describes[0].value;
        assert_eq!(describe.name, "users");
        assert_eq!(describe.mocks[0].target, "pg.listUsers");

        let test = &describe.tests[0];
        assert_eq!(test.name, "lists users");
        assert_eq!(
            test.when,
            When::CallingRoute {
                method: "GET".to_string(),
                path: "/users".to_string()
            }
        );
        assert_eq!(test.input.as_deref(), Some(r#"{"page": 1}"#));
        assert_eq!(test.mocks[0].target, "pipeline auth");
        assert_eq!(test.conditions.len(), 2);
        assert_eq!(test.conditions[0].condition_type, ConditionType::Then);
        assert_eq!(test.conditions[0].value, "200");
        assert_eq!(test.conditions[1].jq_expr.as_deref(), Some(".users | length"));
        assert_eq!(test.conditions[1].comparison, "equals");
    }

    #[test]
    fn test_it_without_when_is_dropped_with_warning() {
        let src = "describe \"d\"\n  it \"orphan\"\n    then status is 200\n";
        let result = parse(src);
        assert!(result.program.describes[0].value.tests.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(
            result.diagnostics[0].kind,
            DiagnosticKind::MissingWhen("orphan".to_string())
        );
    }

    #[test]
    fn test_when_executing_variable() {
        let src = "describe \"d\"\n  it \"runs\"\n    when executing variable pg findUser\n    then output equals `1`\n";
        let result = parse(src);
        let test = &result.program.describes[0].value.tests[0];
        assert_eq!(
            test.when,
            When::ExecutingVariable {
                var_type: "pg".to_string(),
                name: "findUser".to_string()
            }
        );
    }

    #[test]
    fn test_negated_comparison() {
        let src = "describe \"d\"\n  it \"x\"\n    when executing pipeline p\n    then status is not 500\n";
        let result = parse(src);
        let condition = &result.program.describes[0].value.tests[0].conditions[0];
        assert_eq!(condition.comparison, "is not");
        assert_eq!(condition.value, "500");
    }
}
