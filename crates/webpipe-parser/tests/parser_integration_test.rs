//! Integration tests for the parser crate.
//!
//! Tests cover every top-level construct, error recovery, span precision and
//! the termination guarantee on arbitrary input.

use proptest::prelude::*;
use webpipe_core::{BranchType, PipelineRef, Severity, Step};
use webpipe_parser::{
    get_pipeline_ranges, get_variable_ranges, parse, parse_program,
    parse_program_with_diagnostics, DiagnosticKind, ParseResult, MAX_NESTING,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_ok(source: &str) -> ParseResult {
    let result = parse(source);
    assert!(
        result.diagnostics.is_empty(),
        "expected no diagnostics, got: {:?}",
        result.diagnostics
    );
    result
}

fn assert_spans_in_bounds(source: &str, result: &ParseResult) {
    for diag in &result.diagnostics {
        assert!(diag.span.start <= diag.span.end, "{diag:?}");
        assert!(diag.span.end <= source.len(), "{diag:?}");
    }
    for range in result
        .pipeline_ranges
        .values()
        .chain(result.variable_ranges.values())
    {
        assert!(range.span.end <= source.len());
        assert!(range.span.encloses(&range.name_span));
    }
}

const FULL_DOCUMENT: &str = r#"
# Database connection
config pg {
  host: $DB_HOST || "localhost"
  port: 5432
}

pg getUser = `SELECT * FROM users WHERE id = $1`

handlebars card = `<div>{{name}}</div>`

pipeline loadUser =
  |> jq: `{ sqlParams: [.params.id] }`
  |> pg: getUser
  |> result
    ok(200):
      |> jq: `.data.rows[0]`
    notFound(404):
      |> jq: `{ error: "not found" }`

GET /users/:id
  |> pipeline: loadUser

POST /users
  |> validate: `{ name: string }`
  |> jq: `{ ok: true }`

describe "users"
  with mock pg.getUser returning `{"rows": []}`

  it "returns a user"
    when calling GET /users/1
    then status is 200
"#;

// ============================================================================
// Whole documents
// ============================================================================

#[test]
fn test_parse_full_document() {
    let result = parse_ok(FULL_DOCUMENT);
    let program = &result.program;

    assert_eq!(program.configs.len(), 1);
    assert_eq!(program.variables.len(), 2);
    assert_eq!(program.pipelines.len(), 1);
    assert_eq!(program.routes.len(), 2);
    assert_eq!(program.describes.len(), 1);
    assert_eq!(program.len(), 7);

    let load_user = &program.pipelines[0].value;
    assert_eq!(load_user.pipeline.steps.len(), 3);

    assert_eq!(
        program.routes[0].value.pipeline,
        PipelineRef::Named("loadUser".to_string())
    );
    match &program.routes[1].value.pipeline {
        PipelineRef::Inline(pipeline) => assert_eq!(pipeline.steps.len(), 2),
        PipelineRef::Named(name) => panic!("unexpected named route {name}"),
    }
}

#[test]
fn test_parse_empty_and_whitespace() {
    for source in ["", "   ", "\n\n", "# only a comment\n"] {
        let result = parse_ok(source);
        assert!(result.program.is_empty());
    }
}

#[test]
fn test_parse_program_wrappers_agree() {
    let (program, diagnostics) = parse_program_with_diagnostics(FULL_DOCUMENT);
    assert_eq!(program, parse_program(FULL_DOCUMENT));
    assert!(diagnostics.is_empty());
    assert_eq!(get_pipeline_ranges(FULL_DOCUMENT), parse(FULL_DOCUMENT).pipeline_ranges);
}

#[test]
fn test_single_line_declarations() {
    let source = "pipeline foo = |> jq: `{}`\nGET /x |> pipeline: foo\n";
    let result = parse_ok(source);
    assert_eq!(result.program.pipelines[0].value.pipeline.steps.len(), 1);
    assert_eq!(
        result.program.routes[0].value.pipeline,
        PipelineRef::Named("foo".to_string())
    );
}

// ============================================================================
// Span identity
// ============================================================================

#[test]
fn test_declaration_name_spans_match_names() {
    let result = parse(FULL_DOCUMENT);
    for (name, range) in get_pipeline_ranges(FULL_DOCUMENT) {
        assert_eq!(range.name_span.text(FULL_DOCUMENT), name);
    }
    for (key, range) in get_variable_ranges(FULL_DOCUMENT) {
        let name = key.rsplit("::").next().unwrap_or_default();
        assert_eq!(range.name_span.text(FULL_DOCUMENT), name);
    }
    assert_eq!(result.variable_ranges.len(), 2);
    assert!(result.variable_ranges.contains_key("handlebars::card"));
}

#[test]
fn test_declaration_range_covers_last_step() {
    let ranges = get_pipeline_ranges(FULL_DOCUMENT);
    let text = ranges["loadUser"].span.text(FULL_DOCUMENT);
    assert!(text.starts_with("pipeline loadUser ="));
    assert!(text.ends_with("`{ error: \"not found\" }`"));
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_status_code_out_of_range() {
    let source = "pipeline p =\n  |> result\n    ok(200):\n      |> jq: `.`\n    weird(999):\n      |> jq: `.`\n";
    let result = parse(source);

    let errors: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].span.text(source), "999");
    assert_eq!(errors[0].kind, DiagnosticKind::InvalidStatusCode(999));

    // The branch is still recorded.
    let Step::Result { branches } = &result.program.pipelines[0].value.pipeline.steps[0].value
    else {
        panic!("expected a result step");
    };
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[1].branch_type, BranchType::Custom("weird".to_string()));
    assert_eq!(branches[1].status_code, 999);
}

#[test]
fn test_recovery_keeps_siblings() {
    let source = "pg a = `x`\n%%% nonsense\nGET\npipeline b =\n  |> jq: `.`\n";
    let result = parse(source);
    assert_eq!(result.program.variables.len(), 1);
    assert_eq!(result.program.pipelines.len(), 1);
    assert_eq!(result.diagnostics.len(), 2);
    assert!(result
        .diagnostics
        .iter()
        .all(|d| matches!(d.kind, DiagnosticKind::UnrecognizedSyntax(_))));
    assert_eq!(result.diagnostics[1].span.text(source), "GET");
}

#[test]
fn test_duplicate_variable_declarations_are_both_parsed() {
    let source = "pg q = `a`\npg q = `a`\n";
    let result = parse_ok(source);
    assert_eq!(result.program.variables.len(), 2);
    assert_eq!(result.variable_ranges.len(), 1);
    assert_eq!(
        result.variable_ranges["pg::q"].name_span,
        result.program.variables[1].value.name_span
    );
}

#[test]
fn test_deeply_nested_result_branches() {
    let mut source = String::from("pipeline deep =\n");
    for depth in 0..40 {
        let indent = "  ".repeat(depth * 2 + 1);
        source.push_str(&format!("{indent}|> result\n{indent}  ok(200):\n"));
    }
    source.push_str(&format!("{}|> jq: `.`\n", "  ".repeat(82)));

    let result = parse(&source);
    assert_spans_in_bounds(&source, &result);
    assert_eq!(result.program.pipelines[0].value.pipeline.depth(), 40);
}

#[test]
fn test_runaway_nesting_on_one_line_terminates() {
    let source = format!(
        "pipeline deep = {}|> jq: `.`\nGET /after |> pipeline: deep\n",
        "|> result ok(200): ".repeat(200_000)
    );

    let result = parse(&source);
    assert_spans_in_bounds(&source, &result);
    assert_eq!(result.program.pipelines[0].value.pipeline.depth(), MAX_NESTING);
    assert_eq!(result.program.routes.len(), 1);

    let too_deep: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| matches!(d.kind, DiagnosticKind::NestingTooDeep(_)))
        .collect();
    assert_eq!(too_deep.len(), 1);
    assert_eq!(too_deep[0].severity, Severity::Error);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_idempotence() {
    let first = parse_program_with_diagnostics(FULL_DOCUMENT);
    let second = parse_program_with_diagnostics(FULL_DOCUMENT);
    assert_eq!(first, second);
}

proptest! {
    #[test]
    fn prop_parse_terminates_with_spans_in_bounds(source in "\\PC{0,200}") {
        let result = parse(&source);
        assert_spans_in_bounds(&source, &result);
    }

    #[test]
    fn prop_parse_terminates_on_dsl_fragments(
        parts in prop::collection::vec(
            prop::sample::select(vec![
                "pipeline ", "p", " = ", "|> ", "jq: ", "`", "{}", "result",
                "ok(", "200", "999", "):", "\n", "  ", "GET ", "/x", "config ",
                "{", "}", "describe ", "\"d\"", "it ", "when ", "mock ", "#",
            ]),
            0..60,
        )
    ) {
        let source: String = parts.concat();
        let first = parse(&source);
        assert_spans_in_bounds(&source, &first);
        prop_assert_eq!(first, parse(&source));
    }
}
