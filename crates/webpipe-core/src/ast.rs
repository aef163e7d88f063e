//! Program types representing every top-level webpipe construct.
//!
//! A webpipe file holds five kinds of declarations, each kept in its own
//! list in source order:
//!
//! - [`Config`] - A named block of middleware configuration
//! - [`NamedPipeline`] - `pipeline name = |> ...`
//! - [`Variable`] - A typed value such as `pg getUser = \`SELECT ...\``
//! - [`Route`] - An HTTP route bound to an inline or named pipeline
//! - [`Describe`] - A BDD test suite

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Span, Spanned};

/// Separator used in the composite identity of a typed variable.
pub const KEY_SEPARATOR: &str = "::";

/// Build the symbol key `"var_type::name"` of a typed variable.
#[must_use]
pub fn variable_key(var_type: &str, name: &str) -> String {
    format!("{var_type}{KEY_SEPARATOR}{name}")
}

/// Split a `"var_type::name"` key back into its parts.
#[must_use]
pub fn split_variable_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}

/// A parsed webpipe file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// `config` blocks.
    pub configs: Vec<Spanned<Config>>,
    /// Named pipelines.
    pub pipelines: Vec<Spanned<NamedPipeline>>,
    /// Typed variables.
    pub variables: Vec<Spanned<Variable>>,
    /// HTTP routes.
    pub routes: Vec<Spanned<Route>>,
    /// BDD test suites.
    pub describes: Vec<Spanned<Describe>>,
}

impl Program {
    /// Create an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of top-level declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
            + self.pipelines.len()
            + self.variables.len()
            + self.routes.len()
            + self.describes.len()
    }

    /// Whether the program declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a named pipeline (last declaration wins).
    #[must_use]
    pub fn pipeline(&self, name: &str) -> Option<&Spanned<NamedPipeline>> {
        self.pipelines.iter().rev().find(|p| p.value.name == name)
    }

    /// Find a typed variable (last declaration wins).
    #[must_use]
    pub fn variable(&self, var_type: &str, name: &str) -> Option<&Spanned<Variable>> {
        self.variables
            .iter()
            .rev()
            .find(|v| v.value.var_type == var_type && v.value.name == name)
    }

    /// Every pipeline in the program, including route bodies and result
    /// branches, in source order.
    pub fn all_pipelines(&self) -> Vec<&Pipeline> {
        let mut out = Vec::new();
        for named in &self.pipelines {
            named.value.pipeline.collect_nested(&mut out);
        }
        for route in &self.routes {
            if let PipelineRef::Inline(pipeline) = &route.value.pipeline {
                pipeline.collect_nested(&mut out);
            }
        }
        out
    }
}

/// A `config <name> { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Middleware the block configures.
    pub name: String,
    /// `key: value` lines in source order.
    pub properties: Vec<ConfigProperty>,
}

/// One `key: value` line of a config block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigProperty {
    /// Property name.
    pub key: String,
    /// Property value.
    pub value: ConfigValue,
}

/// Value of a config property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigValue {
    /// A string literal or bare word.
    String(String),
    /// `$VAR` or `$VAR || "default"`.
    EnvVar {
        /// Environment variable name.
        var: String,
        /// Fallback when the variable is unset.
        default: Option<String>,
    },
    /// `true` / `false`.
    Boolean(bool),
    /// A numeric literal.
    Number(Decimal),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::EnvVar { var, default: None } => write!(f, "${var}"),
            Self::EnvVar {
                var,
                default: Some(d),
            } => write!(f, "${var} || \"{d}\""),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A typed variable: `<var_type> <name> = \`value\``.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Open-ended type, usually a middleware name such as `pg` or `handlebars`.
    pub var_type: String,
    /// Variable name.
    pub name: String,
    /// Span of the name token.
    pub name_span: Span,
    /// Contents of the backtick string.
    pub value: String,
    /// Span of the value between the backticks.
    pub value_span: Span,
}

impl Variable {
    /// The symbol key `"var_type::name"`.
    #[must_use]
    pub fn key(&self) -> String {
        variable_key(&self.var_type, &self.name)
    }
}

/// `pipeline <name> = <steps>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPipeline {
    /// Pipeline name.
    pub name: String,
    /// Span of the name token.
    pub name_span: Span,
    /// The steps.
    pub pipeline: Pipeline,
}

/// An ordered chain of `|>` steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Steps in execution order.
    pub steps: Vec<Spanned<Step>>,
}

impl Pipeline {
    /// Whether the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Push this pipeline and every pipeline nested in its result branches.
    pub fn collect_nested<'a>(&'a self, out: &mut Vec<&'a Self>) {
        out.push(self);
        for step in &self.steps {
            if let Step::Result { branches } = &step.value {
                for branch in branches {
                    branch.pipeline.collect_nested(out);
                }
            }
        }
    }

    /// Deepest level of result-branch nesting (0 for a flat pipeline).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.steps
            .iter()
            .filter_map(|step| match &step.value {
                Step::Result { branches } => {
                    branches.iter().map(|b| b.pipeline.depth() + 1).max()
                }
                Step::Regular { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }
}

/// A single middleware invocation or a `result` branch step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// `|> name: config`.
    Regular {
        /// Middleware name (the step type).
        name: String,
        /// Step configuration.
        config: StepConfig,
        /// Span of the configuration payload (inside the delimiters).
        config_span: Span,
    },
    /// `|> result` followed by branches.
    Result {
        /// Branches in source order.
        branches: Vec<ResultBranch>,
    },
}

/// Payload of a regular step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepConfig {
    /// A backtick string, usually code for the middleware.
    Backtick(String),
    /// A double-quoted string.
    Quoted(String),
    /// A bare identifier naming a variable (or a pipeline for `pipeline:`).
    Identifier(String),
}

impl StepConfig {
    /// The raw payload text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Backtick(s) | Self::Quoted(s) | Self::Identifier(s) => s,
        }
    }

    /// The identifier, when the payload is a bare identifier.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(s) => Some(s),
            _ => None,
        }
    }
}

/// One branch of a `result` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBranch {
    /// Outcome kind.
    pub branch_type: BranchType,
    /// HTTP status code as written.
    pub status_code: u32,
    /// Span of the status digits.
    pub status_span: Span,
    /// Nested pipeline run for this outcome.
    pub pipeline: Pipeline,
}

/// Outcome kind of a result branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchType {
    /// `ok(...)`.
    Ok,
    /// Any other named outcome, e.g. `notFound(...)`.
    Custom(String),
    /// `default(...)`.
    Default,
}

impl BranchType {
    /// Classify a branch label.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "ok" => Self::Ok,
            "default" => Self::Default,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Custom(name) => write!(f, "{name}"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// `METHOD /path` bound to a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// HTTP method, upper case.
    pub method: String,
    /// Route path, e.g. `/users/:id`.
    pub path: String,
    /// The pipeline handling the route.
    pub pipeline: PipelineRef,
}

/// How a route refers to its pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineRef {
    /// Steps written under the route.
    Inline(Pipeline),
    /// A single `|> pipeline: <name>` step.
    Named(String),
}

/// `describe "name"` test suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Describe {
    /// Suite name.
    pub name: String,
    /// Suite-wide mocks.
    pub mocks: Vec<Mock>,
    /// Test cases.
    pub tests: Vec<It>,
}

/// `it "name"` test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct It {
    /// Test name.
    pub name: String,
    /// Test-local mocks.
    pub mocks: Vec<Mock>,
    /// What the test exercises.
    pub when: When,
    /// Optional `with input` payload.
    pub input: Option<String>,
    /// `then` / `and` assertions.
    pub conditions: Vec<Condition>,
}

/// The `when` clause of a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum When {
    /// `when calling GET /path`.
    CallingRoute {
        /// HTTP method.
        method: String,
        /// Request path.
        path: String,
    },
    /// `when executing pipeline <name>`.
    ExecutingPipeline(String),
    /// `when executing variable <type> <name>`.
    ExecutingVariable {
        /// Variable type.
        var_type: String,
        /// Variable name.
        name: String,
    },
}

/// `with mock <target> returning \`value\``.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mock {
    /// `type.name` or `pipeline name`.
    pub target: String,
    /// The mocked return value.
    pub return_value: String,
}

/// A `then` / `and` assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Whether the line starts with `then` or `and`.
    pub condition_type: ConditionType,
    /// Asserted field, e.g. `status` or `output`.
    pub field: String,
    /// Optional jq expression applied to the field.
    pub jq_expr: Option<String>,
    /// Comparison word, e.g. `is`, `equals`, `contains`.
    pub comparison: String,
    /// Expected value.
    pub value: String,
}

/// Leading keyword of an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    /// `then`.
    Then,
    /// `and`.
    And,
}
