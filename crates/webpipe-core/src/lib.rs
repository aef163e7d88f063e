//! Core types for webpipe tooling
//!
//! This crate provides the fundamental types shared by the parser, the
//! symbol index and the language server:
//!
//! - [`Program`] - The parsed form of one webpipe file
//! - [`Pipeline`] / [`Step`] - `|>` chains, including nested `result` branches
//! - [`Variable`] - Typed variables addressed by their `"type::name"` key
//! - [`Span`] / [`Spanned`] - Byte ranges into the source text
//! - [`Severity`] - Diagnostic severity
//!
//! # Example
//!
//! ```
//! use webpipe_core::{variable_key, Span};
//!
//! assert_eq!(variable_key("pg", "getUser"), "pg::getUser");
//! assert!(Span::new(3, 8).contains(8));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod severity;
pub mod span;

pub use ast::{
    split_variable_key, variable_key, BranchType, Condition, ConditionType, Config,
    ConfigProperty, ConfigValue, Describe, It, Mock, NamedPipeline, Pipeline, PipelineRef,
    Program, ResultBranch, Route, Step, StepConfig, Variable, When, KEY_SEPARATOR,
};
pub use severity::Severity;
pub use span::{Span, Spanned};

// Re-export commonly used external types
pub use rust_decimal::Decimal;
