//! Language Server Protocol implementation for webpipe.
//!
//! This crate provides an LSP server for `.wp` files, enabling IDE features like:
//! - Syntax and reference diagnostics
//! - Go-to-definition and find-references for pipelines, variables and partials
//! - Document highlights and rename
//! - Hover information and completion
//! - Document symbols (outline view)
//!
//! # Architecture
//!
//! - **Main loop**: handles LSP messages one at a time, applies changes
//! - **Document cache**: version-keyed analyses with age and size eviction
//! - **Handlers**: answer requests from the cached analysis
//!
//! # Example
//!
//! ```no_run
//! webpipe_lsp::start_stdio().expect("server failed");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod db;
pub mod handlers;
pub mod main_loop;

mod server;
mod vfs;

pub use config::{ConfigError, ServerConfig};
pub use db::{CacheConfig, CacheError, DocumentCache};
pub use main_loop::run_main_loop;
pub use server::{capabilities, initialize_result, start_stdio, Server, SERVER_NAME};
pub use vfs::Vfs;

/// LSP server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
