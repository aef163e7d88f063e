//! LSP request and notification handlers.
//!
//! Each handler processes one request type against the cached analysis of
//! the document version the request was made for.

pub mod utils;

pub mod completion;
pub mod definition;
pub mod diagnostics;
pub mod document_highlight;
pub mod hover;
pub mod references;
pub mod rename;
pub mod symbols;
