//! Command-line tools for webpipe files.
//!
//! - `wp-check`: parse, index and validate one or more `.wp` files
//!
//! # Example Usage
//!
//! ```bash
//! wp-check app.wp
//! wp-check --format json app.wp routes/*.wp
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod report;
