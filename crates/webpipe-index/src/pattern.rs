//! Static regex patterns shared by the scanner, partial resolver, context
//! resolver and editor completion.

use regex::Regex;

/// Identifier pattern; matches the parser's identifiers.
pub const IDENT: &str = r"[A-Za-z_][A-Za-z0-9_-]*";

/// Compile a built-in pattern, expanding every `IDENT` placeholder.
///
/// # Panics
///
/// Panics if the pattern is not a valid regex. Patterns are compile-time
/// constants, so this only fires on a broken build.
#[allow(clippy::expect_used)]
#[must_use]
pub fn compile(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("IDENT", IDENT)).expect("built-in pattern is a valid regex")
}
