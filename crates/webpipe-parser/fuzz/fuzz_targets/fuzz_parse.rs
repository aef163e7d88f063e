#![no_main]
//! Fuzz target for the webpipe parser.
//!
//! The parser must terminate without panicking on any UTF-8 input, and every
//! span it reports must lie on character boundaries inside the input.

use libfuzzer_sys::fuzz_target;
use webpipe_parser::parse;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let result = parse(input);
        for diag in &result.diagnostics {
            assert!(diag.span.end <= input.len());
            assert!(input.get(diag.span.start..diag.span.end).is_some());
        }
        for range in result.pipeline_ranges.values().chain(result.variable_ranges.values()) {
            assert!(range.span.encloses(&range.name_span));
        }
    }
});
