//! Version-keyed analysis cache.
//!
//! The cache owns the parse, scan and index pipeline for open documents.
//! Entries are keyed by document id and hold the analysis of exactly one
//! version; asking for a newer version overwrites the entry in place.
//!
//! Time is injected through [`Clock`] so eviction can be driven
//! deterministically from tests with [`ManualClock`].

mod cache;
mod clock;

pub use cache::{AnalysisBuilder, CacheConfig, CacheError, DocumentCache};
pub use clock::{Clock, ManualClock, SystemClock};
