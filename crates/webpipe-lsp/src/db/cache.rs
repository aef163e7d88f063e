//! The document cache.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use webpipe_index::{DocumentAnalysis, IndexOptions};

use super::clock::{Clock, SystemClock};

/// Function that turns document text into an analysis.
pub type AnalysisBuilder = fn(&str, &IndexOptions) -> DocumentAnalysis;

/// Cache bounds and index options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Size bound checked after every insertion.
    pub max_entries: usize,
    /// Entries not accessed for longer than this are dropped first.
    pub max_age: Duration,
    /// Options passed to every build.
    pub index: IndexOptions,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_age: Duration::from_secs(300),
            index: IndexOptions::default(),
        }
    }
}

/// Errors returned by [`DocumentCache::get`].
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Building the analysis panicked. The cached entry was left untouched.
    #[error("analysis of {doc_id} (version {version}) panicked")]
    BuildPanicked {
        /// Document that failed.
        doc_id: String,
        /// Version that failed.
        version: i32,
        /// Analysis of the previously cached version, if any.
        previous: Option<Arc<DocumentAnalysis>>,
    },
}

impl CacheError {
    /// The last good analysis of the document, if one is cached.
    #[must_use]
    pub const fn previous(&self) -> Option<&Arc<DocumentAnalysis>> {
        match self {
            Self::BuildPanicked { previous, .. } => previous.as_ref(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    version: i32,
    analysis: Arc<DocumentAnalysis>,
    last_access: Instant,
}

/// Analyses of open documents, one version per document.
pub struct DocumentCache<C: Clock = SystemClock> {
    config: CacheConfig,
    clock: C,
    builder: AnalysisBuilder,
    entries: HashMap<String, Entry>,
    builds: usize,
}

impl DocumentCache<SystemClock> {
    /// Create a cache that reads the system clock.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> DocumentCache<C> {
    /// Create a cache with an explicit time source.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            builder: webpipe_index::analyze,
            entries: HashMap::new(),
            builds: 0,
        }
    }

    /// Replace the function used to build analyses.
    #[must_use]
    pub fn with_builder(mut self, builder: AnalysisBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// The analysis of `doc_id` at `version`, building it if needed.
    ///
    /// A hit refreshes the entry's access time. A miss builds from `text`,
    /// overwrites any older version and then applies eviction. A build that
    /// panics leaves the cache unchanged.
    pub fn get(
        &mut self,
        doc_id: &str,
        version: i32,
        text: &str,
    ) -> Result<Arc<DocumentAnalysis>, CacheError> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get_mut(doc_id) {
            if entry.version == version {
                entry.last_access = now;
                return Ok(Arc::clone(&entry.analysis));
            }
        }

        self.builds += 1;
        let builder = self.builder;
        let options = &self.config.index;
        let built = panic::catch_unwind(AssertUnwindSafe(|| builder(text, options)));

        let analysis = match built {
            Ok(analysis) => Arc::new(analysis),
            Err(_) => {
                tracing::error!("analysis of {} version {} panicked", doc_id, version);
                return Err(CacheError::BuildPanicked {
                    doc_id: doc_id.to_string(),
                    version,
                    previous: self.entries.get(doc_id).map(|e| Arc::clone(&e.analysis)),
                });
            }
        };

        tracing::debug!("built analysis for {} version {}", doc_id, version);
        self.entries.insert(
            doc_id.to_string(),
            Entry {
                version,
                analysis: Arc::clone(&analysis),
                last_access: now,
            },
        );
        self.evict(now);

        Ok(analysis)
    }

    /// Cached version of `doc_id`.
    #[must_use]
    pub fn version_of(&self, doc_id: &str) -> Option<i32> {
        self.entries.get(doc_id).map(|e| e.version)
    }

    /// Drop the entry for `doc_id`. Returns whether one existed.
    pub fn invalidate(&mut self, doc_id: &str) -> bool {
        self.entries.remove(doc_id).is_some()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many builds have been attempted.
    #[must_use]
    pub const fn builds(&self) -> usize {
        self.builds
    }

    /// The cache configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn evict(&mut self, now: Instant) {
        let max_entries = self.config.max_entries;
        if self.entries.len() <= max_entries {
            return;
        }

        let max_age = self.config.max_age;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_access) <= max_age);

        while self.entries.len() > max_entries {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by(|(a_id, a), (b_id, b)| {
                    a.last_access.cmp(&b.last_access).then_with(|| a_id.cmp(b_id))
                })
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            tracing::debug!("evicting {}", oldest);
            self.entries.remove(&oldest);
        }
    }
}

impl<C: Clock> std::fmt::Debug for DocumentCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .field("builds", &self.builds)
            .finish_non_exhaustive()
    }
}
