//! Server settings read from `initializationOptions`.
//!
//! ```json
//! {
//!   "templateEngine": "handlebars",
//!   "cache": { "maxEntries": 50, "maxAgeSecs": 300 },
//!   "diagnostics": { "enabled": true }
//! }
//! ```
//!
//! Every field is optional.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use webpipe_index::{IndexOptions, DEFAULT_TEMPLATE_ENGINE};

use crate::db::CacheConfig;

/// Errors reading the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The options object did not match the expected shape.
    #[error("invalid initialization options: {0}")]
    Invalid(#[from] serde_json::Error),
    /// The template engine name was empty.
    #[error("templateEngine must not be empty")]
    EmptyTemplateEngine,
}

/// Top-level server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Variable type and step name whose bodies are templates.
    pub template_engine: String,
    /// Cache bounds.
    pub cache: CacheSettings,
    /// Diagnostic publishing.
    pub diagnostics: DiagnosticsSettings,
}

/// Cache bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Maximum number of cached documents.
    pub max_entries: usize,
    /// Seconds an unused entry may stay cached once the cache is full.
    pub max_age_secs: u64,
}

/// Diagnostic publishing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagnosticsSettings {
    /// Publish diagnostics on open and change.
    pub enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            template_engine: DEFAULT_TEMPLATE_ENGINE.to_string(),
            cache: CacheSettings::default(),
            diagnostics: DiagnosticsSettings::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_entries: defaults.max_entries,
            max_age_secs: defaults.max_age.as_secs(),
        }
    }
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ServerConfig {
    /// Read settings from the client's initialization options.
    ///
    /// Missing or `null` options yield the defaults.
    pub fn from_init_options(options: Option<serde_json::Value>) -> Result<Self, ConfigError> {
        let config: Self = match options {
            None | Some(serde_json::Value::Null) => Self::default(),
            Some(value) => serde_json::from_value(value)?,
        };
        if config.template_engine.trim().is_empty() {
            return Err(ConfigError::EmptyTemplateEngine);
        }
        Ok(config)
    }

    /// Options for the symbol index.
    #[must_use]
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            template_engine: self.template_engine.clone(),
        }
    }

    /// Options for the document cache.
    #[must_use]
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache.max_entries,
            max_age: Duration::from_secs(self.cache.max_age_secs),
            index: self.index_options(),
        }
    }
}
