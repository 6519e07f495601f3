//! Index configuration.
//!
//! [`IndexConfig`] is plain data: `Default` gives the tuned values for an
//! on-device index, the `with_*` methods adjust it, and it can be loaded from
//! a JSON file in which every key is optional.
//!
//! # Example
//!
//! ```
//! use satchel::config::{DuplicatePolicy, IndexConfig};
//!
//! let config = IndexConfig::default()
//!     .with_duplicate_policy(DuplicatePolicy::Replace)
//!     .with_max_buffered_docs(500);
//!
//! assert_eq!(config.max_buffered_docs, 500);
//! assert_eq!(config.scoring.k1, 1.2);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SatchelError};
use crate::schema::Field;

/// Smallest accepted `snippet_chars`; room for two ellipses and some text.
pub const MIN_SNIPPET_CHARS: usize = 16;

/// What `add` does with a document whose id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the add with `InvalidDocument`.
    #[default]
    Reject,
    /// Delete-then-insert: the older copy is tombstoned at the next commit.
    Replace,
}

/// Parameters of the ranking function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// BM25 term-frequency saturation.
    pub k1: f32,
    /// BM25 length normalization.
    pub b: f32,
    pub title_boost: f32,
    pub summary_boost: f32,
    pub content_boost: f32,
    pub category_boost: f32,
    /// Score multiplier per priority step: `1 + priority_boost * priority`.
    pub priority_boost: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            k1: 1.2,
            b: 0.75,
            title_boost: 2.0,
            summary_boost: 1.0,
            content_boost: 1.0,
            category_boost: 1.0,
            priority_boost: 0.1,
        }
    }
}

impl ScoringConfig {
    /// The boost applied to matches in `field`.
    pub fn field_boost(&self, field: Field) -> f32 {
        match field {
            Field::Title => self.title_boost,
            Field::Summary => self.summary_boost,
            Field::Content => self.content_boost,
            Field::Category => self.category_boost,
            Field::Id | Field::Priority => 1.0,
        }
    }

    /// The multiplier for a document of the given priority.
    pub fn priority_multiplier(&self, priority: u8) -> f32 {
        1.0 + self.priority_boost * priority as f32
    }
}

/// Configuration for an [`Index`](crate::index::Index).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum number of staged documents before `add` refuses more.
    pub max_buffered_docs: usize,
    /// Maximum approximate bytes held by the staging buffer.
    pub max_buffer_memory: usize,
    /// Handling of duplicate ids.
    pub duplicate_policy: DuplicatePolicy,
    /// Whether commits fsync files and the directory.
    pub sync_writes: bool,
    /// Maximum length in characters of a generated snippet.
    pub snippet_chars: usize,
    /// Ranking parameters.
    pub scoring: ScoringConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            max_buffered_docs: 50_000,
            max_buffer_memory: 64 * 1024 * 1024,
            duplicate_policy: DuplicatePolicy::Reject,
            sync_writes: true,
            snippet_chars: 200,
            scoring: ScoringConfig::default(),
        }
    }
}

impl IndexConfig {
    pub fn with_max_buffered_docs(mut self, max_buffered_docs: usize) -> Self {
        self.max_buffered_docs = max_buffered_docs;
        self
    }

    pub fn with_max_buffer_memory(mut self, max_buffer_memory: usize) -> Self {
        self.max_buffer_memory = max_buffer_memory;
        self
    }

    pub fn with_duplicate_policy(mut self, duplicate_policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = duplicate_policy;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }

    /// Parse a configuration from JSON text and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)
            .map_err(|e| SatchelError::invalid_config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_buffered_docs == 0 {
            return Err(SatchelError::invalid_config(
                "max_buffered_docs must be at least 1",
            ));
        }

        if self.max_buffer_memory == 0 {
            return Err(SatchelError::invalid_config(
                "max_buffer_memory must be at least 1",
            ));
        }

        if self.snippet_chars < MIN_SNIPPET_CHARS {
            return Err(SatchelError::invalid_config(format!(
                "snippet_chars must be at least {MIN_SNIPPET_CHARS}"
            )));
        }

        let scoring = &self.scoring;
        if !(scoring.k1.is_finite() && scoring.k1 >= 0.0) {
            return Err(SatchelError::invalid_config("k1 must be finite and >= 0"));
        }

        if !(0.0..=1.0).contains(&scoring.b) {
            return Err(SatchelError::invalid_config("b must be within 0..=1"));
        }

        let boosts = [
            scoring.title_boost,
            scoring.summary_boost,
            scoring.content_boost,
            scoring.category_boost,
            scoring.priority_boost,
        ];
        if boosts.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(SatchelError::invalid_config(
                "boosts must be finite and non-negative",
            ));
        }

        Ok(())
    }
}
