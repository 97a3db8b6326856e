//! Configuration for the retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the retrieval pipeline.
///
/// Construct via [`RagConfig::builder()`] for validated values, or
/// [`RagConfig::from_env()`] to read the recognized environment
/// variables (`CHUNK_SIZE`, `CHUNK_OVERLAP`, `SIMILARITY_THRESHOLD`,
/// `TOP_K_RESULTS`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters duplicated verbatim between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of nearest neighbors fetched per query. Deliberately generous:
    /// final relevance judgment is delegated to the language model.
    pub top_k: usize,
    /// Low similarity floor in `[0, 1]`. Candidates below it are discarded
    /// as noise after top-k retrieval; candidates above it are kept.
    pub similarity_threshold: f32,
    /// Maximum attempts for retried remote calls (embedding, store writes).
    pub max_retries: usize,
    /// Number of chunk texts submitted per remote embedding call.
    pub embed_batch_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 15,
            similarity_threshold: 0.3,
            max_retries: 5,
            embed_batch_size: 32,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a config from environment variables, falling back to defaults
    /// for unset values.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a set variable cannot be parsed or
    /// the resulting values are inconsistent.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(v) = env_parse::<usize>("CHUNK_SIZE")? {
            builder = builder.chunk_size(v);
        }
        if let Some(v) = env_parse::<usize>("CHUNK_OVERLAP")? {
            builder = builder.chunk_overlap(v);
        }
        if let Some(v) = env_parse::<f32>("SIMILARITY_THRESHOLD")? {
            builder = builder.similarity_threshold(v);
        }
        if let Some(v) = env_parse::<usize>("TOP_K_RESULTS")? {
            builder = builder.top_k(v);
        }
        builder.build()
    }
}

/// Read and parse an environment variable, `None` if unset.
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| RagError::Config(format!("invalid value for {name}: '{raw}'"))),
        Err(_) => Ok(None),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of nearest neighbors fetched per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity floor for candidates.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the maximum attempts for retried remote calls.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the number of texts submitted per remote embedding call.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `similarity_threshold` is outside `[0, 1]`
    /// - `embed_batch_size == 0`
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&c.similarity_threshold) {
            return Err(RagError::Config(format!(
                "similarity_threshold ({}) must be within [0, 1]",
                c.similarity_threshold
            )));
        }
        if c.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config, RagConfig::default());
    }

    #[test]
    fn overlap_must_be_less_than_chunk_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));

        let err = RagConfig::builder().chunk_size(100).chunk_overlap(150).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));

        assert!(RagConfig::builder().chunk_size(100).chunk_overlap(99).build().is_ok());
    }

    #[test]
    fn top_k_must_be_positive() {
        let err = RagConfig::builder().top_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn threshold_must_be_in_unit_range() {
        assert!(RagConfig::builder().similarity_threshold(0.0).build().is_ok());
        assert!(RagConfig::builder().similarity_threshold(1.0).build().is_ok());
        assert!(RagConfig::builder().similarity_threshold(1.5).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(-0.1).build().is_err());
    }
}
