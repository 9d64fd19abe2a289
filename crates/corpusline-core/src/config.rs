//! Pipeline configuration, validated once at startup

use std::path::PathBuf;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::error::ConfigError;

/// Immutable configuration for one corpus build.
///
/// Constructed by the caller, validated before any source is touched, then
/// borrowed by every component. Never mutated mid-run.
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// Per-source record caps; sources not listed use `default_limit`.
    pub source_limits: FxHashMap<String, usize>,
    pub default_limit: usize,
    /// Worker pool size for parallel content-quality filtering.
    pub workers: usize,
    /// Network/receive timeout for source fetches.
    pub timeout: Duration,
    /// Batch size for chunked processing and checkpoint writes.
    pub chunk_size: usize,
    /// Total fetch invocations per source (must be ≥ 1).
    pub max_retries: u32,
    /// Backoff multiplier: sleep `backoff_base * 2^attempt` seconds.
    pub backoff_base: f64,
    /// Entropy threshold for the final ranked corpus.
    pub rank_threshold: f64,
    /// Entropy threshold for per-sample quality filtering.
    pub content_threshold: f64,
    /// Directory for intermediate checkpoints.
    pub data_dir: PathBuf,
    /// Path of the final merged corpus.
    pub output_path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            source_limits: FxHashMap::default(),
            default_limit: 1000,
            workers: 8,
            timeout: Duration::from_secs(30),
            chunk_size: 1000,
            max_retries: 3,
            backoff_base: 2.0,
            rank_threshold: crate::entropy::DEFAULT_RANK_THRESHOLD,
            content_threshold: crate::entropy::DEFAULT_CONTENT_THRESHOLD,
            data_dir: PathBuf::from("corpus_data"),
            output_path: PathBuf::from("corpus.jsonl"),
        }
    }
}

impl CorpusConfig {
    /// Validate tunables. Any failure here is fatal for the whole run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError("max_retries must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError("workers must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError("chunk_size must be at least 1".into()));
        }
        if self.default_limit == 0 {
            return Err(ConfigError("default_limit must be at least 1".into()));
        }
        if !self.backoff_base.is_finite() || self.backoff_base < 0.0 {
            return Err(ConfigError("backoff_base must be a non-negative number".into()));
        }
        for (name, threshold) in [
            ("rank_threshold", self.rank_threshold),
            ("content_threshold", self.content_threshold),
        ] {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ConfigError(format!("{name} must be a non-negative number")));
            }
        }
        Ok(())
    }

    /// Record cap for a source, falling back to the default.
    pub fn limit_for(&self, source: &str) -> usize {
        self.source_limits
            .get(source)
            .copied()
            .unwrap_or(self.default_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(CorpusConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_retries_rejected() {
        let config = CorpusConfig {
            max_retries: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("max_retries"));
    }

    #[test]
    fn zero_workers_rejected() {
        let config = CorpusConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_threshold_rejected() {
        let config = CorpusConfig {
            rank_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn limit_for_uses_override_then_default() {
        let mut config = CorpusConfig::default();
        config.source_limits.insert("arxiv".into(), 50);
        assert_eq!(config.limit_for("arxiv"), 50);
        assert_eq!(config.limit_for("pubmed"), config.default_limit);
    }
}
