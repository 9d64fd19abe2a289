//! Configuration loading from TOML files

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use corpusline_core::CorpusConfig;

/// Global configuration for corpusline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub workers: WorkersConfig,
    pub retry: RetryConfig,
    pub entropy: EntropyConfig,
    pub limits: LimitsConfig,
    /// Sources fetched in file order.
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: PathBuf,
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("corpus_data"),
            path: PathBuf::from("corpus.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub count: usize,
    pub chunk_size: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            count: cpus.min(8),
            chunk_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base: f64,
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2.0,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    pub rank_threshold: f64,
    pub content_threshold: f64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            rank_threshold: corpusline_core::entropy::DEFAULT_RANK_THRESHOLD,
            content_threshold: corpusline_core::entropy::DEFAULT_CONTENT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub default: usize,
    /// Per-source overrides keyed by source name.
    pub per_source: BTreeMap<String, usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default: 1000,
            per_source: BTreeMap::new(),
        }
    }
}

/// One JSON-Lines source entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./corpusline.toml (current directory)
    /// 2. ~/.config/corpusline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("corpusline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "corpusline") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Translate into the pipeline's validated configuration shape.
    pub fn to_corpus_config(&self) -> CorpusConfig {
        let mut corpus = CorpusConfig {
            default_limit: self.limits.default,
            workers: self.workers.count,
            timeout: std::time::Duration::from_secs(self.retry.timeout_secs),
            chunk_size: self.workers.chunk_size,
            max_retries: self.retry.max_retries,
            backoff_base: self.retry.backoff_base,
            rank_threshold: self.entropy.rank_threshold,
            content_threshold: self.entropy.content_threshold,
            data_dir: self.output.data_dir.clone(),
            output_path: self.output.path.clone(),
            ..Default::default()
        };
        for (name, limit) in &self.limits.per_source {
            corpus.source_limits.insert(name.clone(), *limit);
        }
        corpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.output.path, PathBuf::from("corpus.jsonl"));
        assert!(config.workers.count >= 1);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[output]
data_dir = "/tmp/corpus_data"
path = "/tmp/corpus.jsonl"

[workers]
count = 4
chunk_size = 200

[retry]
max_retries = 5
backoff_base = 1.5

[entropy]
rank_threshold = 2.5

[limits]
default = 100

[limits.per_source]
arxiv = 50

[[sources]]
name = "arxiv"
path = "arxiv.jsonl"

[[sources]]
name = "pubmed"
path = "pubmed.jsonl"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "arxiv");
        assert_eq!(config.limits.per_source["arxiv"], 50);
    }

    #[test]
    fn corpus_config_translation_validates() {
        let toml = r#"
[workers]
count = 2

[limits]
default = 10

[limits.per_source]
arxiv = 3
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let corpus = config.to_corpus_config();
        assert!(corpus.validate().is_ok());
        assert_eq!(corpus.limit_for("arxiv"), 3);
        assert_eq!(corpus.limit_for("other"), 10);
    }
}
