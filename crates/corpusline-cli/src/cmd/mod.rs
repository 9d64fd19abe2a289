pub mod build;
pub mod verify;

use std::path::PathBuf;

use anyhow::Result;

use corpusline_core::{JsonlSource, SourceFetcher};

use crate::config::Config;

/// Resolve the source list: `--source name=path` flags override the
/// config file's `[[sources]]` entries entirely.
pub fn resolve_sources(
    flags: &[(String, PathBuf)],
    config: &Config,
) -> Result<Vec<Box<dyn SourceFetcher>>> {
    let pairs: Vec<(String, PathBuf)> = if flags.is_empty() {
        config
            .sources
            .iter()
            .map(|s| (s.name.clone(), s.path.clone()))
            .collect()
    } else {
        flags.to_vec()
    };
    if pairs.is_empty() {
        anyhow::bail!(
            "no sources configured; add [[sources]] entries to the config file or pass --source name=path"
        );
    }
    Ok(pairs
        .into_iter()
        .map(|(name, path)| Box::new(JsonlSource::new(name, path)) as Box<dyn SourceFetcher>)
        .collect())
}

/// clap value parser for `--source name=path`.
pub fn parse_source(s: &str) -> std::result::Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected name=path, got '{s}'")),
    }
}
