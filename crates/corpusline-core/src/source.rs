//! Source fetcher boundary and the built-in local-data fetchers
//!
//! The wire protocols of real sources live behind [`SourceFetcher`]; the
//! pipeline only sees ordered [`Record`] batches and the three failure
//! classes of [`SourceError`]. Two adapters ship with the crate: a
//! JSON-Lines file source and a bounded-channel source for streaming
//! producers.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};

use crate::cancel::CancelToken;
use crate::config::CorpusConfig;
use crate::error::SourceError;
use crate::record::Record;

/// Raw records fetched from one source, plus the count of individually
/// malformed entries that were skipped (never fatal for the batch).
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub records: Vec<Record>,
    pub malformed: usize,
}

/// One external source of records.
///
/// Implementations map source-native results into the common [`Record`]
/// shape and are the correctness boundary for that source's quirks. A
/// malformed individual entry is skipped and counted in
/// [`FetchBatch::malformed`]; only whole-fetch failures return `Err`.
pub trait SourceFetcher {
    fn name(&self) -> &str;

    fn fetch(
        &mut self,
        config: &CorpusConfig,
        token: &CancelToken,
    ) -> Result<FetchBatch, SourceError>;
}

impl std::fmt::Debug for dyn SourceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFetcher")
            .field("name", &self.name())
            .finish()
    }
}

/// Reads records from a local JSON-Lines file.
///
/// Unparsable lines are skipped and counted as malformed; a missing file
/// is a configuration failure, other I/O errors are transient.
pub struct JsonlSource {
    name: String,
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl SourceFetcher for JsonlSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(
        &mut self,
        config: &CorpusConfig,
        token: &CancelToken,
    ) -> Result<FetchBatch, SourceError> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::Config(format!("{}: no such file", self.path.display()))
            } else {
                SourceError::Transient(format!("{}: {e}", self.path.display()))
            }
        })?;

        let limit = config.limit_for(&self.name);
        let mut batch = FetchBatch::default();
        for line in std::io::BufReader::new(file).lines() {
            if token.is_cancelled() || batch.records.len() >= limit {
                break;
            }
            let line =
                line.map_err(|e| SourceError::Transient(format!("{}: {e}", self.path.display())))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(mut record) => {
                    if record.source.is_empty() {
                        record.source = self.name.clone();
                    }
                    batch.records.push(record);
                }
                Err(e) => {
                    log::warn!("{}: skipping malformed entry: {e}", self.name);
                    batch.malformed += 1;
                }
            }
        }
        Ok(batch)
    }
}

/// Consumes records from a bounded channel fed by a streaming producer.
///
/// Reads up to the configured per-source cap, checking the cancellation
/// token between receives. A receive that outlasts the configured timeout
/// is a transient failure; a closed channel simply ends the batch.
/// Records received before a stall are buffered on the source, so a
/// retried fetch resumes with them instead of losing consumed records.
pub struct ChannelSource {
    name: String,
    receiver: Receiver<Record>,
    // Survives a transient stall: channel receives are consumed for good
    pending: Vec<Record>,
}

impl ChannelSource {
    pub fn new(name: impl Into<String>, receiver: Receiver<Record>) -> Self {
        Self {
            name: name.into(),
            receiver,
            pending: Vec::new(),
        }
    }
}

impl SourceFetcher for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(
        &mut self,
        config: &CorpusConfig,
        token: &CancelToken,
    ) -> Result<FetchBatch, SourceError> {
        let limit = config.limit_for(&self.name);
        while self.pending.len() < limit {
            if token.is_cancelled() {
                log::info!("{}: cancelled after {} records", self.name, self.pending.len());
                break;
            }
            match self.receiver.recv_timeout(config.timeout) {
                Ok(record) => self.pending.push(record),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(SourceError::Transient(format!(
                        "{}: producer stalled for {:.0}s ({} records buffered)",
                        self.name,
                        config.timeout.as_secs_f64(),
                        self.pending.len()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(FetchBatch {
            records: std::mem::take(&mut self.pending),
            malformed: 0,
        })
    }
}
