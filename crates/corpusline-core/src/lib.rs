//! Core pipeline for building a ranked text corpus from unreliable sources
//!
//! The pipeline fetches records from each configured source under a bounded
//! retry policy, expands them into tagged samples, filters and ranks the
//! merged set by token-distribution entropy, and writes the result as JSON
//! Lines with per-source checkpoints along the way. Failures are contained
//! at the source boundary; a set cancellation token winds the run down at
//! the next stage boundary with a best-effort corpus.
//!
//! [`builder::CorpusBuilder`] is the entry point; everything else is the
//! machinery it composes.

pub mod builder;
pub mod cancel;
pub mod checkpoint;
pub mod config;
pub mod console;
pub mod dedup;
pub mod entropy;
pub mod error;
pub mod metrics;
pub mod process;
pub mod record;
pub mod retry;
pub mod source;

pub use builder::{BuildOutcome, BuildReport, CorpusBuilder, PipelineState, VerifyEntry};
pub use cancel::CancelToken;
pub use checkpoint::CheckpointStore;
pub use config::CorpusConfig;
pub use error::{ConfigError, RetryError, SourceError};
pub use record::{Record, Sample};
pub use source::{ChannelSource, FetchBatch, JsonlSource, SourceFetcher};
