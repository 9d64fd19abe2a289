//! The corpus build orchestrator and its pipeline state machine
//!
//! Drives the whole run: fetch each configured source under retry, expand
//! and quality-filter its records, checkpoint the per-source samples, then
//! merge, rank, write the final corpus, and report. A failed source is
//! skipped, never fatal for the run; a set cancellation token ends the run
//! at the next stage boundary with a best-effort corpus and report.

use std::time::Instant;

use crate::cancel::CancelToken;
use crate::checkpoint::{write_jsonl, CheckpointStore};
use crate::config::CorpusConfig;
use crate::dedup::Deduplicator;
use crate::entropy::EntropyRanker;
use crate::error::{ConfigError, RetryError};
use crate::metrics::{DatasetStats, MetricsCollector};
use crate::process::SampleProcessor;
use crate::record::{Record, Sample};
use crate::retry::{with_retry, RetryPolicy};
use crate::source::SourceFetcher;

/// Stage file holding the final ranked corpus inside the data directory,
/// kept alongside the per-source checkpoints for inspection.
pub const RANKED_CHECKPOINT: &str = "ranked.jsonl";

/// Observable pipeline stage. Transitions are strictly forward through the
/// per-source loop and the finalization stages; `Aborted` is reachable from
/// anywhere once the cancellation token is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Fetching(String),
    Processing(String),
    Checkpointed(String),
    Merging,
    Ranking,
    Writing,
    Reporting,
    Done,
    Aborted,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Fetching(s) => write!(f, "fetching {s}"),
            Self::Processing(s) => write!(f, "processing {s}"),
            Self::Checkpointed(s) => write!(f, "checkpointed {s}"),
            Self::Merging => write!(f, "merging"),
            Self::Ranking => write!(f, "ranking"),
            Self::Writing => write!(f, "writing"),
            Self::Reporting => write!(f, "reporting"),
            Self::Done => write!(f, "done"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// How a build ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Done,
    Aborted,
}

/// Result of one build: final counters plus the rendered run report. The
/// report is produced even for aborted runs.
#[derive(Debug)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    pub merged_samples: usize,
    pub ranked_samples: usize,
    pub checkpoint_failures: usize,
    pub report: String,
}

/// Per-source checkpoint summary produced by [`CorpusBuilder::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyEntry {
    pub source: String,
    pub samples: usize,
    pub skipped: usize,
    pub readable: bool,
}

/// Builds a corpus from configured sources.
///
/// One builder per run. Sources are fetched in registration order, each
/// under the configured retry policy; the merged sample set is entropy
/// ranked and written to the configured output path.
pub struct CorpusBuilder {
    config: CorpusConfig,
    token: CancelToken,
    sources: Vec<Box<dyn SourceFetcher>>,
    ranker: EntropyRanker,
    processor: SampleProcessor,
    dedup: Deduplicator,
    metrics: MetricsCollector,
    store: CheckpointStore,
    pool: rayon::ThreadPool,
    state: PipelineState,
}

impl CorpusBuilder {
    /// Validate the configuration and spin up the worker pool. Fails before
    /// any source is touched.
    pub fn new(config: CorpusConfig, token: CancelToken) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .map_err(|e| ConfigError(format!("worker pool: {e}")))?;
        let store = CheckpointStore::new(&config.data_dir);
        Ok(Self {
            ranker: EntropyRanker::new(config.rank_threshold),
            processor: SampleProcessor::new(config.content_threshold),
            dedup: Deduplicator::new(),
            metrics: MetricsCollector::new::<&str>(&[]),
            config,
            token,
            sources: Vec::new(),
            store,
            pool,
            state: PipelineState::Init,
        })
    }

    /// Register a source. Fetch order is registration order; the metrics
    /// entry exists from this point even if the source never yields a record.
    pub fn add_source(&mut self, source: Box<dyn SourceFetcher>) -> &mut Self {
        self.metrics.register(source.name());
        self.sources.push(source);
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Run the full pipeline. Infallible by construction: source failures
    /// are counted and skipped, checkpoint failures are counted and logged,
    /// and cancellation yields an aborted run with a best-effort corpus.
    pub fn build(&mut self) -> BuildReport {
        let run_start = Instant::now();
        let names: Vec<String> = self.sources.iter().map(|s| s.name().to_owned()).collect();
        log::info!("building corpus from {} sources", names.len());

        let mut merged: Vec<Sample> = Vec::new();
        for (idx, name) in names.iter().enumerate() {
            if self.token.is_cancelled() {
                log::warn!("cancellation observed, skipping remaining sources");
                self.transition(PipelineState::Aborted);
                break;
            }
            if self.collect_source(idx, name, &mut merged) {
                self.transition(PipelineState::Aborted);
                break;
            }
        }

        let mut aborted = self.state == PipelineState::Aborted || self.token.is_cancelled();
        if aborted {
            log::warn!(
                "run aborted, finalizing best-effort corpus from {} samples",
                merged.len()
            );
        }

        if !aborted {
            self.transition(PipelineState::Merging);
        }
        let merged_count = merged.len();
        log::info!("merged {merged_count} samples across sources");

        if !aborted {
            self.transition(PipelineState::Ranking);
        }
        // An aborted run still ranks what it gathered; the run token would
        // make rank a no-op, so finalization uses an unset one.
        let rank_token = if aborted {
            CancelToken::new()
        } else {
            self.token.clone()
        };
        let ranked = self.ranker.rank(&merged, None, &rank_token);
        let final_set = if ranked.is_empty() && merged_count > 0 {
            log::warn!(
                "ranking kept none of {merged_count} samples, writing the unranked corpus instead"
            );
            merged
        } else {
            ranked
        };
        // Cancellation may have landed mid-ranking
        aborted = aborted || self.token.is_cancelled();

        if !aborted {
            self.transition(PipelineState::Writing);
        }
        self.checkpoint(&final_set, RANKED_CHECKPOINT);
        match write_jsonl(&self.config.output_path, &final_set) {
            Ok(()) => log::info!(
                "wrote {} samples to {}",
                final_set.len(),
                self.config.output_path.display()
            ),
            Err(e) => {
                log::error!(
                    "failed to write corpus to {}: {e}",
                    self.config.output_path.display()
                );
                self.metrics.record_checkpoint_failure();
            }
        }

        if !aborted {
            self.transition(PipelineState::Reporting);
        }
        self.metrics.set_total_elapsed(run_start.elapsed());
        let report = format!(
            "{}{}",
            self.metrics.report(),
            DatasetStats::compute(&final_set).report()
        );

        let outcome = if aborted {
            self.transition(PipelineState::Aborted);
            BuildOutcome::Aborted
        } else {
            self.transition(PipelineState::Done);
            BuildOutcome::Done
        };

        BuildReport {
            outcome,
            merged_samples: merged_count,
            ranked_samples: final_set.len(),
            checkpoint_failures: self.metrics.checkpoint_failures(),
            report,
        }
    }

    /// Fetch, process, and checkpoint one source, extending `merged` with
    /// its surviving samples. Returns `true` when the run must abort.
    fn collect_source(&mut self, idx: usize, name: &str, merged: &mut Vec<Sample>) -> bool {
        self.transition(PipelineState::Fetching(name.to_owned()));
        let started = Instant::now();
        let policy = RetryPolicy {
            max_attempts: self.config.max_retries,
            backoff_base: self.config.backoff_base,
        };

        let fetched = {
            let Self {
                ref mut sources,
                ref config,
                ref token,
                ..
            } = *self;
            let fetcher = sources[idx].as_mut();
            with_retry(&policy, token, name, || fetcher.fetch(config, token))
        };

        let mut abort = false;
        match fetched {
            Ok(batch) => {
                if batch.malformed > 0 {
                    log::warn!("{name}: skipped {} malformed entries", batch.malformed);
                    self.metrics.add_errors(name, batch.malformed);
                }
                let admitted = self.admit(name, batch.records);
                self.metrics.add_records(name, admitted.len());
                log::info!("{name}: admitted {} records", admitted.len());

                self.transition(PipelineState::Processing(name.to_owned()));
                let outcome = {
                    let Self {
                        ref processor,
                        ref pool,
                        ref token,
                        ref config,
                        ..
                    } = *self;
                    processor.process(&admitted, pool, token, config.chunk_size)
                };
                if outcome.unknown_domains > 0 || outcome.unknown_sections > 0 {
                    log::info!(
                        "{name}: {} records without a domain tag, {} without a section tag",
                        outcome.unknown_domains,
                        outcome.unknown_sections
                    );
                }
                log::info!(
                    "{name}: kept {} of {} expanded samples",
                    outcome.samples.len(),
                    outcome.expanded
                );

                self.checkpoint(&outcome.samples, &checkpoint_name(name));
                merged.extend(outcome.samples);
                self.transition(PipelineState::Checkpointed(name.to_owned()));
            }
            Err(RetryError::Cancelled) => {
                log::warn!("{name}: fetch cancelled");
                abort = true;
            }
            Err(e) => {
                // One failure outcome per skipped source, not one per attempt
                log::error!("{name}: source skipped: {e}");
                self.metrics.add_errors(name, 1);
            }
        }
        self.metrics.add_elapsed(name, started.elapsed());
        abort
    }

    /// Admission control: drop records with an empty identity before they
    /// reach deduplication, then keep first-seen records up to the
    /// per-source cap.
    fn admit(&mut self, source: &str, records: Vec<Record>) -> Vec<Record> {
        let limit = self.config.limit_for(source);
        let mut admitted = Vec::new();
        for record in records {
            if admitted.len() >= limit {
                log::debug!("{source}: record cap {limit} reached");
                break;
            }
            if record.id.trim().is_empty() || record.title.trim().is_empty() {
                log::debug!("{source}: dropping record with empty id or title");
                continue;
            }
            if self.dedup.admit(&record.dedup_key()) {
                admitted.push(record);
            }
        }
        admitted
    }

    /// Replace a stage file atomically from the run's point of view: clear
    /// the previous run's file, then append in configured batch sizes. A
    /// failure is counted and logged, never fatal.
    fn checkpoint(&mut self, samples: &[Sample], name: &str) {
        if let Err(e) = self.try_checkpoint(samples, name) {
            log::error!("checkpoint {name} failed: {e}");
            self.metrics.record_checkpoint_failure();
        }
    }

    fn try_checkpoint(&self, samples: &[Sample], name: &str) -> std::io::Result<()> {
        self.store.clear(name)?;
        if samples.is_empty() {
            // Still materialize the stage file so verify can see the stage ran
            self.store.append::<Sample>(&[], name)?;
            return Ok(());
        }
        for chunk in samples.chunks(self.config.chunk_size) {
            self.store.append(chunk, name)?;
        }
        Ok(())
    }

    /// Read back every registered source's checkpoint and summarize it.
    /// Unreadable files are reported, not errors.
    pub fn verify(&self) -> Vec<VerifyEntry> {
        self.sources
            .iter()
            .map(|source| {
                let name = source.name();
                match self.store.read_all::<Sample>(&checkpoint_name(name)) {
                    Ok((samples, skipped)) => VerifyEntry {
                        source: name.to_owned(),
                        samples: samples.len(),
                        skipped,
                        readable: true,
                    },
                    Err(e) => {
                        log::warn!("{name}: checkpoint unreadable: {e}");
                        VerifyEntry {
                            source: name.to_owned(),
                            samples: 0,
                            skipped: 0,
                            readable: false,
                        }
                    }
                }
            })
            .collect()
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            log::debug!("pipeline: {} -> {next}", self.state);
            self.state = next;
        }
    }
}

fn checkpoint_name(source: &str) -> String {
    format!("{source}.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::FetchBatch;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record(id: &str, title: &str, abstract_text: &str) -> Record {
        Record {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            body: String::new(),
            source: "test".into(),
            domain: String::new(),
            provenance: BTreeMap::new(),
            categories: vec![],
            text: abstract_text.into(),
        }
    }

    /// Canned source: yields a fixed batch, or a scripted error per call.
    struct ScriptedSource {
        name: String,
        script: Vec<Result<Vec<Record>, SourceError>>,
        calls: usize,
    }

    impl ScriptedSource {
        fn new(name: &str, script: Vec<Result<Vec<Record>, SourceError>>) -> Self {
            Self {
                name: name.into(),
                script,
                calls: 0,
            }
        }

        fn ok(name: &str, records: Vec<Record>) -> Self {
            Self::new(name, vec![Ok(records)])
        }
    }

    impl SourceFetcher for ScriptedSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn fetch(
            &mut self,
            _config: &CorpusConfig,
            _token: &CancelToken,
        ) -> Result<FetchBatch, SourceError> {
            let step = self.calls.min(self.script.len().saturating_sub(1));
            self.calls += 1;
            match &self.script[step] {
                Ok(records) => Ok(FetchBatch {
                    records: records.clone(),
                    malformed: 0,
                }),
                Err(SourceError::Transient(m)) => Err(SourceError::Transient(m.clone())),
                Err(SourceError::Malformed(m)) => Err(SourceError::Malformed(m.clone())),
                Err(SourceError::Config(m)) => Err(SourceError::Config(m.clone())),
            }
        }
    }

    fn config(dir: &TempDir) -> CorpusConfig {
        CorpusConfig {
            data_dir: dir.path().join("data"),
            output_path: dir.path().join("corpus.jsonl"),
            backoff_base: 0.0,
            rank_threshold: 0.0,
            content_threshold: 0.0,
            workers: 2,
            ..Default::default()
        }
    }

    fn varied(id: &str, title: &str) -> Record {
        record(
            id,
            title,
            "A study of several distinct measurement protocols across laboratories.",
        )
    }

    #[test]
    fn successful_run_reaches_done() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("1", "First Title")],
        )));

        let report = builder.build();
        assert_eq!(report.outcome, BuildOutcome::Done);
        assert_eq!(*builder.state(), PipelineState::Done);
        assert_eq!(report.ranked_samples, 1);
        assert_eq!(report.checkpoint_failures, 0);
        assert!(builder.config().output_path.exists());
        assert!(report.report.contains("alpha"));
    }

    #[test]
    fn failed_source_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("1", "Alpha Title")],
        )));
        builder.add_source(Box::new(ScriptedSource::new(
            "broken",
            vec![Err(SourceError::Config("missing path".into()))],
        )));
        builder.add_source(Box::new(ScriptedSource::ok(
            "gamma",
            vec![varied("2", "Gamma Title")],
        )));

        let report = builder.build();
        assert_eq!(report.outcome, BuildOutcome::Done);
        assert_eq!(report.ranked_samples, 2);
        assert_eq!(builder.metrics().source("broken").unwrap().errors, 1);
        assert_eq!(builder.metrics().source("broken").unwrap().records, 0);
    }

    #[test]
    fn exhausted_retries_count_one_error() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::new(
            "flaky",
            vec![Err(SourceError::Transient("down".into()))],
        )));

        let report = builder.build();
        assert_eq!(report.outcome, BuildOutcome::Done);
        assert_eq!(builder.metrics().source("flaky").unwrap().errors, 1);
    }

    #[test]
    fn transient_source_recovers_within_retries() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::new(
            "flaky",
            vec![
                Err(SourceError::Transient("down".into())),
                Ok(vec![varied("1", "Recovered Title")]),
            ],
        )));

        let report = builder.build();
        assert_eq!(report.outcome, BuildOutcome::Done);
        assert_eq!(report.ranked_samples, 1);
        assert_eq!(builder.metrics().source("flaky").unwrap().errors, 0);
    }

    #[test]
    fn duplicate_titles_deduplicated_across_sources() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("1", "Shared Title")],
        )));
        builder.add_source(Box::new(ScriptedSource::ok(
            "beta",
            vec![varied("2", "  shared   TITLE "), varied("3", "Unique Title")],
        )));

        let report = builder.build();
        assert_eq!(report.ranked_samples, 2);
        assert_eq!(builder.metrics().source("alpha").unwrap().records, 1);
        assert_eq!(builder.metrics().source("beta").unwrap().records, 1);
    }

    #[test]
    fn records_without_identity_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![
                record("", "No Id", "text"),
                record("1", "   ", "text"),
                varied("2", "Kept Title"),
            ],
        )));

        let report = builder.build();
        assert_eq!(builder.metrics().source("alpha").unwrap().records, 1);
        assert_eq!(report.ranked_samples, 1);
    }

    #[test]
    fn cancelled_before_build_aborts_with_report() {
        let dir = TempDir::new().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let mut builder = CorpusBuilder::new(config(&dir), token).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("1", "Never Fetched")],
        )));

        let report = builder.build();
        assert_eq!(report.outcome, BuildOutcome::Aborted);
        assert_eq!(*builder.state(), PipelineState::Aborted);
        assert_eq!(report.ranked_samples, 0);
        assert!(report.report.contains("OVERALL"));
        // Best-effort output is still written (empty)
        assert!(builder.config().output_path.exists());
    }

    #[test]
    fn empty_sources_yield_empty_corpus_and_done() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok("alpha", vec![])));

        let report = builder.build();
        assert_eq!(report.outcome, BuildOutcome::Done);
        assert_eq!(report.merged_samples, 0);
        assert_eq!(report.ranked_samples, 0);
        let content = std::fs::read_to_string(&builder.config().output_path).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn subthreshold_ranking_falls_back_to_unranked() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        // Nothing can reach this threshold
        cfg.rank_threshold = 1000.0;
        let mut builder = CorpusBuilder::new(cfg, CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("1", "Kept Anyway")],
        )));

        let report = builder.build();
        assert_eq!(report.outcome, BuildOutcome::Done);
        assert_eq!(report.merged_samples, 1);
        assert_eq!(report.ranked_samples, 1);
    }

    #[test]
    fn checkpoints_written_per_source_and_for_ranked_set() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("1", "Some Title")],
        )));
        builder.build();

        let data = builder.config().data_dir.clone();
        assert!(data.join("alpha.jsonl").exists());
        assert!(data.join(RANKED_CHECKPOINT).exists());
    }

    #[test]
    fn verify_summarizes_checkpoints() {
        let dir = TempDir::new().unwrap();
        let mut builder = CorpusBuilder::new(config(&dir), CancelToken::new()).unwrap();
        builder.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("1", "Some Title")],
        )));
        builder.add_source(Box::new(ScriptedSource::new(
            "broken",
            vec![Err(SourceError::Config("missing".into()))],
        )));
        builder.build();

        let entries = builder.verify();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].source, "alpha");
        assert_eq!(entries[0].samples, 1);
        assert!(entries[0].readable);
        // Failed source never checkpointed
        assert!(!entries[1].readable);
    }

    #[test]
    fn stale_checkpoints_cleared_between_runs() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);

        let mut first = CorpusBuilder::new(cfg.clone(), CancelToken::new()).unwrap();
        first.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("1", "Title One"), varied("2", "Title Two")],
        )));
        first.build();

        let mut second = CorpusBuilder::new(cfg, CancelToken::new()).unwrap();
        second.add_source(Box::new(ScriptedSource::ok(
            "alpha",
            vec![varied("3", "Title Three")],
        )));
        second.build();

        let entries = second.verify();
        assert_eq!(entries[0].samples, 1);
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let cfg = CorpusConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(CorpusBuilder::new(cfg, CancelToken::new()).is_err());
    }
}
