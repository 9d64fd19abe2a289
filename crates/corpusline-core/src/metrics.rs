//! Per-source and aggregate pipeline metrics

use std::time::Duration;

use crate::record::{Sample, SampleSection};

/// Monotonic counters for one source: created zero-valued at pipeline
/// start, mutated only during that source's fetch/process stage, read-only
/// afterwards. Never reset mid-run.
#[derive(Debug, Default, Clone)]
pub struct SourceMetrics {
    pub records: usize,
    pub errors: usize,
    pub elapsed: Duration,
}

/// Collects per-source metrics in configured source order, plus run-level
/// counters the report surfaces (checkpoint failures, total wall time).
#[derive(Debug, Default)]
pub struct MetricsCollector {
    sources: Vec<(String, SourceMetrics)>,
    checkpoint_failures: usize,
    total_elapsed: Duration,
}

impl MetricsCollector {
    /// One zero-valued entry per configured source, in order.
    pub fn new<S: AsRef<str>>(source_names: &[S]) -> Self {
        Self {
            sources: source_names
                .iter()
                .map(|n| (n.as_ref().to_owned(), SourceMetrics::default()))
                .collect(),
            checkpoint_failures: 0,
            total_elapsed: Duration::ZERO,
        }
    }

    fn entry_mut(&mut self, source: &str) -> &mut SourceMetrics {
        if let Some(idx) = self.sources.iter().position(|(n, _)| n == source) {
            return &mut self.sources[idx].1;
        }
        // Unregistered source: track it anyway rather than losing counts
        self.sources
            .push((source.to_owned(), SourceMetrics::default()));
        &mut self.sources.last_mut().expect("just pushed").1
    }

    /// Ensure a zero-valued entry exists for a source added after
    /// construction.
    pub fn register(&mut self, source: &str) {
        let _ = self.entry_mut(source);
    }

    pub fn add_records(&mut self, source: &str, n: usize) {
        self.entry_mut(source).records += n;
    }

    pub fn add_errors(&mut self, source: &str, n: usize) {
        self.entry_mut(source).errors += n;
    }

    pub fn add_elapsed(&mut self, source: &str, elapsed: Duration) {
        self.entry_mut(source).elapsed += elapsed;
    }

    pub fn record_checkpoint_failure(&mut self) {
        self.checkpoint_failures += 1;
    }

    pub fn set_total_elapsed(&mut self, elapsed: Duration) {
        self.total_elapsed = elapsed;
    }

    pub fn source(&self, name: &str) -> Option<&SourceMetrics> {
        self.sources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &SourceMetrics)> {
        self.sources.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|(_, m)| m.records).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.sources.iter().map(|(_, m)| m.errors).sum()
    }

    pub fn checkpoint_failures(&self) -> usize {
        self.checkpoint_failures
    }

    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    /// `1 - errors/(records+errors)`, guarding against division by zero.
    pub fn success_rate(&self) -> f64 {
        let records = self.total_records();
        let errors = self.total_errors();
        if records + errors == 0 {
            return 1.0;
        }
        1.0 - errors as f64 / (records + errors) as f64
    }

    /// Deterministic plain-text run report: same counters, same text.
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str("SOURCE METRICS\n");
        for (name, m) in &self.sources {
            out.push_str(&format!(
                "  {:<15} {:>7} records | {:>4} errors | {:>9.2}s\n",
                name,
                m.records,
                m.errors,
                m.elapsed.as_secs_f64()
            ));
        }
        out.push_str("OVERALL\n");
        out.push_str(&format!("  total records:       {}\n", self.total_records()));
        out.push_str(&format!("  total errors:        {}\n", self.total_errors()));
        out.push_str(&format!(
            "  checkpoint failures: {}\n",
            self.checkpoint_failures
        ));
        out.push_str(&format!(
            "  total time:          {:.2}s\n",
            self.total_elapsed.as_secs_f64()
        ));
        out.push_str(&format!(
            "  success rate:        {:.2}%\n",
            self.success_rate() * 100.0
        ));
        out
    }
}

/// Summary statistics over the final ranked sample set, reported alongside
/// the source metrics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DatasetStats {
    pub samples: usize,
    pub abstract_samples: usize,
    pub paragraph_samples: usize,
    pub mean_tokens: f64,
    pub min_tokens: usize,
    pub max_tokens: usize,
}

impl DatasetStats {
    pub fn compute(samples: &[Sample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut stats = Self {
            samples: samples.len(),
            min_tokens: usize::MAX,
            ..Default::default()
        };
        let mut total_tokens = 0usize;
        for sample in samples {
            match sample.section {
                SampleSection::Abstract => stats.abstract_samples += 1,
                SampleSection::Paragraph => stats.paragraph_samples += 1,
            }
            let tokens = sample.text.split_whitespace().count();
            total_tokens += tokens;
            stats.min_tokens = stats.min_tokens.min(tokens);
            stats.max_tokens = stats.max_tokens.max(tokens);
        }
        stats.mean_tokens = total_tokens as f64 / samples.len() as f64;
        stats
    }

    pub fn report(&self) -> String {
        format!(
            "DATASET\n  samples:             {} ({} abstract, {} paragraph)\n  tokens per sample:   mean {:.1}, min {}, max {}\n",
            self.samples,
            self.abstract_samples,
            self.paragraph_samples,
            self.mean_tokens,
            self.min_tokens,
            self.max_tokens
        )
    }
}
