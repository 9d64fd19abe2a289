//! Entropy-based content scoring and ranking
//!
//! Scores text by the Shannon entropy of its token frequency distribution,
//! a cheap proxy for informational density: repetitive or boilerplate text
//! scores low, varied prose scores high.

use rustc_hash::FxHashMap;

use crate::cancel::CancelToken;
use crate::record::Sample;

/// Threshold for keeping samples in the final ranked corpus.
pub const DEFAULT_RANK_THRESHOLD: f64 = 3.5;

/// Threshold for per-sample content-quality filtering during processing.
pub const DEFAULT_CONTENT_THRESHOLD: f64 = 3.0;

/// Samples scored between cancellation checks during ranking.
const RANK_CHUNK: usize = 1024;

pub type TokenizerFn = fn(&str) -> Vec<String>;

/// Default tokenizer: whitespace split. Locale-independent.
pub fn whitespace_tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
}

/// Scores and filters samples by token-distribution entropy.
pub struct EntropyRanker {
    threshold: f64,
    tokenizer: TokenizerFn,
}

impl EntropyRanker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            tokenizer: whitespace_tokens,
        }
    }

    pub fn with_tokenizer(threshold: f64, tokenizer: TokenizerFn) -> Self {
        Self {
            threshold,
            tokenizer,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Shannon entropy `-Σ p·log2(p)` over the token frequency distribution.
    /// An empty token list scores 0.0.
    pub fn shannon_entropy(tokens: &[String]) -> f64 {
        if tokens.is_empty() {
            return 0.0;
        }
        let mut freq: FxHashMap<&str, usize> = FxHashMap::default();
        for token in tokens {
            *freq.entry(token.as_str()).or_insert(0) += 1;
        }
        let total = tokens.len() as f64;
        let mut entropy = 0.0;
        for &count in freq.values() {
            let p = count as f64 / total;
            entropy -= p * p.log2();
        }
        entropy
    }

    /// Tokenize and score. Pure: identical text and tokenizer always yield
    /// an identical score.
    pub fn score(&self, text: &str) -> f64 {
        Self::shannon_entropy(&(self.tokenizer)(text))
    }

    /// Whether the text meets the entropy threshold.
    pub fn is_explanatory(&self, text: &str) -> bool {
        self.score(text) >= self.threshold
    }

    /// Keep only explanatory samples, preserving input order.
    pub fn filter(&self, samples: Vec<Sample>) -> Vec<Sample> {
        samples
            .into_iter()
            .filter(|s| self.is_explanatory(&s.text))
            .collect()
    }

    /// Score all samples, sort descending by score (stable: ties keep input
    /// order), drop sub-threshold samples, truncate to `top_k` if given.
    ///
    /// The cancellation token is checked between scoring chunks; on
    /// cancellation, samples scored so far are still ranked and returned.
    pub fn rank(&self, samples: &[Sample], top_k: Option<usize>, token: &CancelToken) -> Vec<Sample> {
        let mut scored: Vec<(f64, &Sample)> = Vec::with_capacity(samples.len());
        for chunk in samples.chunks(RANK_CHUNK) {
            if token.is_cancelled() {
                log::warn!(
                    "ranking cancelled after {} of {} samples",
                    scored.len(),
                    samples.len()
                );
                break;
            }
            for sample in chunk {
                scored.push((self.score(&sample.text), sample));
            }
        }

        // Entropy is always finite, so partial_cmp never sees NaN
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let ranked = scored
            .into_iter()
            .filter(|(score, _)| *score >= self.threshold)
            .map(|(_, sample)| sample.clone());
        match top_k {
            Some(k) => ranked.take(k).collect(),
            None => ranked.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DomainTag, RoutingTag, SampleSection, SectionTag};

    fn sample(text: &str) -> Sample {
        Sample {
            title: "t".into(),
            section: SampleSection::Paragraph,
            domain_tag: DomainTag::Unknown,
            section_tag: SectionTag::Unknown,
            routing_tag: RoutingTag::General,
            task_tag: None,
            text: text.into(),
        }
    }

    #[test]
    fn empty_text_scores_zero() {
        let ranker = EntropyRanker::new(DEFAULT_RANK_THRESHOLD);
        assert_eq!(ranker.score(""), 0.0);
        assert_eq!(ranker.score("   \t\n "), 0.0);
    }

    #[test]
    fn repeated_token_scores_zero() {
        // 50 repetitions of one token: p = 1, -1·log2(1) = 0
        let ranker = EntropyRanker::new(0.5);
        let text = vec!["spam"; 50].join(" ");
        assert_eq!(ranker.score(&text), 0.0);
        assert!(!ranker.is_explanatory(&text));
    }

    #[test]
    fn uniform_distribution_scores_log2_n() {
        let ranker = EntropyRanker::new(DEFAULT_RANK_THRESHOLD);
        // 16 distinct tokens, each once → entropy = log2(16) = 4
        let text = (0..16).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        assert!((ranker.score(&text) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn score_is_deterministic() {
        let ranker = EntropyRanker::new(DEFAULT_RANK_THRESHOLD);
        let text = "the quick brown fox jumps over the lazy dog";
        let a = ranker.score(text);
        let b = ranker.score(text);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn custom_tokenizer_changes_score() {
        fn char_tokens(text: &str) -> Vec<String> {
            text.chars().map(|c| c.to_string()).collect()
        }
        let words = EntropyRanker::new(0.0);
        let chars = EntropyRanker::with_tokenizer(0.0, char_tokens);
        let text = "ab ab";
        assert_eq!(words.score(text), 0.0); // one distinct token
        assert!(chars.score(text) > 0.0); // 'a', 'b', ' '
    }

    #[test]
    fn filter_preserves_order() {
        let ranker = EntropyRanker::new(1.0);
        let keep1 = sample("alpha beta gamma delta");
        let drop1 = sample("spam spam spam spam");
        let keep2 = sample("one two three four five");
        let out = ranker.filter(vec![keep1.clone(), drop1, keep2.clone()]);
        assert_eq!(out, vec![keep1, keep2]);
    }

    #[test]
    fn rank_sorts_descending_and_drops_subthreshold() {
        let ranker = EntropyRanker::new(1.0);
        let low = sample("a a a a b"); // low entropy
        let high = sample("v w x y z"); // log2(5)
        let zero = sample("spam spam spam"); // 0.0, dropped
        let out = ranker.rank(
            &[low.clone(), zero, high.clone()],
            None,
            &CancelToken::new(),
        );
        assert_eq!(out, vec![high, low]);
    }

    #[test]
    fn rank_ties_keep_input_order() {
        let ranker = EntropyRanker::new(0.5);
        // Same distribution shape → identical scores
        let first = sample("aa bb cc");
        let second = sample("dd ee ff");
        let out = ranker.rank(&[first.clone(), second.clone()], None, &CancelToken::new());
        assert_eq!(out, vec![first, second]);
    }

    #[test]
    fn rank_top_k_truncates() {
        let ranker = EntropyRanker::new(0.0);
        let samples: Vec<Sample> = (0..5)
            .map(|i| sample(&format!("alpha beta gamma{i} delta epsilon")))
            .collect();
        let out = ranker.rank(&samples, Some(2), &CancelToken::new());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn rank_cancelled_returns_empty_ranked_set() {
        let ranker = EntropyRanker::new(0.0);
        let token = CancelToken::new();
        token.cancel();
        let out = ranker.rank(&[sample("a b c")], None, &token);
        assert!(out.is_empty());
    }
}
