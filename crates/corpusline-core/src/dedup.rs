//! Cross-source identity set with first-seen-wins semantics

use rustc_hash::FxHashSet;

/// Global seen-identifier set shared across all sources for one run.
///
/// Admission order is the configured source order, so first-seen-wins is
/// deterministic given fixed per-source result order. Duplicates are not
/// errors; they are dropped silently (debug-logged only).
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: FxHashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert in one step: `true` means the key was admitted,
    /// `false` means it was already present and the caller should drop the
    /// record.
    pub fn admit(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            log::debug!("duplicate dropped: {key}");
            return false;
        }
        self.seen.insert(key.to_owned());
        true
    }

    /// Number of distinct identifiers admitted so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_admission_wins() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.admit("paper-1"));
        assert!(!dedup.admit("paper-1"));
        assert!(dedup.admit("paper-2"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn admitted_subset_has_no_repeats() {
        let mut dedup = Deduplicator::new();
        let keys = ["a", "b", "a", "c", "b", "a"];
        let admitted: Vec<&str> = keys.iter().copied().filter(|k| dedup.admit(k)).collect();
        assert_eq!(admitted, vec!["a", "b", "c"]);
    }

    #[test]
    fn refeeding_admits_nothing_new() {
        let mut dedup = Deduplicator::new();
        let keys = ["a", "b", "c"];
        for k in &keys {
            dedup.admit(k);
        }
        let readmitted = keys.iter().filter(|k| dedup.admit(k)).count();
        assert_eq!(readmitted, 0);
        assert_eq!(dedup.len(), 3);
    }

    #[test]
    fn empty_set() {
        let dedup = Deduplicator::new();
        assert!(dedup.is_empty());
        assert_eq!(dedup.len(), 0);
    }
}
