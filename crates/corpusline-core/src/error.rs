//! Error taxonomy for source fetching and pipeline configuration

/// Failure from a single source fetch, classified at the source boundary.
///
/// `Transient` covers network/timeout conditions worth retrying.
/// `Malformed` means the whole response was unusable (individually bad
/// entries are skipped and counted by the fetcher, never surfaced here).
/// `Config` is a fatal misconfiguration for that source.
#[derive(Debug)]
pub enum SourceError {
    Transient(String),
    Malformed(String),
    Config(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
            Self::Config(msg) => write!(f, "source configuration: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Outcome of a retried operation that did not succeed.
#[derive(Debug)]
pub enum RetryError {
    /// All attempts failed with retryable errors; carries the last one.
    Exhausted(SourceError),
    /// A non-retryable error ended the attempt loop immediately.
    Fatal(SourceError),
    /// The cancellation token was set before an attempt started.
    Cancelled,
}

impl std::fmt::Display for RetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted(e) => write!(f, "retries exhausted, last error: {e}"),
            Self::Fatal(e) => write!(f, "{e}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for RetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Exhausted(e) | Self::Fatal(e) => Some(e),
            Self::Cancelled => None,
        }
    }
}

/// Invalid [`CorpusConfig`](crate::CorpusConfig) — fails the run before any
/// source is touched.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_retryable() {
        assert!(SourceError::Transient("timeout".into()).is_retryable());
    }

    #[test]
    fn malformed_not_retryable() {
        assert!(!SourceError::Malformed("bad payload".into()).is_retryable());
    }

    #[test]
    fn config_not_retryable() {
        assert!(!SourceError::Config("missing path".into()).is_retryable());
    }

    #[test]
    fn retry_error_display() {
        let err = RetryError::Exhausted(SourceError::Transient("timeout".into()));
        assert!(format!("{err}").contains("exhausted"));
        assert!(format!("{}", RetryError::Cancelled).contains("cancelled"));
    }

    #[test]
    fn retry_error_source_chain() {
        use std::error::Error;
        let err = RetryError::Fatal(SourceError::Config("bad".into()));
        assert!(err.source().is_some());
        assert!(RetryError::Cancelled.source().is_none());
    }
}
