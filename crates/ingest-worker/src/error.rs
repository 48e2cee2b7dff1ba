//! Worker error types.

use ingest_resilience::IngestError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("yt-dlp binary not found: {0}")]
    YtDlpNotFound(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),
}

impl WorkerError {
    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }

    /// Check if the caller's backoff loop should try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Ingest(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Check if this is a permanent failure that should NOT be retried.
    ///
    /// The item itself is inaccessible (missing, private, age-restricted,
    /// region-blocked and so on); retrying or switching identity won't help.
    pub fn is_permanent_failure(&self) -> bool {
        match self {
            WorkerError::Ingest(e) if e.is_not_found() => return true,
            WorkerError::InvalidSource(_) => return true,
            _ => {}
        }

        // Exhaustion only names the error class; the last action message
        // carries the reason.
        let mut msg = self.to_string().to_lowercase();
        if let WorkerError::Ingest(IngestError::AllClientsExhausted {
            last_message: Some(last),
            ..
        }) = self
        {
            msg.push(' ');
            msg.push_str(&last.to_lowercase());
        }

        // Age restriction (requires login/cookies we don't have)
        if msg.contains("age") && (msg.contains("restrict") || msg.contains("verif")) {
            return true;
        }

        if msg.contains("private video") || msg.contains("video is private") {
            return true;
        }

        if msg.contains("video unavailable")
            || msg.contains("video is unavailable")
            || msg.contains("video not available")
        {
            return true;
        }

        if msg.contains("video has been removed") || msg.contains("video was deleted") {
            return true;
        }

        if msg.contains("copyright") && msg.contains("block") {
            return true;
        }

        if msg.contains("not available in your country") || msg.contains("blocked in your country")
        {
            return true;
        }

        // Premieres (not yet available)
        if msg.contains("premiere") && msg.contains("will begin") {
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_models::ErrorClass;
    use std::time::Duration;

    fn exhausted(class: ErrorClass, message: &str) -> WorkerError {
        WorkerError::Ingest(IngestError::AllClientsExhausted {
            last_error_class: Some(class),
            last_message: Some(message.to_string()),
            attempts: Vec::new(),
            elapsed: Duration::ZERO,
        })
    }

    #[test]
    fn test_not_found_is_permanent() {
        let err = WorkerError::from(IngestError::NotFound {
            status_code: Some(404),
            message: "HTTP Error 404".into(),
        });
        assert!(err.is_permanent_failure());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_permanent_message_patterns() {
        let err = WorkerError::from(IngestError::NotFound {
            status_code: None,
            message: "Private video. Sign in if you've been granted access".into(),
        });
        assert!(err.is_permanent_failure());

        let err = exhausted(
            ErrorClass::Unknown,
            "ERROR: [youtube] abc: This video is not available in your country",
        );
        assert!(err.is_permanent_failure());
        assert!(!err.is_retryable());

        let err = exhausted(ErrorClass::Auth, "Sign in to verify your age");
        assert!(err.is_permanent_failure());
    }

    #[test]
    fn test_exhausted_network_is_retryable_not_permanent() {
        let err = exhausted(ErrorClass::Network, "Connection reset by peer");
        assert!(err.is_retryable());
        assert!(!err.is_permanent_failure());

        let err = exhausted(ErrorClass::Throttle, "HTTP Error 429");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_circuit_open_is_neither() {
        let err = WorkerError::from(IngestError::CircuitOpen {
            resource: "download".into(),
        });
        assert!(!err.is_retryable());
        assert!(!err.is_permanent_failure());
    }
}
