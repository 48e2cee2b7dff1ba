//! Error types surfaced by the ingestion orchestrator.

use std::time::Duration;

use ingest_models::ErrorClass;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Per-identity attempt count, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAttempts {
    pub client: String,
    pub attempts: u32,
    pub last_error_class: Option<ErrorClass>,
}

/// Errors that end an ingestion operation.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The breaker for this resource is open; no attempt was made.
    #[error("Circuit open for resource '{resource}'")]
    CircuitOpen { resource: String },

    /// Every enabled client identity used up its local attempts.
    #[error(
        "All client identities exhausted after {} attempts (last error class: {})",
        total_attempts(.attempts),
        class_name(.last_error_class)
    )]
    AllClientsExhausted {
        last_error_class: Option<ErrorClass>,
        last_message: Option<String>,
        attempts: Vec<ClientAttempts>,
        elapsed: Duration,
    },

    /// The remote item does not exist or is not accessible.
    #[error("Not found: {message}")]
    NotFound {
        status_code: Option<u16>,
        message: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

fn total_attempts(attempts: &[ClientAttempts]) -> u32 {
    attempts.iter().map(|a| a.attempts).sum()
}

fn class_name(class: &Option<ErrorClass>) -> &'static str {
    class.map(|c| c.as_str()).unwrap_or("none")
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The last classified failure behind this error, if any.
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            IngestError::AllClientsExhausted {
                last_error_class, ..
            } => *last_error_class,
            IngestError::NotFound { .. } => Some(ErrorClass::NotFound),
            _ => None,
        }
    }

    /// Check if the caller's backoff loop should run the operation again.
    ///
    /// Only exhaustion on network or timeout failures qualifies; throttling
    /// is already spread across identities and a circuit-open condition must
    /// surface as-is.
    pub fn is_retryable(&self) -> bool {
        self.error_class()
            .map(|c| c.is_backoff_retryable())
            .unwrap_or(false)
            && matches!(self, IngestError::AllClientsExhausted { .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, IngestError::CircuitOpen { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, IngestError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exhausted(class: Option<ErrorClass>) -> IngestError {
        IngestError::AllClientsExhausted {
            last_error_class: class,
            last_message: None,
            attempts: vec![
                ClientAttempts {
                    client: "tv".into(),
                    attempts: 2,
                    last_error_class: class,
                },
                ClientAttempts {
                    client: "mweb".into(),
                    attempts: 1,
                    last_error_class: class,
                },
            ],
            elapsed: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_retryable_only_for_network_and_timeout_exhaustion() {
        assert!(exhausted(Some(ErrorClass::Network)).is_retryable());
        assert!(exhausted(Some(ErrorClass::Timeout)).is_retryable());
        assert!(!exhausted(Some(ErrorClass::Throttle)).is_retryable());
        assert!(!exhausted(None).is_retryable());
        assert!(!IngestError::CircuitOpen {
            resource: "download".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_exhausted_display() {
        let msg = exhausted(Some(ErrorClass::Throttle)).to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("throttle"));
        assert!(exhausted(None).to_string().contains("none"));
    }

    #[test]
    fn test_not_found_class() {
        let err = IngestError::NotFound {
            status_code: Some(404),
            message: "Video unavailable".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.error_class(), Some(ErrorClass::NotFound));
    }
}
