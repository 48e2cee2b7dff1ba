//! Raw failure reported by an ingestion action.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Transport-level cause of a failure, when the action knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailure {
    /// A deadline was exceeded.
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    /// Name resolution failed.
    Dns,
}

/// What an action hands back when an attempt fails.
///
/// Only the error classifier inspects the contents.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ActionFailure {
    pub status_code: Option<u16>,
    pub message: String,
    #[serde(default)]
    pub transport: Option<TransportFailure>,
}

impl ActionFailure {
    /// Failure with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
            transport: None,
        }
    }

    /// Failure carrying an HTTP status.
    pub fn http(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            message: message.into(),
            transport: None,
        }
    }

    /// Deadline exceeded.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::transport(TransportFailure::Timeout, message)
    }

    pub fn transport(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
            transport: Some(kind),
        }
    }

    /// Map an I/O error, keeping the transport cause when it is recognisable.
    pub fn from_io(err: &io::Error) -> Self {
        let transport = match err.kind() {
            io::ErrorKind::TimedOut => Some(TransportFailure::Timeout),
            io::ErrorKind::ConnectionRefused => Some(TransportFailure::ConnectionRefused),
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                Some(TransportFailure::ConnectionReset)
            }
            _ => None,
        };
        Self {
            status_code: None,
            message: err.to_string(),
            transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_transport_kinds() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "deadline");
        assert_eq!(
            ActionFailure::from_io(&err).transport,
            Some(TransportFailure::Timeout)
        );

        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(
            ActionFailure::from_io(&err).transport,
            Some(TransportFailure::ConnectionRefused)
        );

        let err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let failure = ActionFailure::from_io(&err);
        assert_eq!(failure.transport, None);
        assert_eq!(failure.message, "no such file");
    }

    #[test]
    fn test_display_is_message() {
        let failure = ActionFailure::http(429, "Too Many Requests");
        assert_eq!(failure.to_string(), "Too Many Requests");
        assert_eq!(failure.status_code, Some(429));
    }
}
