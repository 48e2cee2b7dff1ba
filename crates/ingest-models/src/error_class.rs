//! Failure classes surfaced to retry and circuit-breaking policy.
//!
//! Every raw failure coming back from the remote platform is mapped to
//! exactly one of these classes. Policy code only ever looks at the class,
//! never at the status code or message that produced it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Classified failure of a single remote attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Connection-level failure (refused, reset, DNS).
    Network,
    /// Rate limited by the platform.
    Throttle,
    /// Bot check or sign-in wall.
    Auth,
    /// A credential token was rejected.
    Token,
    /// The requested item does not exist or is not accessible.
    NotFound,
    /// Deadline exceeded.
    Timeout,
    /// Anything else.
    Unknown,
}

impl ErrorClass {
    /// Returns the class name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Network => "network",
            ErrorClass::Throttle => "throttle",
            ErrorClass::Auth => "auth",
            ErrorClass::Token => "token",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Unknown => "unknown",
        }
    }

    /// Transient classes are worth retrying with the same or another client.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorClass::Network | ErrorClass::Timeout | ErrorClass::Throttle
        )
    }

    /// Classes that indicate the credentials we sent were not accepted.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, ErrorClass::Auth | ErrorClass::Token)
    }

    /// Terminal classes end an operation immediately.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErrorClass::NotFound)
    }

    /// Classes the caller's backoff loop may retry whole operations for.
    pub fn is_backoff_retryable(&self) -> bool {
        matches!(self, ErrorClass::Network | ErrorClass::Timeout)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorClass {
    type Err = ErrorClassParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "network" => Ok(ErrorClass::Network),
            "throttle" | "rate_limited" => Ok(ErrorClass::Throttle),
            "auth" => Ok(ErrorClass::Auth),
            "token" => Ok(ErrorClass::Token),
            "not_found" | "notfound" => Ok(ErrorClass::NotFound),
            "timeout" => Ok(ErrorClass::Timeout),
            "unknown" => Ok(ErrorClass::Unknown),
            _ => Err(ErrorClassParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown error class: {0}")]
pub struct ErrorClassParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_class_round_trip_names() {
        for class in [
            ErrorClass::Network,
            ErrorClass::Throttle,
            ErrorClass::Auth,
            ErrorClass::Token,
            ErrorClass::NotFound,
            ErrorClass::Timeout,
            ErrorClass::Unknown,
        ] {
            assert_eq!(class.as_str().parse::<ErrorClass>().unwrap(), class);
        }
        assert!("bogus".parse::<ErrorClass>().is_err());
    }

    #[test]
    fn test_error_class_policy_groups() {
        assert!(ErrorClass::Throttle.is_transient());
        assert!(!ErrorClass::Throttle.is_backoff_retryable());
        assert!(ErrorClass::Network.is_backoff_retryable());
        assert!(ErrorClass::Token.is_credential_failure());
        assert!(ErrorClass::Auth.is_credential_failure());
        assert!(ErrorClass::NotFound.is_terminal());
        assert!(!ErrorClass::Unknown.is_transient());
    }

    #[test]
    fn test_error_class_serde() {
        let json = serde_json::to_string(&ErrorClass::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
