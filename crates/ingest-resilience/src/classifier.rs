//! Maps raw action failures to an [`ErrorClass`].
//!
//! Rules are evaluated in order and the first match wins. `token` is checked
//! before `auth` so a 403 mentioning a token invalidates credentials rather
//! than being treated as a generic bot wall.

use ingest_models::{ActionFailure, ErrorClass, TransportFailure};

const AUTH_MARKERS: &[&str] = &["sign in", "bot", "forbidden"];
const NOT_FOUND_MARKERS: &[&str] = &["unavailable", "private", "deleted"];
const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out"];
const NETWORK_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection aborted",
    "name or service not known",
    "temporary failure in name resolution",
    "failed to resolve",
    "no address associated with hostname",
    "nodename nor servname",
    "getaddrinfo",
    "network is unreachable",
    "dns error",
];

/// Classify a failure from its status code and message.
pub fn classify(status_code: Option<u16>, message: &str) -> ErrorClass {
    classify_with_transport(status_code, message, None)
}

/// Classify a failure reported by an action.
pub fn classify_failure(failure: &ActionFailure) -> ErrorClass {
    classify_with_transport(failure.status_code, &failure.message, failure.transport)
}

fn classify_with_transport(
    status_code: Option<u16>,
    message: &str,
    transport: Option<TransportFailure>,
) -> ErrorClass {
    let message = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if status_code == Some(403) {
        if message.contains("token") {
            return ErrorClass::Token;
        }
        if contains_any(AUTH_MARKERS) {
            return ErrorClass::Auth;
        }
    }

    if status_code == Some(429) || message.contains("too many requests") {
        return ErrorClass::Throttle;
    }

    // Narrower than a plain keyword match: a 5xx never classifies as
    // not_found, so "503 Service Unavailable" stays a failure the breaker
    // counts instead of a terminal success.
    let server_error = matches!(status_code, Some(500..=599));
    if status_code == Some(404) || (!server_error && contains_any(NOT_FOUND_MARKERS)) {
        return ErrorClass::NotFound;
    }

    if transport == Some(TransportFailure::Timeout) || contains_any(TIMEOUT_MARKERS) {
        return ErrorClass::Timeout;
    }

    let connection_level = matches!(
        transport,
        Some(
            TransportFailure::ConnectionRefused
                | TransportFailure::ConnectionReset
                | TransportFailure::Dns
        )
    );
    if connection_level || contains_any(NETWORK_MARKERS) {
        return ErrorClass::Network;
    }

    ErrorClass::Unknown
}
