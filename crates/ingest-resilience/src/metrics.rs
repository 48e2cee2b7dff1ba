//! Ingestion metrics collection.
//!
//! Provides standardized observability events for the resilience layer:
//! - Per-attempt outcomes by operation and client identity
//! - Circuit breaker state transitions
//! - Token cache hits, misses and invalidations
//!
//! Everything goes through the `metrics` facade; whichever recorder the
//! binary installs (Prometheus in the worker) collects it.

use ingest_models::{ErrorClass, OperationKind, TokenType};
use metrics::counter;
use tracing::debug;

use crate::circuit_breaker::CircuitState;

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Action attempts by operation, client, outcome and token presence.
    pub const ATTEMPTS_TOTAL: &str = "ingest_attempts_total";

    /// Circuit breaker transitions by resource.
    pub const BREAKER_TRANSITIONS_TOTAL: &str = "ingest_breaker_transitions_total";

    /// Token cache events by token type and outcome.
    pub const TOKEN_EVENTS_TOTAL: &str = "ingest_token_events_total";

    /// Token invalidations by token type and reason.
    pub const TOKEN_INVALIDATIONS_TOTAL: &str = "ingest_token_invalidations_total";

    /// Operations rejected by an open circuit.
    pub const CIRCUIT_REJECTIONS_TOTAL: &str = "ingest_circuit_rejections_total";
}

/// Outcome of a token lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenEvent {
    Hit,
    Miss,
    Invalidated,
}

impl TokenEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenEvent::Hit => "hit",
            TokenEvent::Miss => "miss",
            TokenEvent::Invalidated => "invalidated",
        }
    }
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record one action attempt. `error_class` is `None` on success.
pub fn record_attempt(
    operation: OperationKind,
    client: &str,
    error_class: Option<ErrorClass>,
    had_token: bool,
) {
    let outcome = error_class.map(|c| c.as_str()).unwrap_or("success");

    debug!(
        operation = %operation,
        client = %client,
        error_class = outcome,
        had_token = had_token,
        "Ingestion attempt finished"
    );

    counter!(
        names::ATTEMPTS_TOTAL,
        "operation" => operation.as_str(),
        "client" => client.to_string(),
        "outcome" => outcome,
        "had_token" => if had_token { "true" } else { "false" }
    )
    .increment(1);
}

/// Record a circuit breaker state change.
pub fn record_breaker_transition(resource: &str, from: CircuitState, to: CircuitState) {
    counter!(
        names::BREAKER_TRANSITIONS_TOTAL,
        "resource" => resource.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Record an operation rejected without any attempt.
pub fn record_circuit_rejection(resource: &str) {
    counter!(
        names::CIRCUIT_REJECTIONS_TOTAL,
        "resource" => resource.to_string()
    )
    .increment(1);
}

/// Record a token cache event.
pub fn record_token_event(token_type: TokenType, event: TokenEvent) {
    counter!(
        names::TOKEN_EVENTS_TOTAL,
        "token_type" => token_type.as_str(),
        "outcome" => event.as_str()
    )
    .increment(1);
}

/// Record a token invalidation and why it happened.
pub fn record_token_invalidation(token_type: TokenType, reason: &str) {
    record_token_event(token_type, TokenEvent::Invalidated);
    counter!(
        names::TOKEN_INVALIDATIONS_TOTAL,
        "token_type" => token_type.as_str(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
