//! Named circuit breakers guarding each logical operation type.
//!
//! The state machine is a pure function ([`transition`]) over
//! [`BreakerState`]; [`CircuitBreaker`] wraps one state behind its own mutex
//! and [`CircuitBreakerRegistry`] hands out breakers by resource name.
//! Breakers never share a lock with each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::metrics::record_breaker_transition;

// =============================================================================
// Configuration
// =============================================================================

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a trial call.
    pub cooldown_secs: u64,
    /// Trial successes required to close a half-open circuit.
    pub success_threshold: u32,
}

impl BreakerConfig {
    pub fn new(failure_threshold: u32, cooldown_secs: u64, success_threshold: u32) -> Self {
        Self {
            failure_threshold,
            cooldown_secs,
            success_threshold,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::new(5, 60, 2)
    }
}

// =============================================================================
// State Machine
// =============================================================================

/// Circuit breaker states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing fast.
    Open,
    /// Allowing trial calls to test recovery.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Full state of one breaker.
///
/// `state == Open` always has `opened_at` set.
#[derive(Clone, Debug, PartialEq)]
pub struct BreakerState {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    pub half_open_trial_successes: u32,
    /// Lifetime failure count, never reset.
    pub total_failures: u64,
}

impl BreakerState {
    pub fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_trial_successes: 0,
            total_failures: 0,
        }
    }

    fn opened(now: Instant, consecutive_failures: u32, total_failures: u64) -> Self {
        Self {
            state: CircuitState::Open,
            consecutive_failures,
            opened_at: Some(now),
            half_open_trial_successes: 0,
            total_failures,
        }
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::closed()
    }
}

/// Inputs to the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerEvent {
    /// A caller asks whether it may proceed.
    Probe,
    Success,
    Failure,
}

/// Compute the next state. Pure; `now` is supplied by the caller.
pub fn transition(
    current: &BreakerState,
    event: BreakerEvent,
    now: Instant,
    config: &BreakerConfig,
) -> BreakerState {
    let mut next = current.clone();
    match (current.state, event) {
        (CircuitState::Closed, BreakerEvent::Probe) => {}
        (CircuitState::Closed, BreakerEvent::Success) => {
            next.consecutive_failures = 0;
        }
        (CircuitState::Closed, BreakerEvent::Failure) => {
            next.total_failures += 1;
            next.consecutive_failures += 1;
            if next.consecutive_failures >= config.failure_threshold {
                next = BreakerState::opened(now, next.consecutive_failures, next.total_failures);
            }
        }

        (CircuitState::Open, BreakerEvent::Probe) => {
            let cooled_down = current
                .opened_at
                .map(|opened_at| now >= opened_at + config.cooldown())
                .unwrap_or(true);
            if cooled_down {
                next.state = CircuitState::HalfOpen;
                next.half_open_trial_successes = 0;
            }
        }
        // Late results from calls started before the circuit opened.
        (CircuitState::Open, BreakerEvent::Success) => {}
        (CircuitState::Open, BreakerEvent::Failure) => {
            next.total_failures += 1;
        }

        (CircuitState::HalfOpen, BreakerEvent::Probe) => {}
        (CircuitState::HalfOpen, BreakerEvent::Success) => {
            next.half_open_trial_successes += 1;
            if next.half_open_trial_successes >= config.success_threshold {
                next = BreakerState {
                    total_failures: current.total_failures,
                    ..BreakerState::closed()
                };
            }
        }
        (CircuitState::HalfOpen, BreakerEvent::Failure) => {
            next = BreakerState::opened(now, 0, current.total_failures + 1);
        }
    }
    next
}

// =============================================================================
// Circuit Breaker
// =============================================================================

/// Point-in-time view of a breaker, for monitoring.
#[derive(Clone, Debug, PartialEq)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    pub half_open_trial_successes: u32,
    pub total_failures: u64,
}

/// Circuit breaker for one named resource.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new closed circuit breaker.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::closed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Check if an operation is allowed.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open here and
    /// lets the call through.
    pub fn allow(&self) -> bool {
        let next = self.apply(BreakerEvent::Probe);
        next.state != CircuitState::Open
    }

    /// Record a successful operation.
    pub fn record_success(&self) {
        self.apply(BreakerEvent::Success);
    }

    /// Record a failed operation.
    pub fn record_failure(&self) {
        self.apply(BreakerEvent::Failure);
    }

    /// Get current state for monitoring.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock().clone();
        BreakerSnapshot {
            name: self.name.clone(),
            state: state.state,
            consecutive_failures: state.consecutive_failures,
            opened_at: state.opened_at,
            half_open_trial_successes: state.half_open_trial_successes,
            total_failures: state.total_failures,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, event: BreakerEvent) -> BreakerState {
        let (from, next) = {
            let mut state = self.lock();
            let from = state.state;
            let next = transition(&state, event, Instant::now(), &self.config);
            *state = next.clone();
            (from, next)
        };

        if from != next.state {
            self.log_transition(from, &next);
            record_breaker_transition(&self.name, from, next.state);
        }
        next
    }

    fn log_transition(&self, from: CircuitState, next: &BreakerState) {
        match next.state {
            CircuitState::Open => warn!(
                resource = %self.name,
                from_state = from.as_str(),
                consecutive_failures = next.consecutive_failures,
                cooldown_secs = self.config.cooldown_secs,
                "Circuit opened"
            ),
            _ => info!(
                resource = %self.name,
                from_state = from.as_str(),
                to_state = next.state.as_str(),
                "Circuit state changed"
            ),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Breakers keyed by resource name, created lazily from configuration.
///
/// The registry lock only guards the name-to-breaker map; each breaker's
/// state sits behind its own mutex.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    default_config: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            default_config,
            overrides: HashMap::new(),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Use a dedicated configuration for one resource.
    pub fn with_override(mut self, resource: impl Into<String>, config: BreakerConfig) -> Self {
        self.overrides.insert(resource.into(), config);
        self
    }

    /// Get the breaker for a resource, creating it on first use.
    pub fn breaker(&self, resource: &str) -> Arc<CircuitBreaker> {
        // Fast path: read lock only
        {
            let breakers = self.breakers.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(breaker) = breakers.get(resource) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        let config = self
            .overrides
            .get(resource)
            .unwrap_or(&self.default_config)
            .clone();
        Arc::clone(
            breakers
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(resource, config))),
        )
    }

    /// Snapshots of every breaker created so far, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<Arc<CircuitBreaker>> = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut snapshots: Vec<_> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
