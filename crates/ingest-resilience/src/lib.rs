//! Resilience layer for media ingestion.
//!
//! This crate provides:
//! - Error classification of action failures
//! - Exponential backoff with full jitter for caller retry loops
//! - Named circuit breakers per operation type
//! - Token cache, token providers and the token manager
//! - Ordered client identity fallback
//! - The orchestrator that composes all of the above around an action

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod sequencer;
pub mod token_cache;
pub mod token_manager;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use circuit_breaker::{
    BreakerConfig, BreakerSnapshot, CircuitBreaker, CircuitBreakerRegistry, CircuitState,
};
pub use classifier::{classify, classify_failure};
pub use config::{RemoteProviderConfig, ResilienceConfig};
pub use error::{ClientAttempts, IngestError, IngestResult};
pub use orchestrator::IngestOrchestrator;
pub use providers::{RemoteTokenProvider, StaticTokenProvider, TokenProvider};
pub use sequencer::{ClientConfig, ClientSequencer};
pub use token_cache::{CacheLookup, Token, TokenCache};
pub use token_manager::{context_key, TokenConfig, TokenManager, GLOBAL_CONTEXT_KEY};

// Re-export for callers building actions and cancellation
pub use tokio_util::sync::CancellationToken;
