//! Ingestion operation orchestrator.
//!
//! Runs a caller-supplied action under the resource's circuit breaker,
//! walking the client identities in priority order with a small local
//! attempt budget per identity. Tokens are fetched per identity and
//! invalidated on credential failures. A `not_found` outcome ends the call
//! immediately and is not held against the breaker.
//!
//! Backoff between whole `execute` calls belongs to the caller; one call
//! here never sleeps longer than `tries_per_client - 1` fixed pauses per
//! identity.

use std::future::Future;
use std::sync::Arc;

use ingest_models::{
    ActionFailure, ClientIdentity, ErrorClass, OperationKind, OperationSpec, TokenSet, TokenType,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry};
use crate::classifier::classify_failure;
use crate::config::ResilienceConfig;
use crate::error::{ClientAttempts, IngestError, IngestResult};
use crate::metrics::{record_attempt, record_circuit_rejection};
use crate::sequencer::ClientSequencer;
use crate::token_manager::TokenManager;

/// Attempt bookkeeping for one `execute` call.
struct AttemptTrail {
    started: Instant,
    attempt_number: u32,
    per_client: Vec<ClientAttempts>,
    last_error_class: Option<ErrorClass>,
    last_message: Option<String>,
}

impl AttemptTrail {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            attempt_number: 0,
            per_client: Vec::new(),
            last_error_class: None,
            last_message: None,
        }
    }

    fn begin_client(&mut self, identity: &ClientIdentity) {
        self.per_client.push(ClientAttempts {
            client: identity.name.clone(),
            attempts: 0,
            last_error_class: None,
        });
    }

    fn begin_attempt(&mut self) -> u32 {
        self.attempt_number += 1;
        if let Some(current) = self.per_client.last_mut() {
            current.attempts += 1;
        }
        self.attempt_number
    }

    fn record_failure(&mut self, class: ErrorClass, failure: &ActionFailure) {
        self.last_error_class = Some(class);
        self.last_message = Some(failure.message.clone());
        if let Some(current) = self.per_client.last_mut() {
            current.last_error_class = Some(class);
        }
    }

    fn into_exhausted(self) -> IngestError {
        IngestError::AllClientsExhausted {
            last_error_class: self.last_error_class,
            last_message: self.last_message,
            attempts: self.per_client,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Entry point for running one ingestion operation.
#[derive(Debug, Clone)]
pub struct IngestOrchestrator {
    breakers: Arc<CircuitBreakerRegistry>,
    tokens: Arc<TokenManager>,
    sequencer: Arc<ClientSequencer>,
}

impl IngestOrchestrator {
    pub fn new(
        breakers: Arc<CircuitBreakerRegistry>,
        tokens: Arc<TokenManager>,
        sequencer: Arc<ClientSequencer>,
    ) -> Self {
        Self {
            breakers,
            tokens,
            sequencer,
        }
    }

    /// Validate configuration and build every collaborator from it.
    pub fn from_config(config: &ResilienceConfig) -> IngestResult<Self> {
        config.validate()?;
        Ok(Self::new(
            Arc::new(config.build_breakers()),
            Arc::new(config.build_token_manager()?),
            Arc::new(config.build_sequencer()),
        ))
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn sequencer(&self) -> &ClientSequencer {
        &self.sequencer
    }

    /// Run `action` without external cancellation.
    pub async fn execute<P, F, Fut>(&self, operation: &OperationSpec, action: F) -> IngestResult<P>
    where
        F: FnMut(ClientIdentity, TokenSet) -> Fut,
        Fut: Future<Output = Result<P, ActionFailure>>,
    {
        self.execute_with_cancel(operation, &CancellationToken::new(), action)
            .await
    }

    /// Run `action` until it succeeds, hits a terminal failure, or every
    /// identity is exhausted.
    ///
    /// `cancel` is checked before each identity and each attempt, and wakes
    /// the pause between attempts. An action already running is awaited to
    /// completion; actions that want to stop early should watch the token
    /// themselves.
    pub async fn execute_with_cancel<P, F, Fut>(
        &self,
        operation: &OperationSpec,
        cancel: &CancellationToken,
        action: F,
    ) -> IngestResult<P>
    where
        F: FnMut(ClientIdentity, TokenSet) -> Fut,
        Fut: Future<Output = Result<P, ActionFailure>>,
    {
        let span = info_span!(
            "ingest",
            call_id = %Uuid::new_v4(),
            operation = %operation.kind,
            resource = %operation.resource_name,
        );
        self.run(operation, cancel, action).instrument(span).await
    }

    async fn run<P, F, Fut>(
        &self,
        operation: &OperationSpec,
        cancel: &CancellationToken,
        mut action: F,
    ) -> IngestResult<P>
    where
        F: FnMut(ClientIdentity, TokenSet) -> Fut,
        Fut: Future<Output = Result<P, ActionFailure>>,
    {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let breaker = self.breakers.breaker(&operation.resource_name);
        if !breaker.allow() {
            record_circuit_rejection(&operation.resource_name);
            warn!("Circuit open, failing fast");
            return Err(IngestError::CircuitOpen {
                resource: operation.resource_name.clone(),
            });
        }

        let mut trail = AttemptTrail::new();
        let context = operation.context.as_ref();

        for identity in self.sequencer.sequence() {
            if cancel.is_cancelled() {
                return Err(IngestError::Cancelled);
            }

            trail.begin_client(identity);
            let tokens = self
                .tokens
                .get_tokens(&operation.required_token_types, context)
                .await;
            let had_token = !tokens.is_empty();
            let tries = self.sequencer.tries_for(identity);

            for local_attempt in 1..=tries {
                if local_attempt > 1 {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(IngestError::Cancelled),
                        _ = tokio::time::sleep(self.sequencer.sleep_between_tries()) => {}
                    }
                }
                if cancel.is_cancelled() {
                    return Err(IngestError::Cancelled);
                }

                let attempt = trail.begin_attempt();
                debug!(
                    client = %identity.name,
                    attempt = attempt,
                    local_attempt = local_attempt,
                    had_token = had_token,
                    "Starting attempt"
                );

                let failure = match action(identity.clone(), tokens.clone()).await {
                    Ok(payload) => {
                        breaker.record_success();
                        record_attempt(operation.kind, &identity.name, None, had_token);
                        info!(
                            client = %identity.name,
                            attempt = attempt,
                            elapsed_ms = trail.started.elapsed().as_millis() as u64,
                            "Operation succeeded"
                        );
                        return Ok(payload);
                    }
                    Err(failure) => failure,
                };

                let class = classify_failure(&failure);
                record_attempt(operation.kind, &identity.name, Some(class), had_token);
                warn!(
                    client = %identity.name,
                    attempt = attempt,
                    error_class = %class,
                    transient = class.is_transient(),
                    status_code = failure.status_code,
                    "Attempt failed: {}",
                    failure.message
                );

                if class.is_credential_failure() {
                    self.invalidate_tokens(operation, class);
                }

                if class.is_terminal() {
                    // The service answered; the item just isn't there.
                    breaker.record_success();
                    return Err(IngestError::NotFound {
                        status_code: failure.status_code,
                        message: failure.message,
                    });
                }

                breaker.record_failure();
                trail.record_failure(class, &failure);
            }
        }

        self.exhausted(&breaker, trail)
    }

    fn invalidate_tokens(&self, operation: &OperationSpec, class: ErrorClass) {
        for token_type in invalidation_scope(operation) {
            self.tokens
                .mark_invalid(token_type, operation.context.as_ref(), class.as_str());
        }
    }

    fn exhausted<P>(&self, breaker: &CircuitBreaker, trail: AttemptTrail) -> IngestResult<P> {
        warn!(
            attempts = trail.attempt_number,
            clients = trail.per_client.len(),
            last_error_class = trail.last_error_class.map(|c| c.as_str()).unwrap_or("none"),
            breaker_state = breaker.state().as_str(),
            "All client identities exhausted"
        );
        Err(trail.into_exhausted())
    }
}

/// Token types a credential failure of `operation` invalidates.
///
/// PLAYER and GVS whenever required; SUBS only for caption fetches.
fn invalidation_scope(operation: &OperationSpec) -> Vec<TokenType> {
    TokenType::ALL
        .iter()
        .copied()
        .filter(|token_type| operation.requires(*token_type))
        .filter(|token_type| match token_type {
            TokenType::Player | TokenType::Gvs => true,
            TokenType::Subs => operation.kind == OperationKind::Captions,
        })
        .collect()
}
