//! Token-issuing HTTP service provider.
//!
//! `GET <endpoint>?type=<token type>&context=<canonical json>` answered with
//! `{"token": "..."}` or `{"error": "..."}`. Every failure (transport, status,
//! body, timeout) becomes `None`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ingest_models::{TokenContext, TokenType};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::TokenProvider;
use crate::error::{IngestError, IngestResult};

/// Consecutive failures before the provider stops being asked for a while.
const FAILURES_BEFORE_PAUSE: u32 = 3;

/// How long the provider is skipped after repeated failures.
const PAUSE_DURATION: Duration = Duration::from_secs(30);

/// Response body of the token service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteTokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Provider backed by a remote token-issuing endpoint.
#[derive(Debug)]
pub struct RemoteTokenProvider {
    http: reqwest::Client,
    endpoint: Url,
    consecutive_failures: AtomicU32,
    paused_until: Mutex<Option<Instant>>,
}

impl RemoteTokenProvider {
    /// Create a provider with a bounded per-request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> IngestResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| IngestError::config(format!("invalid token service URL: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| IngestError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            consecutive_failures: AtomicU32::new(0),
            paused_until: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn fetch(&self, token_type: TokenType, context: Option<&TokenContext>) -> Result<String, String> {
        let context_json = context.map(TokenContext::canonical_json).unwrap_or_default();

        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("type", token_type.as_str()), ("context", context_json.as_str())])
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("token service returned {}", status));
        }

        let body: RemoteTokenResponse = response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {}", e))?;

        match (body.token, body.error) {
            (Some(token), _) if !token.trim().is_empty() => Ok(token),
            (_, Some(error)) => Err(format!("token service error: {}", error)),
            _ => Err("token service returned no token".to_string()),
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= FAILURES_BEFORE_PAUSE {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            *self.paused_until.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(Instant::now() + PAUSE_DURATION);
            warn!(
                endpoint = %self.endpoint,
                pause_secs = PAUSE_DURATION.as_secs(),
                "Token service failing repeatedly, pausing requests"
            );
        }
    }
}

#[async_trait]
impl TokenProvider for RemoteTokenProvider {
    fn name(&self) -> &str {
        "remote"
    }

    async fn try_get(
        &self,
        token_type: TokenType,
        context: Option<&TokenContext>,
    ) -> Option<String> {
        match self.fetch(token_type, context).await {
            Ok(token) => {
                self.record_success();
                debug!(token_type = %token_type, "Obtained token from token service");
                Some(token)
            }
            Err(reason) => {
                self.record_failure();
                warn!(
                    token_type = %token_type,
                    endpoint = %self.endpoint,
                    "Token service unavailable: {}",
                    reason
                );
                None
            }
        }
    }

    fn is_available(&self) -> bool {
        let paused_until = *self.paused_until.lock().unwrap_or_else(PoisonError::into_inner);
        paused_until.map(|until| Instant::now() >= until).unwrap_or(true)
    }
}
