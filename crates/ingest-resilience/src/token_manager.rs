//! Single entry point for obtaining and invalidating credentials.
//!
//! Composes the [`TokenCache`] with an ordered list of [`TokenProvider`]s:
//! - Fast path: return a cached, valid token
//! - Slow path: ask providers in priority order and cache the first value
//! - No provider has one: return `None`, callers proceed unauthenticated

use std::sync::Arc;
use std::time::Duration;

use ingest_models::{TokenContext, TokenSet, TokenType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::metrics::{record_token_event, record_token_invalidation, TokenEvent};
use crate::providers::TokenProvider;
use crate::token_cache::{CacheLookup, Token, TokenCache};

/// Context key used when a token is not bound to any context.
pub const GLOBAL_CONTEXT_KEY: &str = "global";

/// Token lifetime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// TTL given to freshly obtained tokens (in seconds).
    pub ttl_secs: u64,
    /// Cooldown applied by `mark_invalid` (in seconds).
    pub cooldown_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 6 * 60 * 60,
            cooldown_secs: 300,
        }
    }
}

/// Deterministic cache key for a token context.
///
/// Same context, same key; no context (or an empty one) maps to
/// [`GLOBAL_CONTEXT_KEY`].
pub fn context_key(context: Option<&TokenContext>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => {
            let digest = Sha256::digest(ctx.canonical_json().as_bytes());
            format!("{:x}", digest)
        }
        _ => GLOBAL_CONTEXT_KEY.to_string(),
    }
}

/// Composes providers and the cache.
pub struct TokenManager {
    cache: TokenCache,
    providers: Vec<Arc<dyn TokenProvider>>,
    ttl: Duration,
    cooldown: Duration,
}

impl TokenManager {
    /// Create a manager. Providers are asked in the given order.
    pub fn new(providers: Vec<Arc<dyn TokenProvider>>, config: &TokenConfig) -> Self {
        Self {
            cache: TokenCache::new(),
            providers,
            ttl: Duration::from_secs(config.ttl_secs),
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Get a token value for `token_type` in `context`.
    pub async fn get_token(
        &self,
        token_type: TokenType,
        context: Option<&TokenContext>,
    ) -> Option<String> {
        let key = context_key(context);

        // A value under cooldown is known to be rejected; don't take it back
        // from a provider that simply hands out the same thing again.
        let rejected = match self.cache.lookup(token_type, &key) {
            CacheLookup::Hit(token) => {
                record_token_event(token_type, TokenEvent::Hit);
                return Some(token.value);
            }
            CacheLookup::CoolingDown(token) => Some(token.value),
            CacheLookup::Missing | CacheLookup::Expired(_) => None,
        };
        record_token_event(token_type, TokenEvent::Miss);

        for provider in &self.providers {
            if !provider.is_available() {
                debug!(provider = provider.name(), "Token provider unavailable, skipping");
                continue;
            }

            let Some(value) = provider.try_get(token_type, context).await else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            if rejected.as_deref() == Some(value.as_str()) {
                debug!(
                    provider = provider.name(),
                    token_type = %token_type,
                    "Provider returned a token still in cooldown, skipping"
                );
                continue;
            }

            self.cache
                .put(Token::new(token_type, value.clone(), key, self.ttl));
            debug!(
                provider = provider.name(),
                token_type = %token_type,
                "Cached new token"
            );
            return Some(value);
        }

        None
    }

    /// Fetch every requested token type; types without a token are left out.
    pub async fn get_tokens(
        &self,
        token_types: &[TokenType],
        context: Option<&TokenContext>,
    ) -> TokenSet {
        let mut tokens = TokenSet::new();
        for &token_type in token_types {
            if let Some(value) = self.get_token(token_type, context).await {
                tokens.insert(token_type, value);
            }
        }
        tokens
    }

    /// Put the token for `(token_type, context)` into cooldown.
    ///
    /// `reason` is for observability only.
    pub fn mark_invalid(&self, token_type: TokenType, context: Option<&TokenContext>, reason: &str) {
        let key = context_key(context);
        let marked = self.cache.invalidate(token_type, &key, self.cooldown);
        record_token_invalidation(token_type, reason);
        info!(
            token_type = %token_type,
            reason = reason,
            had_entry = marked,
            cooldown_secs = self.cooldown.as_secs(),
            "Token invalidated"
        );
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("providers", &self.provider_names())
            .field("ttl", &self.ttl)
            .field("cooldown", &self.cooldown)
            .field("cached", &self.cache.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StaticTokenProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts calls and returns a fresh value each time.
    struct CountingProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn try_get(&self, token_type: TokenType, _: Option<&TokenContext>) -> Option<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Some(format!("{}-{}", token_type, n))
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn config() -> TokenConfig {
        TokenConfig {
            ttl_secs: 600,
            cooldown_secs: 60,
        }
    }

    #[test]
    fn test_context_key_deterministic() {
        let a = TokenContext::new().with("video_id", "abc").with("client", "tv");
        let b = TokenContext::new().with("client", "tv").with("video_id", "abc");
        assert_eq!(context_key(Some(&a)), context_key(Some(&b)));
        assert_eq!(context_key(Some(&a)).len(), 64);

        let c = TokenContext::new().with("video_id", "xyz");
        assert_ne!(context_key(Some(&a)), context_key(Some(&c)));
    }

    #[test]
    fn test_context_key_sentinel() {
        assert_eq!(context_key(None), GLOBAL_CONTEXT_KEY);
        assert_eq!(context_key(Some(&TokenContext::new())), GLOBAL_CONTEXT_KEY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_token_caches_provider_value() {
        let counting = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
        });
        let manager = TokenManager::new(vec![counting.clone() as Arc<dyn TokenProvider>], &config());

        assert_eq!(manager.get_token(TokenType::Player, None).await.as_deref(), Some("player-1"));
        assert_eq!(manager.get_token(TokenType::Player, None).await.as_deref(), Some("player-1"));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(manager.get_token(TokenType::Player, None).await.as_deref(), Some("player-2"));
    }

    #[tokio::test]
    async fn test_get_token_respects_provider_order() {
        let manual: Arc<dyn TokenProvider> =
            Arc::new(StaticTokenProvider::new().with_token(TokenType::Gvs, "manual"));
        let counting: Arc<dyn TokenProvider> = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
        });
        let manager = TokenManager::new(vec![manual, counting], &config());

        assert_eq!(manager.get_token(TokenType::Gvs, None).await.as_deref(), Some("manual"));
        assert_eq!(manager.get_token(TokenType::Subs, None).await.as_deref(), Some("subs-1"));
    }

    #[tokio::test]
    async fn test_get_token_without_providers_is_none() {
        let manager = TokenManager::new(Vec::new(), &config());
        assert_eq!(manager.get_token(TokenType::Player, None).await, None);
        assert!(manager.get_tokens(&[TokenType::Player, TokenType::Gvs], None).await.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_provider_skipped() {
        let empty: Arc<dyn TokenProvider> = Arc::new(StaticTokenProvider::new());
        let manager = TokenManager::new(vec![empty], &config());
        assert_eq!(manager.get_token(TokenType::Player, None).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_invalid_refuses_same_value_during_cooldown() {
        let manual: Arc<dyn TokenProvider> =
            Arc::new(StaticTokenProvider::new().with_token(TokenType::Player, "stale"));
        let manager = TokenManager::new(vec![manual], &config());
        let ctx = TokenContext::new().with("video_id", "abc");

        assert_eq!(manager.get_token(TokenType::Player, Some(&ctx)).await.as_deref(), Some("stale"));
        manager.mark_invalid(TokenType::Player, Some(&ctx), "token");
        assert_eq!(manager.get_token(TokenType::Player, Some(&ctx)).await, None);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(manager.get_token(TokenType::Player, Some(&ctx)).await.as_deref(), Some("stale"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_invalid_accepts_fresh_value_during_cooldown() {
        let counting = Arc::new(CountingProvider {
            calls: AtomicU32::new(0),
        });
        let manager = TokenManager::new(vec![counting as Arc<dyn TokenProvider>], &config());

        assert_eq!(manager.get_token(TokenType::Gvs, None).await.as_deref(), Some("gvs-1"));
        manager.mark_invalid(TokenType::Gvs, None, "auth");
        assert!(manager.cache().get(TokenType::Gvs, GLOBAL_CONTEXT_KEY).is_none());
        assert_eq!(manager.get_token(TokenType::Gvs, None).await.as_deref(), Some("gvs-2"));
    }

    #[tokio::test]
    async fn test_get_tokens_collects_available_types() {
        let manual: Arc<dyn TokenProvider> =
            Arc::new(StaticTokenProvider::new().with_token(TokenType::Player, "p"));
        let manager = TokenManager::new(vec![manual], &config());
        let tokens = manager
            .get_tokens(&[TokenType::Player, TokenType::Gvs], None)
            .await;
        assert_eq!(tokens.get(TokenType::Player), Some("p"));
        assert!(!tokens.contains(TokenType::Gvs));
    }
}
