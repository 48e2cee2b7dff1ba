//! Resilience layer configuration.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ingest_models::{ClientIdentity, TokenType};
use serde::{Deserialize, Serialize};

use crate::backoff::{BackoffConfig, BackoffPolicy};
use crate::circuit_breaker::{BreakerConfig, CircuitBreakerRegistry};
use crate::error::{IngestError, IngestResult};
use crate::providers::{RemoteTokenProvider, StaticTokenProvider, TokenProvider};
use crate::sequencer::{ClientConfig, ClientSequencer, DEFAULT_CLIENTS};
use crate::token_manager::{TokenConfig, TokenManager};

/// Remote token service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProviderConfig {
    pub url: String,
    /// Per-request timeout (in seconds).
    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_remote_timeout_secs() -> u64 {
    10
}

impl RemoteProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Everything the orchestrator and its collaborators are built from.
///
/// `Debug` lists which static tokens are set, never their values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Breaker settings for specific resource names.
    #[serde(default)]
    pub breaker_overrides: HashMap<String, BreakerConfig>,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub clients: ClientConfig,
    #[serde(default)]
    pub remote_provider: Option<RemoteProviderConfig>,
    /// Operator-supplied token values.
    #[serde(default)]
    pub static_tokens: BTreeMap<TokenType, String>,
}

impl fmt::Debug for ResilienceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceConfig")
            .field("breaker", &self.breaker)
            .field("breaker_overrides", &self.breaker_overrides)
            .field("backoff", &self.backoff)
            .field("tokens", &self.tokens)
            .field("clients", &self.clients)
            .field("remote_provider", &self.remote_provider)
            .field("static_tokens", &self.static_tokens.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ResilienceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> IngestResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    ///
    /// Unparseable numbers fall back to defaults; a malformed
    /// `INGEST_CLIENTS_JSON` is an error.
    pub fn from_lookup<F>(lookup: F) -> IngestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_u64 = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };
        let parse_u32 = |key: &str, default: u32| {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        };

        let defaults = Self::default();

        let breaker = BreakerConfig {
            failure_threshold: parse_u32(
                "INGEST_BREAKER_THRESHOLD",
                defaults.breaker.failure_threshold,
            ),
            cooldown_secs: parse_u64(
                "INGEST_BREAKER_COOLDOWN_SECS",
                defaults.breaker.cooldown_secs,
            ),
            success_threshold: parse_u32(
                "INGEST_BREAKER_SUCCESS_THRESHOLD",
                defaults.breaker.success_threshold,
            ),
        };

        let backoff = BackoffConfig {
            base_delay_ms: parse_u64("INGEST_BACKOFF_BASE_MS", defaults.backoff.base_delay_ms),
            max_delay_ms: parse_u64("INGEST_BACKOFF_MAX_MS", defaults.backoff.max_delay_ms),
            jitter: lookup("INGEST_BACKOFF_JITTER")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.backoff.jitter),
        };

        let tokens = TokenConfig {
            ttl_secs: parse_u64("INGEST_TOKEN_TTL_SECS", defaults.tokens.ttl_secs),
            cooldown_secs: parse_u64("INGEST_TOKEN_COOLDOWN_SECS", defaults.tokens.cooldown_secs),
        };

        let identities = match lookup("INGEST_CLIENTS_JSON").filter(|s| !s.trim().is_empty()) {
            Some(json) => serde_json::from_str::<Vec<ClientIdentity>>(&json).map_err(|e| {
                IngestError::config(format!("INGEST_CLIENTS_JSON is not valid: {}", e))
            })?,
            None => identities_from_names(
                lookup("INGEST_CLIENTS").as_deref(),
                lookup("INGEST_CLIENTS_DISABLED").as_deref(),
            ),
        };

        let clients = ClientConfig {
            identities,
            tries_per_client: parse_u32(
                "INGEST_TRIES_PER_CLIENT",
                defaults.clients.tries_per_client,
            ),
            sleep_between_tries_ms: parse_u64(
                "INGEST_SLEEP_BETWEEN_TRIES_MS",
                defaults.clients.sleep_between_tries_ms,
            ),
        };

        let remote_provider = lookup("INGEST_TOKEN_SERVICE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .map(|url| RemoteProviderConfig {
                url,
                timeout_secs: parse_u64(
                    "INGEST_TOKEN_SERVICE_TIMEOUT_SECS",
                    default_remote_timeout_secs(),
                ),
            });

        let mut static_tokens = BTreeMap::new();
        for (token_type, key) in [
            (TokenType::Player, "INGEST_STATIC_PLAYER_TOKEN"),
            (TokenType::Gvs, "INGEST_STATIC_GVS_TOKEN"),
            (TokenType::Subs, "INGEST_STATIC_SUBS_TOKEN"),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                static_tokens.insert(token_type, value);
            }
        }

        Ok(Self {
            breaker,
            breaker_overrides: HashMap::new(),
            backoff,
            tokens,
            clients,
            remote_provider,
            static_tokens,
        })
    }

    /// Reject settings the components cannot work with.
    pub fn validate(&self) -> IngestResult<()> {
        for (name, breaker) in std::iter::once(("default", &self.breaker))
            .chain(self.breaker_overrides.iter().map(|(k, v)| (k.as_str(), v)))
        {
            if breaker.failure_threshold == 0 {
                return Err(IngestError::config(format!(
                    "breaker '{}': failure_threshold must be at least 1",
                    name
                )));
            }
            if breaker.success_threshold == 0 {
                return Err(IngestError::config(format!(
                    "breaker '{}': success_threshold must be at least 1",
                    name
                )));
            }
        }

        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            return Err(IngestError::config(format!(
                "backoff base delay ({}ms) exceeds max delay ({}ms)",
                self.backoff.base_delay_ms, self.backoff.max_delay_ms
            )));
        }

        if self.tokens.ttl_secs == 0 {
            return Err(IngestError::config("token TTL must be positive"));
        }

        if self.clients.tries_per_client == 0 {
            return Err(IngestError::config("tries_per_client must be at least 1"));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self
            .clients
            .identities
            .iter()
            .find(|identity| !seen.insert(identity.name.as_str()))
        {
            return Err(IngestError::config(format!(
                "client identity '{}' is configured more than once",
                duplicate.name
            )));
        }

        if !self.clients.identities.iter().any(|i| i.enabled) {
            return Err(IngestError::config("no enabled client identities configured"));
        }

        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::from(&self.backoff)
    }

    pub fn build_breakers(&self) -> CircuitBreakerRegistry {
        self.breaker_overrides.iter().fold(
            CircuitBreakerRegistry::new(self.breaker.clone()),
            |registry, (resource, config)| registry.with_override(resource.clone(), config.clone()),
        )
    }

    pub fn build_sequencer(&self) -> ClientSequencer {
        ClientSequencer::from_config(&self.clients)
    }

    /// Token manager with the static provider first, then the remote one.
    pub fn build_token_manager(&self) -> IngestResult<TokenManager> {
        let mut providers: Vec<Arc<dyn TokenProvider>> = Vec::new();

        let manual = StaticTokenProvider::from_values(&self.static_tokens);
        if manual.is_available() {
            providers.push(Arc::new(manual));
        }

        if let Some(remote) = &self.remote_provider {
            providers.push(Arc::new(RemoteTokenProvider::new(
                &remote.url,
                remote.timeout(),
            )?));
        }

        Ok(TokenManager::new(providers, &self.tokens))
    }
}

/// Identities from a comma-separated priority list, minus disabled names.
fn identities_from_names(names: Option<&str>, disabled: Option<&str>) -> Vec<ClientIdentity> {
    let disabled: Vec<&str> = disabled
        .map(|s| s.split(',').map(str::trim).filter(|n| !n.is_empty()).collect())
        .unwrap_or_default();

    let names: Vec<String> = match names {
        Some(list) if !list.trim().is_empty() => list
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect(),
        _ => DEFAULT_CLIENTS.iter().map(|n| n.to_string()).collect(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(rank, name)| {
            let enabled = !disabled.contains(&name.as_str());
            ClientIdentity::new(name, rank as u32).with_enabled(enabled)
        })
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = assert_ok!(ResilienceConfig::from_lookup(|_| None));
        assert_eq!(config, ResilienceConfig::default());
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.tokens.ttl_secs, 21_600);
        assert!(config.remote_provider.is_none());
        assert!(config.static_tokens.is_empty());
        assert_ok!(config.validate());
    }

    #[test]
    fn test_env_overrides() {
        let config = assert_ok!(ResilienceConfig::from_lookup(lookup_from(&[
            ("INGEST_BREAKER_THRESHOLD", "3"),
            ("INGEST_BREAKER_COOLDOWN_SECS", "10"),
            ("INGEST_BACKOFF_JITTER", "off"),
            ("INGEST_TOKEN_COOLDOWN_SECS", "42"),
            ("INGEST_TRIES_PER_CLIENT", "1"),
            ("INGEST_TOKEN_SERVICE_URL", "http://127.0.0.1:4416/token"),
            ("INGEST_STATIC_GVS_TOKEN", "gvs-manual"),
            ("INGEST_STATIC_PLAYER_TOKEN", "   "),
        ])));

        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.cooldown_secs, 10);
        assert!(!config.backoff.jitter);
        assert_eq!(config.tokens.cooldown_secs, 42);
        assert_eq!(config.clients.tries_per_client, 1);
        assert_eq!(
            config.remote_provider,
            Some(RemoteProviderConfig {
                url: "http://127.0.0.1:4416/token".into(),
                timeout_secs: 10,
            })
        );
        assert_eq!(config.static_tokens.get(&TokenType::Gvs).map(String::as_str), Some("gvs-manual"));
        assert!(!config.static_tokens.contains_key(&TokenType::Player));
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = assert_ok!(ResilienceConfig::from_lookup(lookup_from(&[
            ("INGEST_BREAKER_THRESHOLD", "many"),
            ("INGEST_BACKOFF_JITTER", "maybe"),
        ])));
        assert_eq!(config.breaker.failure_threshold, 5);
        assert!(config.backoff.jitter);
    }

    #[test]
    fn test_client_list_and_disabled() {
        let config = assert_ok!(ResilienceConfig::from_lookup(lookup_from(&[
            ("INGEST_CLIENTS", "mweb, tv ,ios"),
            ("INGEST_CLIENTS_DISABLED", "ios"),
        ])));
        let sequencer = config.build_sequencer();
        let names: Vec<&str> = sequencer.sequence().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["mweb", "tv"]);
        assert_eq!(sequencer.identities().len(), 3);
    }

    #[test]
    fn test_clients_json_wins() {
        let config = assert_ok!(ResilienceConfig::from_lookup(lookup_from(&[
            ("INGEST_CLIENTS", "tv"),
            (
                "INGEST_CLIENTS_JSON",
                r#"[{"name":"android_vr","priority_rank":0,"extra_request_args":{"--user-agent":"vr"}}]"#,
            ),
        ])));
        let identities = &config.clients.identities;
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].name, "android_vr");
        assert!(identities[0].enabled);
        assert_eq!(identities[0].arg("--user-agent"), Some("vr"));
    }

    #[test]
    fn test_malformed_clients_json_is_an_error() {
        let result = ResilienceConfig::from_lookup(lookup_from(&[
            ("INGEST_CLIENTS", "tv"),
            ("INGEST_CLIENTS_JSON", r#"[{"name":"mweb","priority_rank":0},]"#),
        ]));
        assert!(matches!(result, Err(IngestError::Config(msg)) if msg.contains("INGEST_CLIENTS_JSON")));
    }

    #[test]
    fn test_blank_clients_json_is_ignored() {
        let config = assert_ok!(ResilienceConfig::from_lookup(lookup_from(&[
            ("INGEST_CLIENTS", "tv"),
            ("INGEST_CLIENTS_JSON", "  "),
        ])));
        assert_eq!(config.clients.identities.len(), 1);
        assert_eq!(config.clients.identities[0].name, "tv");
    }

    #[test]
    fn test_validate_rejects_duplicate_identity_names() {
        let mut config = ResilienceConfig::default();
        config.clients.identities = vec![
            ClientIdentity::new("tv", 0),
            ClientIdentity::new("mweb", 1),
            ClientIdentity::new("tv", 2).with_enabled(false),
        ];
        assert!(matches!(config.validate(), Err(IngestError::Config(msg)) if msg.contains("'tv'")));

        let config = assert_ok!(ResilienceConfig::from_lookup(lookup_from(&[(
            "INGEST_CLIENTS",
            "tv,mweb,tv"
        )])));
        assert_err!(config.validate());
    }

    #[test]
    fn test_debug_redacts_static_tokens() {
        let mut config = ResilienceConfig::default();
        config
            .static_tokens
            .insert(TokenType::Player, "SECRET-PO-TOKEN".into());
        let printed = format!("{:?}", config);
        assert!(printed.contains("Player"));
        assert!(!printed.contains("SECRET-PO-TOKEN"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ResilienceConfig::default();
        config.breaker.failure_threshold = 0;
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));

        let mut config = ResilienceConfig::default();
        config.backoff.base_delay_ms = 60_000;
        assert_err!(config.validate());

        let mut config = ResilienceConfig::default();
        config
            .breaker_overrides
            .insert("captions".into(), BreakerConfig::new(1, 10, 0));
        assert!(config.validate().is_err());

        let mut config = ResilienceConfig::default();
        for identity in &mut config.clients.identities {
            identity.enabled = false;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_breakers_applies_overrides() {
        let mut config = ResilienceConfig::default();
        config
            .breaker_overrides
            .insert("captions".into(), BreakerConfig::new(1, 5, 1));
        let registry = config.build_breakers();
        assert_eq!(registry.breaker("captions").config().failure_threshold, 1);
        assert_eq!(registry.breaker("download").config().failure_threshold, 5);
    }

    #[tokio::test]
    async fn test_build_token_manager_orders_providers() {
        let mut config = ResilienceConfig::default();
        config.static_tokens.insert(TokenType::Player, "manual".into());
        config.remote_provider = Some(RemoteProviderConfig {
            url: "http://127.0.0.1:9/token".into(),
            timeout_secs: 1,
        });
        let manager = assert_ok!(config.build_token_manager());
        assert_eq!(manager.provider_names(), vec!["static", "remote"]);

        let empty = ResilienceConfig::default().build_token_manager().unwrap();
        assert!(empty.provider_names().is_empty());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: ResilienceConfig =
            serde_json::from_str(r#"{"breaker":{"failure_threshold":3,"cooldown_secs":60,"success_threshold":1}}"#)
                .unwrap();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.clients, ClientConfig::default());
    }
}
