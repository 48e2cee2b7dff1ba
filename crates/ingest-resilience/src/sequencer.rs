//! Ordered fallback over client identities.

use std::time::Duration;

use ingest_models::ClientIdentity;
use serde::{Deserialize, Serialize};

/// Default identity names, in fallback order.
pub const DEFAULT_CLIENTS: &[&str] = &["tv", "web_safari", "mweb", "android_vr"];

/// Client fallback configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub identities: Vec<ClientIdentity>,
    /// Local attempts per identity before moving on.
    pub tries_per_client: u32,
    /// Fixed pause between attempts on the same identity (in milliseconds).
    pub sleep_between_tries_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            identities: DEFAULT_CLIENTS
                .iter()
                .enumerate()
                .map(|(rank, name)| ClientIdentity::new(*name, rank as u32))
                .collect(),
            tries_per_client: 2,
            sleep_between_tries_ms: 2000,
        }
    }
}

/// Iterates enabled identities in priority order.
///
/// The identity list is fixed at construction; ties in `priority_rank` keep
/// their configured order.
#[derive(Debug, Clone)]
pub struct ClientSequencer {
    identities: Vec<ClientIdentity>,
    tries_per_client: u32,
    sleep_between_tries: Duration,
}

impl ClientSequencer {
    pub fn new(
        mut identities: Vec<ClientIdentity>,
        tries_per_client: u32,
        sleep_between_tries: Duration,
    ) -> Self {
        identities.sort_by_key(|identity| identity.priority_rank);
        Self {
            identities,
            tries_per_client,
            sleep_between_tries,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.identities.clone(),
            config.tries_per_client,
            Duration::from_millis(config.sleep_between_tries_ms),
        )
    }

    /// A fresh pass over the enabled identities, lowest rank first.
    pub fn sequence(&self) -> impl Iterator<Item = &ClientIdentity> + '_ {
        self.identities.iter().filter(|identity| identity.enabled)
    }

    /// Local attempt budget for an identity. Always at least one.
    pub fn tries_for(&self, _identity: &ClientIdentity) -> u32 {
        self.tries_per_client.max(1)
    }

    /// Pause between attempts on the same identity.
    pub fn sleep_between_tries(&self) -> Duration {
        self.sleep_between_tries
    }

    /// All configured identities, including disabled ones.
    pub fn identities(&self) -> &[ClientIdentity] {
        &self.identities
    }

    pub fn enabled_count(&self) -> usize {
        self.sequence().count()
    }
}
