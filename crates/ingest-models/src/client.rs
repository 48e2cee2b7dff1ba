//! Client identities used to shape requests to the remote platform.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_enabled() -> bool {
    true
}

/// A distinct request shape the remote service treats independently.
///
/// Identities are configured once at startup and never mutated; disabling
/// one means configuring it with `enabled = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClientIdentity {
    /// Unique name (e.g. `tv`, `web_safari`).
    pub name: String,
    /// Position in the fallback order, lower goes first.
    pub priority_rank: u32,
    /// Opaque arguments forwarded to the I/O action.
    #[serde(default)]
    pub extra_request_args: BTreeMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ClientIdentity {
    /// Create an enabled identity with no extra arguments.
    pub fn new(name: impl Into<String>, priority_rank: u32) -> Self {
        Self {
            name: name.into(),
            priority_rank,
            extra_request_args: BTreeMap::new(),
            enabled: true,
        }
    }

    /// Add an extra request argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_request_args.insert(key.into(), value.into());
        self
    }

    /// Set whether the identity takes part in fallback.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn arg(&self, key: &str) -> Option<&str> {
        self.extra_request_args.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_defaults_from_json() {
        let identity: ClientIdentity =
            serde_json::from_str(r#"{"name": "tv", "priority_rank": 0}"#).unwrap();
        assert!(identity.enabled);
        assert!(identity.extra_request_args.is_empty());
    }

    #[test]
    fn test_identity_builder() {
        let identity = ClientIdentity::new("mweb", 2)
            .with_arg("player_skip", "webpage")
            .with_enabled(false);
        assert_eq!(identity.arg("player_skip"), Some("webpage"));
        assert!(!identity.enabled);
        assert_eq!(identity.priority_rank, 2);
    }
}
