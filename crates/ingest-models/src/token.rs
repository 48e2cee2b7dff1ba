//! Credential token types and the per-request token context.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of credential token required by a remote endpoint.
///
/// The three kinds are tracked independently: a rejected `Player` token says
/// nothing about the `Gvs` token sent alongside it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Player endpoint token.
    Player,
    /// Media streaming (GVS) token.
    Gvs,
    /// Subtitles/captions token.
    Subs,
}

impl TokenType {
    /// All token types.
    pub const ALL: &'static [TokenType] = &[TokenType::Player, TokenType::Gvs, TokenType::Subs];

    /// Returns the token type name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Player => "player",
            TokenType::Gvs => "gvs",
            TokenType::Subs => "subs",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = TokenTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "player" => Ok(TokenType::Player),
            "gvs" => Ok(TokenType::Gvs),
            "subs" => Ok(TokenType::Subs),
            _ => Err(TokenTypeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown token type: {0}")]
pub struct TokenTypeParseError(String);

/// Key/value context a token is bound to (video id, client name, ...).
///
/// Backed by a `BTreeMap` so serialization order is stable regardless of
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TokenContext(BTreeMap<String, String>);

impl TokenContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Canonical JSON encoding (keys sorted).
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TokenContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Tokens handed to an action for one client identity.
///
/// Types the token manager could not obtain are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSet(BTreeMap<TokenType, String>);

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token_type: TokenType, value: impl Into<String>) {
        self.0.insert(token_type, value.into());
    }

    pub fn get(&self, token_type: TokenType) -> Option<&str> {
        self.0.get(&token_type).map(String::as_str)
    }

    pub fn contains(&self, token_type: TokenType) -> bool {
        self.0.contains_key(&token_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenType, &str)> {
        self.0.iter().map(|(t, v)| (*t, v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_type_parse() {
        assert_eq!("PLAYER".parse::<TokenType>().unwrap(), TokenType::Player);
        assert_eq!("gvs".parse::<TokenType>().unwrap(), TokenType::Gvs);
        assert_eq!("Subs".parse::<TokenType>().unwrap(), TokenType::Subs);
        assert!("cookie".parse::<TokenType>().is_err());
    }

    #[test]
    fn test_context_canonical_json_is_order_independent() {
        let a = TokenContext::new().with("video_id", "abc").with("client", "tv");
        let b = TokenContext::new().with("client", "tv").with("video_id", "abc");
        assert_eq!(a.canonical_json(), b.canonical_json());
        assert_eq!(a.canonical_json(), r#"{"client":"tv","video_id":"abc"}"#);
    }

    #[test]
    fn test_token_set_lookup() {
        let mut set = TokenSet::new();
        assert!(set.is_empty());
        set.insert(TokenType::Player, "p-token");
        assert!(set.contains(TokenType::Player));
        assert_eq!(set.get(TokenType::Player), Some("p-token"));
        assert_eq!(set.get(TokenType::Gvs), None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_token_set_serializes_as_map() {
        let mut set = TokenSet::new();
        set.insert(TokenType::Gvs, "g");
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"{"gvs":"g"}"#);
    }
}
