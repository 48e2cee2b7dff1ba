use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use ingest_models::{TokenContext, TokenType};

use super::TokenProvider;

/// Returns operator-configured token values, ignoring context.
#[derive(Clone, Default)]
pub struct StaticTokenProvider {
    values: BTreeMap<TokenType, String>,
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token_types", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a configured map; empty values count as unset.
    pub fn from_values(values: &BTreeMap<TokenType, String>) -> Self {
        Self {
            values: values
                .iter()
                .filter(|(_, v)| !v.trim().is_empty())
                .map(|(t, v)| (*t, v.trim().to_string()))
                .collect(),
        }
    }

    pub fn with_token(mut self, token_type: TokenType, value: impl Into<String>) -> Self {
        self.values.insert(token_type, value.into());
        self
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn try_get(
        &self,
        token_type: TokenType,
        _context: Option<&TokenContext>,
    ) -> Option<String> {
        self.values.get(&token_type).cloned()
    }

    fn is_available(&self) -> bool {
        !self.values.is_empty()
    }
}
