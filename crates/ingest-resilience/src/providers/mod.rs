//! Token providers.
//!
//! A provider is one way of obtaining a credential: a value configured by an
//! operator, or a call to a token-issuing service. Providers never fail past
//! their boundary; "no token" is reported as `None`.

mod remote;
mod static_provider;

pub use remote::{RemoteTokenProvider, RemoteTokenResponse};
pub use static_provider::StaticTokenProvider;

use async_trait::async_trait;
use ingest_models::{TokenContext, TokenType};

/// Capability shared by every token source.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Try to obtain a token value. Never errors; `None` means no token.
    async fn try_get(&self, token_type: TokenType, context: Option<&TokenContext>)
        -> Option<String>;

    /// Whether the provider can currently be asked at all.
    fn is_available(&self) -> bool;
}
