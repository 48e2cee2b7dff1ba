//! Logical ingestion operations and what each one requires.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::token::{TokenContext, TokenType};

/// Kind of logical ingestion operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Download the audio/media stream.
    Download,
    /// Fetch video metadata.
    Metadata,
    /// Fetch captions/subtitles.
    Captions,
}

impl OperationKind {
    pub const ALL: &'static [OperationKind] = &[
        OperationKind::Download,
        OperationKind::Metadata,
        OperationKind::Captions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Download => "download",
            OperationKind::Metadata => "metadata",
            OperationKind::Captions => "captions",
        }
    }

    /// Token types the operation needs by default.
    pub fn default_token_types(&self) -> Vec<TokenType> {
        match self {
            OperationKind::Download => vec![TokenType::Player, TokenType::Gvs],
            OperationKind::Metadata => vec![TokenType::Player],
            OperationKind::Captions => vec![TokenType::Subs],
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = OperationKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        OperationKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| OperationKindParseError(s.to_string()))
    }
}

#[derive(Debug, Error)]
#[error("Unknown operation '{0}' (expected download, metadata or captions)")]
pub struct OperationKindParseError(String);

/// One operation to run through the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationSpec {
    pub kind: OperationKind,
    /// Circuit breaker this operation reports to.
    pub resource_name: String,
    /// Context tokens are bound to, if any.
    #[serde(default)]
    pub context: Option<TokenContext>,
    pub required_token_types: Vec<TokenType>,
}

impl OperationSpec {
    /// Operation with the kind's default resource name and token types.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            resource_name: kind.as_str().to_string(),
            context: None,
            required_token_types: kind.default_token_types(),
        }
    }

    pub fn download() -> Self {
        Self::new(OperationKind::Download)
    }

    pub fn metadata() -> Self {
        Self::new(OperationKind::Metadata)
    }

    pub fn captions() -> Self {
        Self::new(OperationKind::Captions)
    }

    pub fn with_context(mut self, context: TokenContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = name.into();
        self
    }

    pub fn with_token_types(mut self, types: Vec<TokenType>) -> Self {
        self.required_token_types = types;
        self
    }

    pub fn requires(&self, token_type: TokenType) -> bool {
        self.required_token_types.contains(&token_type)
    }
}
