//! Shared data models for the ingestion resilience layer.
//!
//! This crate provides Serde-serializable types for:
//! - Error classes surfaced to retry policy
//! - Client identities and operations
//! - Credential token types, contexts and token sets
//! - Action failures reported by the media-fetching layer

pub mod client;
pub mod error_class;
pub mod operation;
pub mod outcome;
pub mod source;
pub mod token;

// Re-export common types
pub use client::ClientIdentity;
pub use error_class::{ErrorClass, ErrorClassParseError};
pub use operation::{OperationKind, OperationKindParseError, OperationSpec};
pub use outcome::{ActionFailure, TransportFailure};
pub use source::{extract_video_id, SourceUrlError, SourceUrlResult};
pub use token::{TokenContext, TokenSet, TokenType, TokenTypeParseError};
