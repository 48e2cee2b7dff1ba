//! Media ingestion worker.
//!
//! This crate provides:
//! - Worker configuration from the environment
//! - yt-dlp as the orchestrator's action
//! - Caller-side backoff around whole orchestrated operations
//! - Per-item structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod worker;
pub mod ytdlp;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::IngestLogger;
pub use retry::{retry_ingest, FailureTracker, RetryConfig, RetryResult};
pub use worker::IngestWorker;
pub use ytdlp::{FetchedMedia, YtDlpAction};
