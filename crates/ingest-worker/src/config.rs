//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use ingest_resilience::ResilienceConfig;

use crate::error::WorkerResult;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum items processed concurrently
    pub max_concurrent: usize,
    /// Caller-level retries around a whole orchestrated operation
    pub max_retries: u32,
    /// Work directory for downloaded media and captions
    pub work_dir: PathBuf,
    /// yt-dlp binary name or path
    pub ytdlp_binary: String,
    /// Deadline for a single yt-dlp invocation
    pub ytdlp_timeout: Duration,
    /// Prometheus exporter listen address, if enabled
    pub metrics_addr: Option<String>,
    /// Orchestrator settings
    pub resilience: ResilienceConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_retries: 3,
            work_dir: PathBuf::from("/tmp/ingest"),
            ytdlp_binary: "yt-dlp".to_string(),
            ytdlp_timeout: Duration::from_secs(600), // 10 minutes
            metrics_addr: None,
            resilience: ResilienceConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Ok(Self {
            max_concurrent: std::env::var("WORKER_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(2),
            max_retries: std::env::var("WORKER_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/ingest")),
            ytdlp_binary: std::env::var("YTDLP_BINARY").unwrap_or_else(|_| "yt-dlp".to_string()),
            ytdlp_timeout: Duration::from_secs(
                std::env::var("YTDLP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            metrics_addr: std::env::var("INGEST_METRICS_ADDR")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            resilience: ResilienceConfig::from_env()?,
        })
    }
}
