//! Per-item ingestion: orchestrated yt-dlp attempts inside the caller's
//! backoff loop.

use ingest_models::{extract_video_id, OperationKind, OperationSpec, TokenContext};
use ingest_resilience::{BackoffPolicy, CancellationToken, IngestOrchestrator};
use tracing::Instrument;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::IngestLogger;
use crate::retry::{retry_ingest, RetryConfig, RetryResult};
use crate::ytdlp::{FetchedMedia, YtDlpAction};

/// Processes source URLs through one shared orchestrator.
#[derive(Debug, Clone)]
pub struct IngestWorker {
    orchestrator: IngestOrchestrator,
    action: YtDlpAction,
    backoff: BackoffPolicy,
    max_retries: u32,
}

impl IngestWorker {
    pub fn new(
        orchestrator: IngestOrchestrator,
        action: YtDlpAction,
        backoff: BackoffPolicy,
        max_retries: u32,
    ) -> Self {
        Self {
            orchestrator,
            action,
            backoff,
            max_retries,
        }
    }

    /// Build the orchestrator and action from worker configuration.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let orchestrator = IngestOrchestrator::from_config(&config.resilience)?;
        Ok(Self::new(
            orchestrator,
            YtDlpAction::from_config(config),
            config.resilience.backoff_policy(),
            config.max_retries,
        ))
    }

    pub fn orchestrator(&self) -> &IngestOrchestrator {
        &self.orchestrator
    }

    pub fn action(&self) -> &YtDlpAction {
        &self.action
    }

    /// Run one operation for one source URL.
    ///
    /// Tokens are bound to the item's video ID.
    pub async fn process(
        &self,
        url: &str,
        kind: OperationKind,
        cancel: &CancellationToken,
    ) -> WorkerResult<FetchedMedia> {
        let video_id = extract_video_id(url)
            .map_err(|e| WorkerError::invalid_source(format!("{}: {}", url, e)))?;
        let logger = IngestLogger::new(&video_id, kind);

        async {
            logger.log_start(url);

            let operation = OperationSpec::new(kind)
                .with_context(TokenContext::new().with("video_id", &video_id));
            let retry = RetryConfig::new(kind.as_str()).with_max_retries(self.max_retries);

            let op = &operation;
            let action = &self.action;
            let orchestrator = &self.orchestrator;
            let video_id = video_id.as_str();

            let result = retry_ingest(&retry, &self.backoff, cancel, move || {
                orchestrator.execute_with_cancel(op, cancel, move |identity, tokens| async move {
                    action.run(kind, url, video_id, &identity, &tokens).await
                })
            })
            .await;

            match result {
                RetryResult::Success(fetched) => {
                    logger.log_completion(&fetched.summary());
                    Ok(fetched)
                }
                RetryResult::Failed { error, attempts } => {
                    let error = WorkerError::from(error);
                    logger.log_error(&format!("{} (after {} attempts)", error, attempts));
                    Err(error)
                }
            }
        }
        .instrument(logger.create_span())
        .await
    }
}
