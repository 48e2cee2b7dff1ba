//! Structured per-item logging.
//!
//! Keeps the item ID and operation on every lifecycle event so log lines
//! from concurrent items can be told apart.

use ingest_models::OperationKind;
use tracing::{error, info, Span};

/// Logger for one ingestion item.
#[derive(Debug, Clone)]
pub struct IngestLogger {
    item_id: String,
    operation: OperationKind,
}

impl IngestLogger {
    /// Create a logger for an item (usually the video ID) and operation.
    pub fn new(item_id: impl Into<String>, operation: OperationKind) -> Self {
        Self {
            item_id: item_id.into(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            item_id = %self.item_id,
            operation = %self.operation,
            "Ingest started: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            item_id = %self.item_id,
            operation = %self.operation,
            "Ingest failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            item_id = %self.item_id,
            operation = %self.operation,
            "Ingest completed: {}", message
        );
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Span carrying the item fields, for instrumenting the whole item.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "item",
            item_id = %self.item_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_logger_fields() {
        let logger = IngestLogger::new("dQw4w9WgXcQ", OperationKind::Captions);
        assert_eq!(logger.item_id(), "dQw4w9WgXcQ");
        assert_eq!(logger.operation(), OperationKind::Captions);
    }
}
