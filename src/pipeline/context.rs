//! Pipeline context management.
//!
//! Batch and per-trace context for logging and correlation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::logging::structured::LogContext;

/// Context for a batch of trace submissions.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub batch_id: String,
    pub received_at: DateTime<Utc>,
}

impl BatchContext {
    pub fn new() -> Self {
        Self {
            batch_id: format!("batch-{}", &Uuid::new_v4().to_string()[..8]),
            received_at: Utc::now(),
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.batch_id)
    }

    pub fn trace_log_context(&self, trace_id: &str) -> LogContext {
        self.log_context().with_trace(trace_id)
    }
}

impl Default for BatchContext {
    fn default() -> Self {
        Self::new()
    }
}
