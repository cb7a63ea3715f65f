//! Structured logging utilities.
//!
//! Every log line carries a `[batch=..] [trace=..]` prefix so decisions can
//! be correlated back to a single submission across the pipeline stages.

use std::fmt;

/// Logging context for a batch of trace submissions.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub batch_id: String,
    pub trace_id: Option<String>,
}

impl LogContext {
    pub fn new(batch_id: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            trace_id: None,
        }
    }

    pub fn with_trace(&self, trace_id: &str) -> Self {
        Self {
            batch_id: self.batch_id.clone(),
            trace_id: Some(trace_id.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.trace_id {
            Some(tid) => write!(f, "[batch={}] [trace={}]", self.batch_id, tid),
            None => write!(f, "[batch={}]", self.batch_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new("batch-7f3a");
        assert_eq!(format!("{}", ctx), "[batch=batch-7f3a]");

        let ctx_with_trace = ctx.with_trace("trace-001");
        assert_eq!(
            format!("{}", ctx_with_trace),
            "[batch=batch-7f3a] [trace=trace-001]"
        );
    }
}
