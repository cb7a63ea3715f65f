//! Core trace types.
//!
//! A `Trace` is immutable once verified; its body is only ever replaced
//! wholesale by the envelope engine, never mutated in place. The body is
//! an enum so no reader can observe a scrubbed flag without the envelope
//! that proves it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::ScrubEnvelope;

/// Fidelity level at which a trace is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionTier {
    /// Reduced-field projection only.
    ReducedFields,
    /// Full body, scrubbed and provenance-sealed.
    FullBody,
}

impl RetentionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionTier::ReducedFields => "reduced_fields",
            RetentionTier::FullBody => "full_body",
        }
    }
}

/// An inbound trace record as accepted from the wire. The payload is the
/// exact byte sequence the agent signed, kept as raw text so signature
/// verification never depends on re-serialization.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceSubmission {
    pub trace_id: String,
    pub trace_type: String,
    /// Schema version; None resolves to the most recent active rule.
    pub schema_version: Option<u32>,
    pub timestamp: DateTime<Utc>,
    pub retention_tier: RetentionTier,
    pub payload: String,
    pub agent_id: String,
    pub signature: String,
}

/// Stored content of a trace. `Scrubbed` carries its envelope by
/// construction, which makes the "scrubbed iff signature present"
/// invariant unrepresentable to violate in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TraceBody {
    Original { body: Value },
    Scrubbed { body: Value, envelope: ScrubEnvelope },
}

impl TraceBody {
    pub fn is_scrubbed(&self) -> bool {
        matches!(self, TraceBody::Scrubbed { .. })
    }

    pub fn value(&self) -> &Value {
        match self {
            TraceBody::Original { body } => body,
            TraceBody::Scrubbed { body, .. } => body,
        }
    }

    pub fn envelope(&self) -> Option<&ScrubEnvelope> {
        match self {
            TraceBody::Original { .. } => None,
            TraceBody::Scrubbed { envelope, .. } => Some(envelope),
        }
    }
}

/// A verified trace inside the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    pub retention_tier: RetentionTier,
    pub trace_type: String,
    pub schema_version: u32,
    pub agent_id: String,
    /// The agent's inbound signature, retained for audit.
    pub agent_signature: String,
    pub body: TraceBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_accessors() {
        let body = TraceBody::Original {
            body: json!({"task": "summarize"}),
        };
        assert!(!body.is_scrubbed());
        assert!(body.envelope().is_none());
        assert_eq!(body.value()["task"], json!("summarize"));
    }

    #[test]
    fn test_retention_tier_serde() {
        let tier: RetentionTier = serde_json::from_str(r#""full_body""#).unwrap();
        assert_eq!(tier, RetentionTier::FullBody);
        assert_eq!(tier.as_str(), "full_body");
    }
}
