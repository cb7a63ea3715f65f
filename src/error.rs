//! Pipeline error taxonomy.
//!
//! Every rejection carries enough structured detail to reproduce the
//! decision. Disposition is encoded by the caller (reject vs. quarantine),
//! not by the variant itself; see `pipeline::ingestion`.

use thiserror::Error;

use crate::keys::KeyPurpose;

/// Errors produced by the trace pipeline and its components.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Inbound agent signature did not verify. Rejected, never retried.
    #[error("invalid signature from agent {agent_id}: {detail}")]
    SignatureInvalid { agent_id: String, detail: String },

    /// No schema rule matched the trace type/version. Hard stop.
    #[error("no schema rule for type {trace_type} version {version}")]
    SchemaNotFound { trace_type: String, version: String },

    /// Structural validation failed. Quarantined so the trace stays
    /// inspectable while the schema is fixed.
    #[error("schema validation failed: {}", violations.join("; "))]
    SchemaValidation { violations: Vec<String> },

    /// Sanitizer flagged injection content under a rejecting policy.
    #[error("sanitization rejected: {}", detections.join("; "))]
    SanitizationRejected { detections: Vec<String> },

    /// No usable signing key for the requested purpose. Fatal for the
    /// scrub step only; the original body is retained until a key exists.
    #[error("no usable signing key for purpose {purpose}")]
    NoUsableSigningKey { purpose: KeyPurpose },

    /// Envelope references a key the lifecycle manager does not know.
    /// Surfaced as an integrity alarm, never auto-resolved.
    #[error("unknown key {key_id}")]
    UnknownKey { key_id: String },

    /// Payload was not parseable JSON. Quarantined with a content hash.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Key material could not be decoded or was structurally invalid.
    #[error("invalid key material for {key_id}: {detail}")]
    InvalidKeyMaterial { key_id: String, detail: String },

    /// Attempt to install a key id that already exists.
    #[error("key {key_id} already installed")]
    DuplicateKey { key_id: String },

    /// Revocation is one-way; a second revoke is rejected.
    #[error("key {key_id} already revoked")]
    AlreadyRevoked { key_id: String },

    /// A stored envelope failed re-verification (tampered body, signature
    /// mismatch, or key outside its validity window at scrub time).
    #[error("envelope integrity failure: {detail}")]
    EnvelopeIntegrity { detail: String },

    /// Case law candidate status transitions are one-directional.
    #[error("invalid candidate transition {from} -> {to}")]
    InvalidStatusTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Staging operation referenced a candidate that does not exist.
    #[error("unknown candidate {candidate_id}")]
    UnknownCandidate { candidate_id: String },
}

impl PipelineError {
    /// Whether this error quarantines the trace (kept inspectable) rather
    /// than rejecting it outright.
    pub fn is_quarantine(&self) -> bool {
        matches!(
            self,
            PipelineError::SchemaNotFound { .. }
                | PipelineError::SchemaValidation { .. }
                | PipelineError::SanitizationRejected { .. }
                | PipelineError::MalformedPayload(_)
        )
    }
}
