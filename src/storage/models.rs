//! Row models for the persisted trace store.
//!
//! These mirror the relational tables: the envelope columns on a trace
//! row are nullable and only ever populated together, which `from_trace`
//! enforces by construction from the typed `TraceBody`.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::SigningKeyRecord;
use crate::pipeline::trace::{Trace, TraceBody};
use crate::staging::CaseLawCandidate;

/// A trace ready for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRow {
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    pub retention_tier: String,
    pub trace_type: String,
    pub schema_version: u32,
    pub agent_id: String,
    pub agent_signature: String,

    /// Current stored body (original, or scrubbed replacement).
    pub body: String,

    // Envelope columns: all null until sealed, then all populated.
    pub pii_scrubbed: bool,
    pub original_content_hash: Option<String>,
    pub scrub_timestamp: Option<DateTime<Utc>>,
    pub scrub_signature: Option<String>,
    pub scrub_key_id: Option<String>,
}

impl TraceRow {
    pub fn from_trace(trace: &Trace) -> Self {
        let (pii_scrubbed, hash, ts, sig, key_id) = match &trace.body {
            TraceBody::Original { .. } => (false, None, None, None, None),
            TraceBody::Scrubbed { envelope, .. } => (
                true,
                Some(envelope.original_content_hash.clone()),
                Some(envelope.scrub_timestamp),
                Some(envelope.scrub_signature.clone()),
                Some(envelope.scrub_key_id.clone()),
            ),
        };

        Self {
            trace_id: trace.trace_id.clone(),
            timestamp: trace.timestamp,
            retention_tier: trace.retention_tier.as_str().to_string(),
            trace_type: trace.trace_type.clone(),
            schema_version: trace.schema_version,
            agent_id: trace.agent_id.clone(),
            agent_signature: trace.agent_signature.clone(),
            body: trace.body.value().to_string(),
            pii_scrubbed,
            original_content_hash: hash,
            scrub_timestamp: ts,
            scrub_signature: sig,
            scrub_key_id: key_id,
        }
    }

    /// The iff-invariant on envelope columns.
    pub fn envelope_consistent(&self) -> bool {
        let populated = [
            self.original_content_hash.is_some(),
            self.scrub_timestamp.is_some(),
            self.scrub_signature.is_some(),
            self.scrub_key_id.is_some(),
        ];
        if self.pii_scrubbed {
            populated.iter().all(|p| *p)
        } else {
            populated.iter().all(|p| !*p)
        }
    }
}

/// A quarantined submission, kept inspectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineRow {
    pub trace_id: String,
    pub content_hash: String,
    pub reason: String,
    pub received_at: DateTime<Utc>,
}

/// A signing key row for the keyed table with a closed-enumeration
/// purpose column. Secret material never leaves the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKeyRow {
    pub key_id: String,
    pub purpose: String,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl SigningKeyRow {
    pub fn from_record(record: &SigningKeyRecord) -> Self {
        Self {
            key_id: record.key_id.clone(),
            purpose: record.purpose.as_str().to_string(),
            public_key: general_purpose::STANDARD.encode(record.public_key.to_bytes()),
            created_at: record.created_at,
            expires_at: record.expires_at,
            revoked_at: record.revoked_at,
            revocation_reason: record.revocation_reason.clone(),
        }
    }
}

/// A staging row referencing a trace by (id, timestamp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRow {
    pub candidate_id: String,
    pub trace_id: String,
    pub trace_timestamp: DateTime<Utc>,
    pub pattern_class: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub compendium_id: Option<String>,
}

impl CandidateRow {
    pub fn from_candidate(candidate: &CaseLawCandidate) -> Self {
        Self {
            candidate_id: candidate.candidate_id.clone(),
            trace_id: candidate.trace_id.clone(),
            trace_timestamp: candidate.trace_timestamp,
            pattern_class: candidate.pattern_class.clone(),
            status: candidate.status.as_str().to_string(),
            created_at: candidate.created_at,
            published: candidate.published,
            published_at: candidate.published_at,
            compendium_id: candidate.compendium_id.clone(),
        }
    }
}
