//! Provenance envelope engine.
//!
//! For full-fidelity traces: hash the original body, scrub it, sign the
//! scrubbed result with the active scrub key, and replace the stored
//! body with the scrubbed body plus envelope in a single assignment.
//! The original content is never dropped before the envelope is fully
//! assembled, and re-running the engine on an already-scrubbed trace is
//! a no-op.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PipelineError;
use crate::keys::{KeyLifecycleManager, KeyPurpose};
use crate::logging::structured::LogContext;
use crate::pipeline::trace::{Trace, TraceBody};
use crate::security::pii::{PiiScrubber, PiiScrubReport};

/// Provenance bundle persisted alongside a scrubbed body in place of the
/// original content. The hash is a checksum of what the system actually
/// received; the signature covers the scrubbed replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrubEnvelope {
    /// SHA-256 of the original body, hex-encoded (64 chars).
    pub original_content_hash: String,
    pub pii_scrubbed: bool,
    pub scrub_timestamp: DateTime<Utc>,
    /// Ed25519 signature over the scrubbed body, base64-encoded.
    pub scrub_signature: String,
    pub scrub_key_id: String,
}

/// Compute the hex-encoded SHA-256 content digest of a body.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonical bytes of a body for hashing and signing. `serde_json`
/// serializes object keys in sorted order, so this is stable for a
/// given value.
fn canonical_bytes(body: &serde_json::Value) -> String {
    body.to_string()
}

/// Scrub and seal a full-fidelity trace in place.
///
/// Returns the scrub report, or `None` when the trace was already
/// scrubbed (idempotence guard: never re-hash, never re-sign).
/// On any error the original body is untouched.
///
/// `original_content_hash` digests the canonical serialization of the
/// parsed body, not the raw wire payload: the raw text is gone after
/// parse, and the canonical form is what re-verification can recompute.
/// (Quarantine records hash the raw payload instead, since nothing there
/// is guaranteed to parse.)
pub fn seal_trace(
    trace: &mut Trace,
    scrubber: &PiiScrubber,
    keys: &KeyLifecycleManager,
    ctx: &LogContext,
) -> Result<Option<PiiScrubReport>, PipelineError> {
    if trace.body.is_scrubbed() {
        log::debug!("{} SEAL_SKIP reason=already_scrubbed", ctx);
        return Ok(None);
    }

    let original = canonical_bytes(trace.body.value());
    let original_content_hash = content_hash(&original);

    let (scrubbed_body, report) = scrubber.scrub(trace.body.value(), ctx);

    // Resolved per operation, not cached: an expired or revoked key must
    // fail here rather than produce an envelope that fails verification.
    let active = keys.current_signing_key(KeyPurpose::Scrub)?;

    let scrubbed_bytes = canonical_bytes(&scrubbed_body);
    let signature = active.sign(scrubbed_bytes.as_bytes());

    let envelope = ScrubEnvelope {
        original_content_hash,
        pii_scrubbed: true,
        scrub_timestamp: Utc::now(),
        scrub_signature: general_purpose::STANDARD.encode(signature.to_bytes()),
        scrub_key_id: active.key_id.clone(),
    };

    log::info!(
        "{} TRACE_SEALED key_id={} hash={} matches={}",
        ctx,
        envelope.scrub_key_id,
        envelope.original_content_hash,
        report.total_matches()
    );

    // Single assignment: readers see either the original body or the
    // scrubbed body with its complete envelope, never a mix.
    trace.body = TraceBody::Scrubbed {
        body: scrubbed_body,
        envelope,
    };

    Ok(Some(report))
}

/// Re-verify a sealed trace: the signature must validate over the stored
/// scrubbed body under the key the envelope names, and that key's
/// validity window must contain the recorded scrub timestamp.
pub fn verify_envelope(trace: &Trace, keys: &KeyLifecycleManager) -> Result<(), PipelineError> {
    let envelope = match trace.body.envelope() {
        Some(env) => env,
        None => {
            return Err(PipelineError::EnvelopeIntegrity {
                detail: "trace has no envelope".to_string(),
            })
        }
    };

    if !envelope.pii_scrubbed || envelope.original_content_hash.len() != 64 {
        return Err(PipelineError::EnvelopeIntegrity {
            detail: "envelope fields inconsistent".to_string(),
        });
    }

    if !keys.key_valid_at(&envelope.scrub_key_id, envelope.scrub_timestamp)? {
        return Err(PipelineError::EnvelopeIntegrity {
            detail: format!(
                "key {} not valid at scrub timestamp {}",
                envelope.scrub_key_id, envelope.scrub_timestamp
            ),
        });
    }

    let public_key = keys.public_key(&envelope.scrub_key_id)?;

    let signature_bytes = general_purpose::STANDARD
        .decode(&envelope.scrub_signature)
        .map_err(|e| PipelineError::EnvelopeIntegrity {
            detail: format!("signature decode failed: {}", e),
        })?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|e| PipelineError::EnvelopeIntegrity {
            detail: format!("signature parse failed: {}", e),
        })?;

    let scrubbed_bytes = canonical_bytes(trace.body.value());
    public_key
        .verify(scrubbed_bytes.as_bytes(), &signature)
        .map_err(|e| PipelineError::EnvelopeIntegrity {
            detail: format!("signature verification failed: {}", e),
        })
}
