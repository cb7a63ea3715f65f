//! Inbound Ed25519 signature verification.
//!
//! Verifies the signature an originating agent attached to its trace,
//! over the exact byte sequence of the payload. A trace that fails here
//! is discarded before any further processing; verification never
//! mutates the payload.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use parking_lot::RwLock;

use crate::error::PipelineError;
use crate::logging::structured::LogContext;

/// Directory cache TTL - 5 minutes
const DIRECTORY_TTL_SECS: u64 = 300;

/// In-memory cache of agent public keys, loaded from the external
/// identity/key directory and refreshed on a bounded interval.
#[derive(Debug, Default)]
pub struct AgentKeyDirectory {
    state: RwLock<DirectoryState>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    keys: HashMap<String, VerifyingKey>,
    loaded_at: Option<Instant>,
}

impl AgentKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an agent's public key from base64-encoded bytes.
    pub fn load_key(&self, agent_id: &str, public_key_base64: &str) -> Result<(), PipelineError> {
        let key_bytes = general_purpose::STANDARD
            .decode(public_key_base64)
            .map_err(|e| PipelineError::InvalidKeyMaterial {
                key_id: agent_id.to_string(),
                detail: format!("base64 decode failed: {}", e),
            })?;

        let key_array: [u8; 32] =
            key_bytes
                .try_into()
                .map_err(|_| PipelineError::InvalidKeyMaterial {
                    key_id: agent_id.to_string(),
                    detail: "expected 32 bytes".to_string(),
                })?;

        let verifying_key =
            VerifyingKey::from_bytes(&key_array).map_err(|e| PipelineError::InvalidKeyMaterial {
                key_id: agent_id.to_string(),
                detail: format!("invalid public key: {}", e),
            })?;

        self.state.write().keys.insert(agent_id.to_string(), verifying_key);
        Ok(())
    }

    pub fn mark_loaded(&self) {
        self.state.write().loaded_at = Some(Instant::now());
    }

    pub fn key_count(&self) -> usize {
        self.state.read().keys.len()
    }

    /// Check if the cache needs refresh (empty or TTL expired).
    pub fn needs_refresh(&self) -> bool {
        let state = self.state.read();
        if state.keys.is_empty() {
            return true;
        }
        match state.loaded_at {
            Some(loaded_at) => loaded_at.elapsed() > Duration::from_secs(DIRECTORY_TTL_SECS),
            None => true,
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.keys.clear();
        state.loaded_at = None;
        log::info!("AGENT_KEY_DIRECTORY_CLEARED");
    }

    fn get(&self, agent_id: &str) -> Option<VerifyingKey> {
        self.state.read().keys.get(agent_id).copied()
    }
}

/// Verify an agent's signature over the exact payload bytes.
///
/// Rejects when the agent is unknown, the signature fails to decode or
/// parse, or verification fails. There is no unverified pass-through:
/// a trace either proves its origin or it never enters the pipeline.
pub fn verify_submission(
    directory: &AgentKeyDirectory,
    payload: &[u8],
    agent_id: &str,
    signature_base64: &str,
    ctx: &LogContext,
) -> Result<(), PipelineError> {
    let verifying_key = match directory.get(agent_id) {
        Some(key) => key,
        None => {
            log::warn!("{} SIGNATURE_AGENT_UNKNOWN agent_id={}", ctx, agent_id);
            return Err(PipelineError::SignatureInvalid {
                agent_id: agent_id.to_string(),
                detail: "agent not present in key directory".to_string(),
            });
        }
    };

    // Agents emit URL-safe base64; accept standard as a fallback.
    let signature_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_base64)
        .or_else(|_| general_purpose::STANDARD.decode(signature_base64))
        .map_err(|e| {
            log::warn!(
                "{} SIGNATURE_DECODE_FAILED agent_id={} error={}",
                ctx,
                agent_id,
                e
            );
            PipelineError::SignatureInvalid {
                agent_id: agent_id.to_string(),
                detail: format!("signature decode failed: {}", e),
            }
        })?;

    let signature = Signature::from_slice(&signature_bytes).map_err(|e| {
        log::warn!(
            "{} SIGNATURE_PARSE_FAILED agent_id={} error={}",
            ctx,
            agent_id,
            e
        );
        PipelineError::SignatureInvalid {
            agent_id: agent_id.to_string(),
            detail: format!("signature parse failed: {}", e),
        }
    })?;

    match verifying_key.verify(payload, &signature) {
        Ok(()) => {
            log::debug!("{} SIGNATURE_VERIFIED agent_id={}", ctx, agent_id);
            Ok(())
        }
        Err(e) => {
            log::warn!("{} SIGNATURE_INVALID agent_id={} error={}", ctx, agent_id, e);
            Err(PipelineError::SignatureInvalid {
                agent_id: agent_id.to_string(),
                detail: format!("verification failed: {}", e),
            })
        }
    }
}
