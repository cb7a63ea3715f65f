//! Signing key lifecycle management.
//!
//! A single authoritative store of signing keys: installation of
//! already-provisioned key material, expiry, one-way revocation, and
//! resolution of "the current usable key" for the envelope engine and
//! "the public key for this key id" for verification.
//!
//! Historical envelopes always resolve by the key id stored in the
//! envelope, never by the current key, so rotation never breaks
//! re-verification of past scrubs.

use std::collections::HashMap;
use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey as Ed25519Secret, VerifyingKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// What a key may be used for. Closed enumeration; purposes are
/// mutually exclusive per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPurpose {
    Scrub,
    Audit,
    Api,
}

impl KeyPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPurpose::Scrub => "scrub",
            KeyPurpose::Audit => "audit",
            KeyPurpose::Api => "api",
        }
    }
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked signing key. Secret material is present only for keys this
/// process may sign with; verification-only entries carry just the
/// public half.
#[derive(Debug, Clone)]
pub struct SigningKeyRecord {
    pub key_id: String,
    pub purpose: KeyPurpose,
    pub public_key: VerifyingKey,
    secret: Option<Ed25519Secret>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl SigningKeyRecord {
    /// Usable for signing: secret present, not expired, not revoked.
    pub fn usable_at(&self, now: DateTime<Utc>) -> bool {
        if self.secret.is_none() || self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(exp) => now < exp,
            None => true,
        }
    }

    /// Validity window check for a recorded scrub timestamp:
    /// created_at <= ts < expires_at, and not revoked before ts.
    pub fn valid_at(&self, ts: DateTime<Utc>) -> bool {
        if ts < self.created_at {
            return false;
        }
        if let Some(exp) = self.expires_at {
            if ts >= exp {
                return false;
            }
        }
        match self.revoked_at {
            Some(rev) => ts < rev,
            None => true,
        }
    }
}

/// Snapshot of the active signing key handed to the envelope engine.
/// Holds its own copy of the secret so the store lock is released
/// before any signing work happens.
#[derive(Debug, Clone)]
pub struct ActiveKey {
    pub key_id: String,
    secret: Ed25519Secret,
}

impl ActiveKey {
    pub fn sign(&self, message: &[u8]) -> ed25519_dalek::Signature {
        use ed25519_dalek::Signer;
        self.secret.sign(message)
    }
}

/// Authoritative key store. All state transitions go through the write
/// lock so "current usable key" queries never observe a half-applied
/// revocation or installation.
#[derive(Debug, Default)]
pub struct KeyLifecycleManager {
    keys: RwLock<HashMap<String, SigningKeyRecord>>,
}

impl KeyLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install provisioned secret key material (base64, 32 bytes).
    /// The public half is derived from the secret.
    pub fn install_key(
        &self,
        key_id: &str,
        purpose: KeyPurpose,
        secret_base64: &str,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), PipelineError> {
        let bytes = decode_key_bytes(key_id, secret_base64)?;
        let secret = Ed25519Secret::from_bytes(&bytes);
        let public_key = secret.verifying_key();

        self.insert(SigningKeyRecord {
            key_id: key_id.to_string(),
            purpose,
            public_key,
            secret: Some(secret),
            created_at,
            expires_at,
            revoked_at: None,
            revocation_reason: None,
        })
    }

    /// Install a verification-only public key (base64, 32 bytes), e.g. a
    /// rotated-out key kept for re-verifying historical envelopes.
    pub fn install_public_key(
        &self,
        key_id: &str,
        purpose: KeyPurpose,
        public_base64: &str,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), PipelineError> {
        let bytes = decode_key_bytes(key_id, public_base64)?;
        let public_key =
            VerifyingKey::from_bytes(&bytes).map_err(|e| PipelineError::InvalidKeyMaterial {
                key_id: key_id.to_string(),
                detail: format!("invalid public key: {}", e),
            })?;

        self.insert(SigningKeyRecord {
            key_id: key_id.to_string(),
            purpose,
            public_key,
            secret: None,
            created_at,
            expires_at,
            revoked_at: None,
            revocation_reason: None,
        })
    }

    fn insert(&self, record: SigningKeyRecord) -> Result<(), PipelineError> {
        let mut keys = self.keys.write();
        if keys.contains_key(&record.key_id) {
            return Err(PipelineError::DuplicateKey {
                key_id: record.key_id,
            });
        }
        log::info!(
            "KEY_INSTALLED key_id={} purpose={} expires_at={:?}",
            record.key_id,
            record.purpose,
            record.expires_at
        );
        keys.insert(record.key_id.clone(), record);
        Ok(())
    }

    /// Resolve the most recently created usable key of the given purpose.
    pub fn current_signing_key(&self, purpose: KeyPurpose) -> Result<ActiveKey, PipelineError> {
        let now = Utc::now();
        let keys = self.keys.read();

        let newest = keys
            .values()
            .filter(|k| k.purpose == purpose && k.usable_at(now))
            .max_by_key(|k| k.created_at);

        match newest {
            Some(record) => {
                // usable_at guarantees the secret is present
                let secret = record.secret.clone().ok_or_else(|| {
                    PipelineError::NoUsableSigningKey { purpose }
                })?;
                Ok(ActiveKey {
                    key_id: record.key_id.clone(),
                    secret,
                })
            }
            None => {
                log::warn!("KEY_LOOKUP_EMPTY purpose={}", purpose);
                Err(PipelineError::NoUsableSigningKey { purpose })
            }
        }
    }

    /// Resolve a public key by key id, for envelope verification.
    pub fn public_key(&self, key_id: &str) -> Result<VerifyingKey, PipelineError> {
        self.keys
            .read()
            .get(key_id)
            .map(|k| k.public_key)
            .ok_or_else(|| PipelineError::UnknownKey {
                key_id: key_id.to_string(),
            })
    }

    /// Whether the key's validity window contains `ts`.
    pub fn key_valid_at(&self, key_id: &str, ts: DateTime<Utc>) -> Result<bool, PipelineError> {
        self.keys
            .read()
            .get(key_id)
            .map(|k| k.valid_at(ts))
            .ok_or_else(|| PipelineError::UnknownKey {
                key_id: key_id.to_string(),
            })
    }

    /// Revoke a key. One-way and permanent; a second revoke is rejected.
    pub fn revoke(&self, key_id: &str, reason: &str) -> Result<(), PipelineError> {
        let mut keys = self.keys.write();
        let record = keys.get_mut(key_id).ok_or_else(|| PipelineError::UnknownKey {
            key_id: key_id.to_string(),
        })?;

        if record.revoked_at.is_some() {
            return Err(PipelineError::AlreadyRevoked {
                key_id: key_id.to_string(),
            });
        }

        record.revoked_at = Some(Utc::now());
        record.revocation_reason = Some(reason.to_string());

        log::warn!("KEY_REVOKED key_id={} reason={}", key_id, reason);
        Ok(())
    }

    pub fn key_count(&self) -> usize {
        self.keys.read().len()
    }

    /// Snapshot of a record's lifecycle fields, for inspection and storage.
    pub fn record(&self, key_id: &str) -> Option<SigningKeyRecord> {
        self.keys.read().get(key_id).cloned()
    }
}

fn decode_key_bytes(key_id: &str, encoded: &str) -> Result<[u8; 32], PipelineError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| PipelineError::InvalidKeyMaterial {
            key_id: key_id.to_string(),
            detail: format!("base64 decode failed: {}", e),
        })?;

    bytes
        .try_into()
        .map_err(|_| PipelineError::InvalidKeyMaterial {
            key_id: key_id.to_string(),
            detail: "expected 32 bytes".to_string(),
        })
}
