//! Key lifecycle module.
//!
//! Tracks signing keys (creation, expiry, revocation) and resolves the
//! current usable key per purpose, plus public keys by id for
//! verification of historical envelopes.

pub mod lifecycle;

pub use lifecycle::*;
