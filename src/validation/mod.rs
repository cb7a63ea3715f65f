//! Validation module.
//!
//! Inbound trace validation:
//! - Schema rule registry and structural validation (control-store driven)
//! - Ed25519 verification of agent signatures

pub mod schema;
pub mod signature;

pub use schema::*;
pub use signature::*;
