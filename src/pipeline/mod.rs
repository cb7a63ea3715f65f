//! Pipeline orchestration module.
//!
//! Coordinates the per-trace control flow:
//! - Inbound signature verification
//! - Schema lookup and validation
//! - Security sanitization
//! - Retention-tier branch: field extraction or scrub-and-seal

pub mod context;
pub mod ingestion;
pub mod scrub_gate;
pub mod trace;

pub use context::*;
pub use ingestion::*;
pub use scrub_gate::*;
pub use trace::*;
