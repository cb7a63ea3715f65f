//! Security module.
//!
//! Injection sanitization and ordered PII scrubbing for trace payloads.

pub mod pii;
pub mod sanitizer;

pub use pii::*;
pub use sanitizer::*;
