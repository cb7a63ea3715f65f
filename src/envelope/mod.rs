//! Provenance envelope module.
//!
//! Content hashing, scrub signing, envelope assembly, and re-verification
//! of sealed traces.

pub mod engine;

pub use engine::*;
