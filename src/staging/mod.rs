//! Case law staging module.
//!
//! Candidate records and their one-directional review workflow.

pub mod candidate;

pub use candidate::*;
