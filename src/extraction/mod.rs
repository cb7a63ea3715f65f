//! Field extraction module.
//!
//! Schema-driven reduced-field projection for traces stored below
//! full fidelity.

pub mod fields;
pub mod json_path;

pub use fields::*;
pub use json_path::*;
