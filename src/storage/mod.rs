//! Storage module.
//!
//! Row models and SQL builders. Execution is handled by the external
//! store collaborator; this module fixes the shapes and the atomicity
//! guards.

pub mod models;
pub mod queries;

pub use models::*;
pub use queries::*;
