//! Structured logging with trace context.
//!
//! Provides a log-line prefix carrying batch_id and trace_id so every
//! decision point can be correlated.

pub mod structured;

pub use structured::*;
