//! Tracegate Core - trace ingestion with provenance-sealed scrubbing
//!
//! This crate is the core pipeline for ingesting trace events emitted by
//! autonomous agents. The implementation prioritizes:
//!
//! 1. **Security** - Defense-in-depth: signature-first, schema-driven
//!    validation, injection sanitization before any value is trusted
//! 2. **Provenance** - Scrubbed bodies carry a hash of the original
//!    content and an Ed25519 signature under a managed key, so the
//!    replacement stays verifiable after the original is gone
//! 3. **Logging** - Every decision point logged with batch/trace context
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `pipeline` - Ingestion orchestrator, trace types, scrub backpressure
//! - `validation` - Schema rule registry and inbound signature checks
//! - `security` - Injection sanitizer and ordered PII scrubbing
//! - `extraction` - Reduced-field projection from schema directives
//! - `envelope` - Content hashing, scrub signing, envelope verification
//! - `keys` - Signing key lifecycle (install, expiry, revocation)
//! - `staging` - Case law candidate workflow
//! - `storage` - Row models and SQL builders
//! - `logging` - Structured logging with trace context
//! - `error` - The pipeline error taxonomy

pub mod envelope;
pub mod error;
pub mod extraction;
pub mod keys;
pub mod logging;
pub mod pipeline;
pub mod security;
pub mod staging;
pub mod storage;
pub mod validation;

pub use envelope::{content_hash, seal_trace, verify_envelope, ScrubEnvelope};
pub use error::PipelineError;
pub use keys::{KeyLifecycleManager, KeyPurpose, SigningKeyRecord};
pub use pipeline::{
    BatchContext, BatchResult, IngestOutcome, Pipeline, RetentionTier, ScrubGate, Trace,
    TraceBody, TraceSubmission,
};
pub use security::{MaskPolicy, PiiPattern, PiiScrubber, SanitizePolicy, Sanitizer};
pub use staging::{CandidateStatus, CaseLawCandidate, StagingLedger};
pub use validation::{AgentKeyDirectory, SchemaRegistry, SchemaRule};

/// Initialize the process-level logger. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}
