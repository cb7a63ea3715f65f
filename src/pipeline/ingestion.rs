//! Main trace ingestion pipeline.
//!
//! Per-trace control flow:
//! 1. Inbound signature verification (reject before anything else runs)
//! 2. Payload parse (malformed input is quarantined with a content hash)
//! 3. Schema rule lookup and structural validation
//! 4. Security sanitization
//! 5. Branch on retention tier: reduced-field extraction, or
//!    scrub-and-seal through the provenance envelope engine
//!
//! Traces are independent units of work; nothing here orders one trace
//! relative to another. The scrub gate bounds in-flight scrubs.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::envelope::{content_hash, seal_trace, verify_envelope};
use crate::error::PipelineError;
use crate::extraction::fields::extract_fields;
use crate::keys::KeyLifecycleManager;
use crate::pipeline::context::BatchContext;
use crate::pipeline::scrub_gate::ScrubGate;
use crate::pipeline::trace::{RetentionTier, Trace, TraceBody, TraceSubmission};
use crate::security::pii::PiiScrubber;
use crate::security::sanitizer::{Detection, Sanitizer};
use crate::validation::schema::SchemaRegistry;
use crate::validation::signature::{verify_submission, AgentKeyDirectory};

/// Default bound on concurrently in-flight scrub operations.
const DEFAULT_SCRUB_IN_FLIGHT: usize = 8;

/// Outcome of ingesting a single submission.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Verified, validated, sanitized; persisted artifacts attached.
    Accepted {
        trace: Trace,
        /// Reduced-field projection (reduced_fields tier only).
        projection: Option<BTreeMap<String, Value>>,
        /// Flag-only sanitizer detections recorded alongside the trace.
        flagged: Vec<Detection>,
        /// Set when sealing failed with `NoUsableSigningKey`: the
        /// original body is retained untouched and the scrub is retried
        /// once a key becomes available.
        scrub_deferred: Option<PipelineError>,
    },
    /// Kept inspectable: schema failures, sanitizer rejections,
    /// malformed payloads.
    Quarantined {
        trace_id: String,
        content_hash: String,
        reason: PipelineError,
    },
    /// Discarded: the signature did not verify.
    Rejected {
        trace_id: String,
        reason: PipelineError,
    },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }
}

/// Result of processing a batch.
#[derive(Debug)]
pub struct BatchResult {
    pub received: usize,
    pub accepted: usize,
    pub quarantined: usize,
    pub rejected: usize,
    pub outcomes: Vec<IngestOutcome>,
}

/// The ingestion pipeline. Owns the schema registry, the agent key
/// directory, the sanitizer and scrubber configurations, and the signing
/// key store.
pub struct Pipeline {
    registry: SchemaRegistry,
    agent_keys: AgentKeyDirectory,
    sanitizer: Sanitizer,
    scrubber: PiiScrubber,
    signing_keys: KeyLifecycleManager,
    scrub_gate: ScrubGate,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            registry: SchemaRegistry::new(),
            agent_keys: AgentKeyDirectory::new(),
            sanitizer: Sanitizer::new(),
            scrubber: PiiScrubber::default_patterns(),
            signing_keys: KeyLifecycleManager::new(),
            scrub_gate: ScrubGate::new(DEFAULT_SCRUB_IN_FLIGHT),
        }
    }

    pub fn with_scrub_limit(mut self, max_in_flight: usize) -> Self {
        self.scrub_gate = ScrubGate::new(max_in_flight);
        self
    }

    pub fn with_scrubber(mut self, scrubber: PiiScrubber) -> Self {
        self.scrubber = scrubber;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn agent_keys(&self) -> &AgentKeyDirectory {
        &self.agent_keys
    }

    pub fn signing_keys(&self) -> &KeyLifecycleManager {
        &self.signing_keys
    }

    /// Process a batch of submissions.
    pub fn ingest_batch(
        &self,
        ctx: &BatchContext,
        submissions: Vec<TraceSubmission>,
    ) -> BatchResult {
        let received = submissions.len();
        log::info!(
            "{} BATCH_RECEIVED traces={}",
            ctx.log_context(),
            received
        );

        let mut outcomes = Vec::with_capacity(received);
        let mut accepted = 0;
        let mut quarantined = 0;
        let mut rejected = 0;

        for submission in submissions {
            let outcome = self.ingest(ctx, submission);
            match &outcome {
                IngestOutcome::Accepted { .. } => accepted += 1,
                IngestOutcome::Quarantined { .. } => quarantined += 1,
                IngestOutcome::Rejected { .. } => rejected += 1,
            }
            outcomes.push(outcome);
        }

        log::info!(
            "{} BATCH_COMPLETE received={} accepted={} quarantined={} rejected={}",
            ctx.log_context(),
            received,
            accepted,
            quarantined,
            rejected
        );

        BatchResult {
            received,
            accepted,
            quarantined,
            rejected,
            outcomes,
        }
    }

    /// Process a single submission.
    pub fn ingest(&self, ctx: &BatchContext, submission: TraceSubmission) -> IngestOutcome {
        let log_ctx = ctx.trace_log_context(&submission.trace_id);
        log::debug!("{} TRACE_PROCESS_START type={}", log_ctx, submission.trace_type);

        // [1] INBOUND SIGNATURE. Rejection discards the trace before any
        // other processing; nothing downstream sees unverified content.
        if let Err(reason) = verify_submission(
            &self.agent_keys,
            submission.payload.as_bytes(),
            &submission.agent_id,
            &submission.signature,
            &log_ctx,
        ) {
            return IngestOutcome::Rejected {
                trace_id: submission.trace_id,
                reason,
            };
        }

        // [2] PARSE
        let payload: Value = match serde_json::from_str(&submission.payload) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("{} TRACE_PARSE_FAILED error={}", log_ctx, e);
                return self.quarantine(&submission, PipelineError::MalformedPayload(e), &log_ctx);
            }
        };

        // [3] SCHEMA LOOKUP + VALIDATION
        let rule = match self
            .registry
            .resolve(&submission.trace_type, submission.schema_version, &log_ctx)
        {
            Ok(rule) => rule,
            Err(reason) => return self.quarantine(&submission, reason, &log_ctx),
        };
        if let Err(reason) = rule.validate(&payload, &log_ctx) {
            return self.quarantine(&submission, reason, &log_ctx);
        }

        // [4] SANITIZATION
        let flagged = match self.sanitizer.enforce(&payload, &log_ctx) {
            Ok(flagged) => flagged,
            Err(reason) => return self.quarantine(&submission, reason, &log_ctx),
        };

        let mut trace = Trace {
            trace_id: submission.trace_id,
            timestamp: submission.timestamp,
            retention_tier: submission.retention_tier,
            trace_type: submission.trace_type,
            schema_version: rule.version,
            agent_id: submission.agent_id,
            agent_signature: submission.signature,
            body: TraceBody::Original { body: payload },
        };

        // [5] RETENTION BRANCH
        let (projection, scrub_deferred) = match trace.retention_tier {
            RetentionTier::ReducedFields => {
                let projection = extract_fields(trace.body.value(), &rule, &log_ctx);
                (Some(projection), None)
            }
            RetentionTier::FullBody => {
                let _permit = self.scrub_gate.acquire();
                match seal_trace(&mut trace, &self.scrubber, &self.signing_keys, &log_ctx) {
                    Ok(_) => (None, None),
                    Err(e @ PipelineError::NoUsableSigningKey { .. }) => {
                        // Retain-until-scrubbable: the trace is accepted
                        // with its original body; sealing is retried once
                        // a usable key exists. Never delete before a
                        // successful scrub.
                        log::error!("{} SCRUB_DEFERRED error={}", log_ctx, e);
                        (None, Some(e))
                    }
                    Err(e) => {
                        log::error!("{} SCRUB_FAILED error={}", log_ctx, e);
                        return self.quarantine_trace(&trace, e, &log_ctx);
                    }
                }
            }
        };

        log::info!(
            "{} TRACE_COMPLETE tier={} scrubbed={} flagged={}",
            log_ctx,
            trace.retention_tier.as_str(),
            trace.body.is_scrubbed(),
            flagged.len()
        );

        IngestOutcome::Accepted {
            trace,
            projection,
            flagged,
            scrub_deferred,
        }
    }

    /// Retry sealing for an accepted trace whose scrub was deferred.
    pub fn retry_seal(&self, ctx: &BatchContext, trace: &mut Trace) -> Result<(), PipelineError> {
        let log_ctx = ctx.trace_log_context(&trace.trace_id);
        let _permit = self.scrub_gate.acquire();
        seal_trace(trace, &self.scrubber, &self.signing_keys, &log_ctx).map(|_| ())
    }

    /// Re-verify a sealed trace's envelope.
    pub fn verify_trace(&self, trace: &Trace) -> Result<(), PipelineError> {
        verify_envelope(trace, &self.signing_keys)
    }

    fn quarantine(
        &self,
        submission: &TraceSubmission,
        reason: PipelineError,
        log_ctx: &crate::logging::structured::LogContext,
    ) -> IngestOutcome {
        log::warn!("{} TRACE_QUARANTINED reason={}", log_ctx, reason);
        IngestOutcome::Quarantined {
            trace_id: submission.trace_id.clone(),
            content_hash: content_hash(&submission.payload),
            reason,
        }
    }

    fn quarantine_trace(
        &self,
        trace: &Trace,
        reason: PipelineError,
        log_ctx: &crate::logging::structured::LogContext,
    ) -> IngestOutcome {
        log::warn!("{} TRACE_QUARANTINED reason={}", log_ctx, reason);
        IngestOutcome::Quarantined {
            trace_id: trace.trace_id.clone(),
            content_hash: content_hash(&trace.body.value().to_string()),
            reason,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
