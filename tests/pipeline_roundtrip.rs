//! End-to-end pipeline scenarios: sign, ingest, scrub, seal, verify.

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::json;

use tracegate_core::{
    BatchContext, CandidateStatus, CaseLawCandidate, IngestOutcome, KeyPurpose, Pipeline,
    PipelineError, RetentionTier, StagingLedger, TraceBody, TraceSubmission,
};

const AGENT_ID: &str = "agent-echo";

fn agent_secret() -> SigningKey {
    SigningKey::from_bytes(&[17u8; 32])
}

/// A pipeline with one agent key, one schema rule for `agent_step`, and
/// one active scrub key.
fn pipeline() -> Pipeline {
    tracegate_core::init_logger();
    let pipeline = Pipeline::new().with_scrub_limit(2);

    let public_b64 = general_purpose::STANDARD.encode(agent_secret().verifying_key().to_bytes());
    pipeline.agent_keys().load_key(AGENT_ID, &public_b64).unwrap();
    pipeline.agent_keys().mark_loaded();

    pipeline.registry().load_from_rows(
        vec![("agent_step".to_string(), 1, true, "v1".to_string())],
        vec![
            (
                "agent_step".to_string(),
                1,
                "task".to_string(),
                "task".to_string(),
                "string".to_string(),
                true,
                "task".to_string(),
            ),
            (
                "agent_step".to_string(),
                1,
                "score".to_string(),
                "result.score".to_string(),
                "float".to_string(),
                false,
                "score".to_string(),
            ),
        ],
        vec![("agent_step".to_string(), 1, "task".to_string())],
    );

    let scrub_secret = general_purpose::STANDARD.encode([23u8; 32]);
    pipeline
        .signing_keys()
        .install_key("scrub-2026a", KeyPurpose::Scrub, &scrub_secret, Utc::now(), None)
        .unwrap();

    pipeline
}

fn submission(trace_id: &str, payload: &str, tier: RetentionTier) -> TraceSubmission {
    TraceSubmission {
        trace_id: trace_id.to_string(),
        trace_type: "agent_step".to_string(),
        schema_version: None,
        timestamp: Utc::now(),
        retention_tier: tier,
        payload: payload.to_string(),
        agent_id: AGENT_ID.to_string(),
        signature: general_purpose::URL_SAFE_NO_PAD
            .encode(agent_secret().sign(payload.as_bytes()).to_bytes()),
    }
}

#[test]
fn ssn_is_scrubbed_and_envelope_verifies() {
    let pipeline = pipeline();
    let ctx = BatchContext::new();

    let payload = r#"{"task":"verify identity, SSN: 123-45-6789"}"#;
    let outcome = pipeline.ingest(&ctx, submission("t-1", payload, RetentionTier::FullBody));

    let trace = match outcome {
        IngestOutcome::Accepted { trace, .. } => trace,
        other => panic!("expected accept, got {:?}", other),
    };

    assert!(trace.body.is_scrubbed());
    assert_eq!(
        trace.body.value()["task"],
        json!("verify identity, SSN: [REDACTED]")
    );

    let envelope = trace.body.envelope().unwrap();
    assert_eq!(envelope.original_content_hash.len(), 64);
    assert_eq!(envelope.scrub_key_id, "scrub-2026a");
    assert!(envelope.pii_scrubbed);

    pipeline.verify_trace(&trace).unwrap();
}

#[test]
fn flipping_a_byte_of_the_scrubbed_body_breaks_verification() {
    let pipeline = pipeline();
    let ctx = BatchContext::new();

    let payload = r#"{"task":"email bob@example.org about the incident"}"#;
    let mut trace = match pipeline.ingest(&ctx, submission("t-2", payload, RetentionTier::FullBody))
    {
        IngestOutcome::Accepted { trace, .. } => trace,
        other => panic!("expected accept, got {:?}", other),
    };
    pipeline.verify_trace(&trace).unwrap();

    if let TraceBody::Scrubbed { body, .. } = &mut trace.body {
        let text = body["task"].as_str().unwrap().to_string();
        body["task"] = json!(format!("{}x", text));
    }

    let err = pipeline.verify_trace(&trace).unwrap_err();
    assert!(matches!(err, PipelineError::EnvelopeIntegrity { .. }));
}

#[test]
fn tampered_payload_is_rejected_before_schema_validation() {
    let pipeline = pipeline();
    let ctx = BatchContext::new();

    // Sign one payload, submit another, with a trace type the registry
    // does not know. Signature rejection must come first.
    let mut sub = submission("t-3", r#"{"task":"original"}"#, RetentionTier::ReducedFields);
    sub.payload = r#"{"task":"tampered"}"#.to_string();
    sub.trace_type = "never_registered".to_string();

    match pipeline.ingest(&ctx, sub) {
        IngestOutcome::Rejected { reason, .. } => {
            assert!(matches!(reason, PipelineError::SignatureInvalid { .. }));
        }
        other => panic!("expected reject, got {:?}", other),
    }
}

#[test]
fn revoking_the_only_scrub_key_defers_scrub_and_keeps_original() {
    let pipeline = pipeline();
    pipeline
        .signing_keys()
        .revoke("scrub-2026a", "suspected compromise")
        .unwrap();
    let ctx = BatchContext::new();

    let payload = r#"{"task":"SSN: 123-45-6789"}"#;
    let outcome = pipeline.ingest(&ctx, submission("t-4", payload, RetentionTier::FullBody));

    match outcome {
        IngestOutcome::Accepted {
            trace,
            scrub_deferred,
            ..
        } => {
            assert!(matches!(
                scrub_deferred,
                Some(PipelineError::NoUsableSigningKey { .. })
            ));
            assert!(!trace.body.is_scrubbed());
            assert_eq!(trace.body.value()["task"], json!("SSN: 123-45-6789"));
        }
        other => panic!("expected deferred accept, got {:?}", other),
    }
}

#[test]
fn sql_injection_never_reaches_extraction_or_sealing() {
    let pipeline = pipeline();
    let ctx = BatchContext::new();

    let payload = r#"{"task":"'; DROP TABLE users; --"}"#;
    for tier in [RetentionTier::ReducedFields, RetentionTier::FullBody] {
        let outcome = pipeline.ingest(&ctx, submission("t-5", payload, tier));
        match outcome {
            IngestOutcome::Quarantined { reason, .. } => {
                assert!(matches!(reason, PipelineError::SanitizationRejected { .. }));
            }
            other => panic!("expected quarantine, got {:?}", other),
        }
    }
}

#[test]
fn reduced_tier_extraction_is_idempotent_end_to_end() {
    let pipeline = pipeline();
    let ctx = BatchContext::new();

    let payload = r#"{"task":"summarize","result":{"score":0.75}}"#;
    let first = pipeline.ingest(&ctx, submission("t-6", payload, RetentionTier::ReducedFields));
    let second = pipeline.ingest(&ctx, submission("t-6", payload, RetentionTier::ReducedFields));

    let (p1, p2) = match (first, second) {
        (
            IngestOutcome::Accepted {
                projection: Some(p1),
                ..
            },
            IngestOutcome::Accepted {
                projection: Some(p2),
                ..
            },
        ) => (p1, p2),
        other => panic!("expected two accepts, got {:?}", other),
    };

    assert_eq!(p1, p2);
    assert_eq!(p1["task"], json!("summarize"));
    assert_eq!(p1["score"], json!(0.75));
}

#[test]
fn key_rotation_keeps_old_envelopes_verifiable() {
    let pipeline = pipeline();
    let ctx = BatchContext::new();

    let payload = r#"{"task":"call 555-123-4567"}"#;
    let trace = match pipeline.ingest(&ctx, submission("t-7", payload, RetentionTier::FullBody)) {
        IngestOutcome::Accepted { trace, .. } => trace,
        other => panic!("expected accept, got {:?}", other),
    };

    // Rotate: install a newer key; the envelope still names the old one.
    let newer = general_purpose::STANDARD.encode([24u8; 32]);
    pipeline
        .signing_keys()
        .install_key("scrub-2026b", KeyPurpose::Scrub, &newer, Utc::now(), None)
        .unwrap();

    assert_eq!(
        trace.body.envelope().unwrap().scrub_key_id,
        "scrub-2026a"
    );
    pipeline.verify_trace(&trace).unwrap();

    // New seals pick up the rotated key.
    let trace2 = match pipeline.ingest(&ctx, submission("t-8", payload, RetentionTier::FullBody)) {
        IngestOutcome::Accepted { trace, .. } => trace,
        other => panic!("expected accept, got {:?}", other),
    };
    assert_eq!(trace2.body.envelope().unwrap().scrub_key_id, "scrub-2026b");
}

#[test]
fn trace_deletion_cascades_to_staging_rows_only() {
    let pipeline = pipeline();
    let ctx = BatchContext::new();
    let ledger = StagingLedger::new();

    let payload = r#"{"task":"contact carol@example.net"}"#;
    let trace = match pipeline.ingest(&ctx, submission("t-9", payload, RetentionTier::FullBody)) {
        IngestOutcome::Accepted { trace, .. } => trace,
        other => panic!("expected accept, got {:?}", other),
    };

    ledger.stage(CaseLawCandidate::new(
        &trace.trace_id,
        trace.timestamp,
        "pii_handling",
    ));
    ledger.stage(CaseLawCandidate::new("t-other", Utc::now(), "pii_handling"));
    assert_eq!(ledger.list_by_status(CandidateStatus::Pending).len(), 2);

    // Trace deletion cascades; the unrelated candidate survives.
    let removed = ledger.on_trace_deleted(&trace.trace_id, trace.timestamp);
    assert_eq!(removed, 1);
    assert_eq!(ledger.len(), 1);

    // The reverse never happens: removing a candidate is a ledger-local
    // operation with no trace side effects, by construction.
    let survivors = ledger.list_by_pattern("pii_handling");
    assert_eq!(survivors[0].trace_id, "t-other");
}
