//! Scrubber and sealing throughput benchmarks.
//!
//! Benchmarks:
//! - PII scrubbing over string values (regex pass)
//! - Scrubbing nested JSON bodies of varying size
//! - Sanitizer scan over clean and hostile payloads
//! - Full seal (scrub + hash + sign) of a trace body

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use tracegate_core::envelope::{content_hash, seal_trace};
use tracegate_core::keys::{KeyLifecycleManager, KeyPurpose};
use tracegate_core::logging::structured::LogContext;
use tracegate_core::pipeline::trace::{RetentionTier, Trace, TraceBody};
use tracegate_core::security::pii::PiiScrubber;
use tracegate_core::security::sanitizer::Sanitizer;

const PII_TEXT: &str = "Contact alice@example.com or 555-867-5309, \
    server 192.168.1.12, card 4111-1111-1111-1111, SSN: 123-45-6789, \
    docs at https://internal.example.com/runbook";

const CLEAN_TEXT: &str = "Selected tool search_documents with confidence 0.92 \
    after evaluating 4 alternatives against the task rubric";

fn body_of_size(fields: usize) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for i in 0..fields {
        map.insert(format!("step_{i}"), json!(PII_TEXT));
    }
    json!({ "task": "triage", "steps": map })
}

fn bench_scrub_string(c: &mut Criterion) {
    let scrubber = PiiScrubber::default_patterns();
    let ctx = LogContext::new("bench");
    let body = json!({ "note": PII_TEXT });

    c.bench_function("scrub_pii_dense_string", |b| {
        b.iter(|| black_box(scrubber.scrub(black_box(&body), &ctx)))
    });

    let clean = json!({ "note": CLEAN_TEXT });
    c.bench_function("scrub_clean_string", |b| {
        b.iter(|| black_box(scrubber.scrub(black_box(&clean), &ctx)))
    });
}

fn bench_scrub_body_sizes(c: &mut Criterion) {
    let scrubber = PiiScrubber::default_patterns();
    let ctx = LogContext::new("bench");
    let mut group = c.benchmark_group("scrub_body_size");

    for fields in [1, 8, 64, 256].iter() {
        let body = body_of_size(*fields);
        group.bench_with_input(BenchmarkId::from_parameter(fields), &body, |b, body| {
            b.iter(|| black_box(scrubber.scrub(black_box(body), &ctx)))
        });
    }

    group.finish();
}

fn bench_sanitizer_scan(c: &mut Criterion) {
    let sanitizer = Sanitizer::new();
    let ctx = LogContext::new("bench");
    let clean = json!({ "task": CLEAN_TEXT, "result": { "score": 0.92 } });
    let hostile = json!({ "task": "'; DROP TABLE users; --", "note": "<script>alert(1)</script>" });

    c.bench_function("sanitize_clean_body", |b| {
        b.iter(|| black_box(sanitizer.scan(black_box(&clean), &ctx)))
    });
    c.bench_function("sanitize_hostile_body", |b| {
        b.iter(|| black_box(sanitizer.scan(black_box(&hostile), &ctx)))
    });
}

fn bench_content_hash(c: &mut Criterion) {
    let body = body_of_size(64).to_string();

    c.bench_function("content_hash_64_fields", |b| {
        b.iter(|| black_box(content_hash(black_box(&body))))
    });
}

fn bench_full_seal(c: &mut Criterion) {
    let keys = KeyLifecycleManager::new();
    let secret = general_purpose::STANDARD.encode([7u8; 32]);
    keys.install_key("scrub-bench", KeyPurpose::Scrub, &secret, Utc::now(), None)
        .unwrap();
    let scrubber = PiiScrubber::default_patterns();
    let ctx = LogContext::new("bench");
    let body = body_of_size(8);

    c.bench_function("seal_trace_8_fields", |b| {
        b.iter(|| {
            let mut trace = Trace {
                trace_id: "bench-trace".to_string(),
                timestamp: Utc::now(),
                retention_tier: RetentionTier::FullBody,
                trace_type: "agent_step".to_string(),
                schema_version: 1,
                agent_id: "agent-bench".to_string(),
                agent_signature: String::new(),
                body: TraceBody::Original { body: body.clone() },
            };
            black_box(seal_trace(&mut trace, &scrubber, &keys, &ctx)).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_scrub_string,
    bench_scrub_body_sizes,
    bench_sanitizer_scan,
    bench_content_hash,
    bench_full_seal,
);

criterion_main!(benches);
