//! SQL builders for the persisted trace store.
//!
//! Query text only; execution belongs to the storage collaborator. The
//! envelope update is a single statement guarded on `pii_scrubbed =
//! FALSE`, so sealing is atomic per trace and idempotent at the row
//! level, and no reader can observe a half-populated envelope.

/// Columns of the traces table, in insert order.
pub fn trace_columns() -> Vec<(&'static str, &'static str)> {
    vec![
        ("trace_id", "$1"),
        ("timestamp", "$2"),
        ("retention_tier", "$3"),
        ("trace_type", "$4"),
        ("schema_version", "$5"),
        ("agent_id", "$6"),
        ("agent_signature", "$7"),
        ("body", "$8"),
        // Envelope columns: null until sealed, then populated together.
        ("pii_scrubbed", "$9"),
        ("original_content_hash", "$10"),
        ("scrub_timestamp", "$11"),
        ("scrub_signature", "$12"),
        ("scrub_key_id", "$13"),
    ]
}

/// INSERT for the traces table.
pub fn build_trace_insert() -> String {
    let columns = trace_columns();
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<&str> = columns.iter().map(|(_, ph)| *ph).collect();

    format!(
        "INSERT INTO tracegate.traces ({}) VALUES ({}) ON CONFLICT (trace_id, timestamp) DO NOTHING",
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Atomic seal: replaces the body and populates every envelope column in
/// one statement. The `pii_scrubbed = FALSE` guard makes re-runs no-ops
/// and keeps the original body intact on any earlier failure.
pub fn build_envelope_update() -> &'static str {
    r#"
    UPDATE tracegate.traces
    SET body = $3,
        pii_scrubbed = TRUE,
        original_content_hash = $4,
        scrub_timestamp = $5,
        scrub_signature = $6,
        scrub_key_id = $7
    WHERE trace_id = $1 AND timestamp = $2 AND pii_scrubbed = FALSE
    "#
}

/// DDL for the traces table. The CHECK constraint enforces the
/// envelope iff-invariant at the storage layer as well.
pub fn build_traces_table() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS tracegate.traces (
        trace_id TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        retention_tier TEXT NOT NULL,
        trace_type TEXT NOT NULL,
        schema_version INTEGER NOT NULL,
        agent_id TEXT NOT NULL,
        agent_signature TEXT NOT NULL,
        body JSONB NOT NULL,
        pii_scrubbed BOOLEAN NOT NULL DEFAULT FALSE,
        original_content_hash TEXT,
        scrub_timestamp TIMESTAMPTZ,
        scrub_signature TEXT,
        scrub_key_id TEXT,
        PRIMARY KEY (trace_id, timestamp),
        CHECK (
            (pii_scrubbed
                AND original_content_hash IS NOT NULL
                AND scrub_timestamp IS NOT NULL
                AND scrub_signature IS NOT NULL
                AND scrub_key_id IS NOT NULL)
            OR (NOT pii_scrubbed
                AND original_content_hash IS NULL
                AND scrub_timestamp IS NULL
                AND scrub_signature IS NULL
                AND scrub_key_id IS NULL)
        )
    )
    "#
}

/// DDL for the signing key table; the purpose column is a closed
/// enumeration.
pub fn build_signing_keys_table() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS tracegate.signing_keys (
        key_id TEXT PRIMARY KEY,
        purpose TEXT NOT NULL CHECK (purpose IN ('scrub', 'audit', 'api')),
        public_key TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ,
        revoked_at TIMESTAMPTZ,
        revocation_reason TEXT
    )
    "#
}

/// INSERT for the signing key table.
pub fn build_signing_key_insert() -> &'static str {
    r#"
    INSERT INTO tracegate.signing_keys
        (key_id, purpose, public_key, created_at, expires_at, revoked_at, revocation_reason)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#
}

/// One-way revocation; the `revoked_at IS NULL` guard rejects re-revokes.
pub fn build_key_revoke_update() -> &'static str {
    r#"
    UPDATE tracegate.signing_keys
    SET revoked_at = $2, revocation_reason = $3
    WHERE key_id = $1 AND revoked_at IS NULL
    "#
}

/// DDL for the staging table. Deleting a trace cascades to its
/// candidates; candidate rows never touch the trace.
pub fn build_candidates_table() -> &'static str {
    r#"
    CREATE TABLE IF NOT EXISTS tracegate.case_law_candidates (
        candidate_id TEXT PRIMARY KEY,
        trace_id TEXT NOT NULL,
        trace_timestamp TIMESTAMPTZ NOT NULL,
        pattern_class TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected')),
        created_at TIMESTAMPTZ NOT NULL,
        published BOOLEAN NOT NULL DEFAULT FALSE,
        published_at TIMESTAMPTZ,
        compendium_id TEXT,
        FOREIGN KEY (trace_id, trace_timestamp)
            REFERENCES tracegate.traces (trace_id, timestamp)
            ON DELETE CASCADE
    )
    "#
}

/// INSERT for the staging table.
pub fn build_candidate_insert() -> &'static str {
    r#"
    INSERT INTO tracegate.case_law_candidates
        (candidate_id, trace_id, trace_timestamp, pattern_class, status,
         created_at, published, published_at, compendium_id)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    "#
}

/// INSERT for the quarantine table.
pub fn build_quarantine_insert() -> &'static str {
    r#"
    INSERT INTO tracegate.quarantined_traces
        (trace_id, content_hash, reason, received_at)
    VALUES ($1, $2, $3, $4)
    "#
}

/// Scrubbed full-fidelity traces, most recent first.
pub fn build_list_scrubbed_recent() -> &'static str {
    r#"
    SELECT * FROM tracegate.traces
    WHERE pii_scrubbed AND retention_tier = 'full_body'
    ORDER BY timestamp DESC
    LIMIT $1
    "#
}

/// Staging candidates by status, most recent first.
pub fn build_list_candidates_by_status() -> &'static str {
    r#"
    SELECT * FROM tracegate.case_law_candidates
    WHERE status = $1
    ORDER BY created_at DESC
    LIMIT $2
    "#
}

/// Staging candidates by pattern classification, most recent first.
pub fn build_list_candidates_by_pattern() -> &'static str {
    r#"
    SELECT * FROM tracegate.case_law_candidates
    WHERE pattern_class = $1
    ORDER BY created_at DESC
    LIMIT $2
    "#
}
