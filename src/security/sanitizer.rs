//! Security sanitization for trace payloads.
//!
//! Scans string-valued fields for injection payloads before any value is
//! trusted downstream:
//! - Markup/script injection markers
//! - SQL-injection token sequences
//! - OS command-injection markers
//! - Path traversal markers
//!
//! Detection is pattern-based and total: malformed input is a detection
//! signal, never a crash. The default policy rejects and flags rather
//! than silently stripping, because silent stripping can destroy
//! evidentiary value.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::PipelineError;
use crate::logging::structured::LogContext;

/// Size limits for trace payloads.
pub const MAX_FIELD_SIZE: usize = 100_000; // 100KB per string field
pub const MAX_TRACE_SIZE: usize = 10_000_000; // 10MB per trace

/// Threat category of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreatCategory {
    Markup,
    Sql,
    Command,
    PathTraversal,
    Oversize,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::Markup => "markup",
            ThreatCategory::Sql => "sql",
            ThreatCategory::Command => "command",
            ThreatCategory::PathTraversal => "path_traversal",
            ThreatCategory::Oversize => "oversize",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a category fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizePolicy {
    /// Quarantine the trace; content is flagged, never silently cleaned.
    Reject,
    /// Record the detection but let the trace continue.
    FlagOnly,
}

/// A single detection: which pattern fired, where.
#[derive(Debug, Clone)]
pub struct Detection {
    pub category: ThreatCategory,
    pub pattern: String,
    pub path: String,
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.category, self.path, self.pattern)
    }
}

lazy_static! {
    /// Markup/script injection markers.
    static ref MARKUP_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)<script[^>]*>").unwrap(),
        Regex::new(r"(?i)javascript:").unwrap(),
        Regex::new(r"(?i)on\w+\s*=").unwrap(),
        Regex::new(r"(?i)<iframe[^>]*>").unwrap(),
        Regex::new(r"(?i)<object[^>]*>").unwrap(),
        Regex::new(r"(?i)<embed[^>]*>").unwrap(),
    ];

    /// SQL-injection token sequences indicative of query break-out.
    static ref SQL_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)'\s*(or|and)\s*'?\d").unwrap(),
        Regex::new(r"(?i);\s*(drop|delete|truncate|alter)\s").unwrap(),
        Regex::new(r"(?i)union\s+(all\s+)?select").unwrap(),
        Regex::new(r"(?i)'\s*;\s*--").unwrap(),
        Regex::new(r"(?i)--\s*$").unwrap(),
        Regex::new(r"(?i)/\*.*\*/").unwrap(),
    ];

    /// OS command-injection markers: shell metacharacters where plain
    /// data is expected.
    static ref COMMAND_PATTERNS: Vec<Regex> = vec![
        Regex::new(r";\s*(rm|cat|wget|curl|chmod)\s").unwrap(),
        Regex::new(r"\|\s*(bash|sh|zsh|cmd)").unwrap(),
        Regex::new(r"`[^`]+`").unwrap(),
        Regex::new(r"\$\([^)]+\)").unwrap(),
    ];

    /// Path traversal markers.
    static ref PATH_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"\.\.[\\/]").unwrap(),
        Regex::new(r"[\\/]etc[\\/](passwd|shadow)").unwrap(),
        Regex::new(r"[\\/](proc|sys)[\\/]").unwrap(),
    ];
}

/// Sanitizer with an ordered detector set and per-category /
/// per-field policies.
#[derive(Debug)]
pub struct Sanitizer {
    policies: HashMap<ThreatCategory, SanitizePolicy>,
    /// Top-level field name -> policy override. Lets operators mark a
    /// field that legitimately carries query text or shell transcripts.
    field_overrides: HashMap<String, SanitizePolicy>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        let mut policies = HashMap::new();
        policies.insert(ThreatCategory::Markup, SanitizePolicy::Reject);
        policies.insert(ThreatCategory::Sql, SanitizePolicy::Reject);
        policies.insert(ThreatCategory::Command, SanitizePolicy::Reject);
        policies.insert(ThreatCategory::PathTraversal, SanitizePolicy::Reject);
        policies.insert(ThreatCategory::Oversize, SanitizePolicy::Reject);
        Self {
            policies,
            field_overrides: HashMap::new(),
        }
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the policy for a threat category.
    pub fn set_policy(&mut self, category: ThreatCategory, policy: SanitizePolicy) {
        self.policies.insert(category, policy);
    }

    /// Override the policy for a specific top-level field.
    pub fn set_field_policy(&mut self, field: &str, policy: SanitizePolicy) {
        self.field_overrides.insert(field.to_string(), policy);
    }

    /// Scan the payload. Total: returns detections in a fixed order and
    /// never fails, whatever the input shape.
    pub fn scan(&self, payload: &Value, ctx: &LogContext) -> Vec<Detection> {
        let mut detections = Vec::new();

        let payload_len = payload.to_string().len();
        if payload_len > MAX_TRACE_SIZE {
            detections.push(Detection {
                category: ThreatCategory::Oversize,
                pattern: format!("trace size {} > {}", payload_len, MAX_TRACE_SIZE),
                path: String::new(),
            });
        }

        scan_value(payload, "", &mut detections);

        if !detections.is_empty() {
            log::warn!(
                "{} SECURITY_DETECTIONS count={} categories={:?}",
                ctx,
                detections.len(),
                detections
                    .iter()
                    .map(|d| d.category.as_str())
                    .collect::<Vec<_>>()
            );
        } else {
            log::debug!("{} SANITIZE_CLEAN", ctx);
        }

        detections
    }

    /// Scan and apply policy. Returns flag-only detections for logging
    /// alongside the accepted trace, or `SanitizationRejected` carrying
    /// every rejecting detection.
    pub fn enforce(
        &self,
        payload: &Value,
        ctx: &LogContext,
    ) -> Result<Vec<Detection>, PipelineError> {
        let detections = self.scan(payload, ctx);
        let mut rejecting = Vec::new();
        let mut flagged = Vec::new();

        for detection in detections {
            match self.policy_for(&detection) {
                SanitizePolicy::Reject => rejecting.push(detection),
                SanitizePolicy::FlagOnly => flagged.push(detection),
            }
        }

        if rejecting.is_empty() {
            Ok(flagged)
        } else {
            Err(PipelineError::SanitizationRejected {
                detections: rejecting.iter().map(|d| d.to_string()).collect(),
            })
        }
    }

    fn policy_for(&self, detection: &Detection) -> SanitizePolicy {
        let top_level = detection.path.split('.').next().unwrap_or("");
        if let Some(policy) = self.field_overrides.get(top_level) {
            return *policy;
        }
        self.policies
            .get(&detection.category)
            .copied()
            .unwrap_or(SanitizePolicy::Reject)
    }
}

/// Recursively scan a JSON value, keeping a dot-notation path for the
/// detection report.
fn scan_value(value: &Value, path: &str, detections: &mut Vec<Detection>) {
    match value {
        Value::String(s) => scan_string(s, path, detections),
        Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                let child = join_path(path, &i.to_string());
                scan_value(item, &child, detections);
            }
        }
        Value::Object(obj) => {
            for (key, val) in obj {
                let child = join_path(path, key);
                // Keys are attacker-controlled strings too.
                scan_string(key, &child, detections);
                scan_value(val, &child, detections);
            }
        }
        _ => {}
    }
}

fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", base, segment)
    }
}

fn scan_string(s: &str, path: &str, detections: &mut Vec<Detection>) {
    if s.len() > MAX_FIELD_SIZE {
        detections.push(Detection {
            category: ThreatCategory::Oversize,
            pattern: format!("field size {} > {}", s.len(), MAX_FIELD_SIZE),
            path: path.to_string(),
        });
    }

    for (category, patterns) in [
        (ThreatCategory::Markup, &*MARKUP_PATTERNS),
        (ThreatCategory::Sql, &*SQL_PATTERNS),
        (ThreatCategory::Command, &*COMMAND_PATTERNS),
        (ThreatCategory::PathTraversal, &*PATH_PATTERNS),
    ] {
        for pattern in patterns.iter() {
            if pattern.is_match(s) {
                detections.push(Detection {
                    category,
                    pattern: pattern.as_str().to_string(),
                    path: path.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sql_injection_rejected() {
        let sanitizer = Sanitizer::new();
        let ctx = LogContext::new("test-batch");
        let payload = json!({"note": "'; DROP TABLE users; --"});

        let err = sanitizer.enforce(&payload, &ctx).unwrap_err();
        match err {
            PipelineError::SanitizationRejected { detections } => {
                assert!(detections.iter().any(|d| d.contains("sql")));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_script_injection_rejected() {
        let sanitizer = Sanitizer::new();
        let ctx = LogContext::new("test-batch");
        let payload = json!({"content": "<script>alert(1)</script>"});

        assert!(sanitizer.enforce(&payload, &ctx).is_err());
    }

    #[test]
    fn test_command_injection_rejected() {
        let sanitizer = Sanitizer::new();
        let ctx = LogContext::new("test-batch");
        let payload = json!({"args": "x; rm -rf / ; echo $(whoami)"});

        assert!(sanitizer.enforce(&payload, &ctx).is_err());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let sanitizer = Sanitizer::new();
        let ctx = LogContext::new("test-batch");

        for payload in [
            json!({"file": "../../etc/passwd"}),
            json!({"file": "/etc/shadow"}),
            json!({"file": "/proc/self/environ"}),
        ] {
            let err = sanitizer.enforce(&payload, &ctx).unwrap_err();
            match err {
                PipelineError::SanitizationRejected { detections } => {
                    assert!(detections.iter().any(|d| d.contains("path_traversal")));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_clean_payload_accepted() {
        let sanitizer = Sanitizer::new();
        let ctx = LogContext::new("test-batch");
        let payload = json!({
            "task": "summarize the meeting notes",
            "steps": [{"action": "plan"}, {"action": "act"}]
        });

        let flagged = sanitizer.enforce(&payload, &ctx).unwrap();
        assert!(flagged.is_empty());
    }

    #[test]
    fn test_injected_object_key_detected() {
        let sanitizer = Sanitizer::new();
        let ctx = LogContext::new("test-batch");
        let payload = json!({"<script>k</script>": "v"});

        assert!(sanitizer.enforce(&payload, &ctx).is_err());
    }

    #[test]
    fn test_field_override_flags_instead_of_rejecting() {
        let mut sanitizer = Sanitizer::new();
        sanitizer.set_field_policy("sql_transcript", SanitizePolicy::FlagOnly);
        let ctx = LogContext::new("test-batch");

        let payload = json!({"sql_transcript": "UNION SELECT * FROM t"});
        let flagged = sanitizer.enforce(&payload, &ctx).unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].category, ThreatCategory::Sql);
    }

    #[test]
    fn test_scan_is_total_on_odd_shapes() {
        let sanitizer = Sanitizer::new();
        let ctx = LogContext::new("test-batch");

        // Scalars, nulls, deep nesting: scan never fails.
        for payload in [json!(null), json!(42), json!([[[["`id`"]]]])] {
            let _ = sanitizer.scan(&payload, &ctx);
        }
    }

    #[test]
    fn test_oversize_field_detected() {
        let sanitizer = Sanitizer::new();
        let ctx = LogContext::new("test-batch");
        let payload = json!({"blob": "x".repeat(MAX_FIELD_SIZE + 1)});

        let detections = sanitizer.scan(&payload, &ctx);
        assert!(detections
            .iter()
            .any(|d| d.category == ThreatCategory::Oversize));
    }
}
