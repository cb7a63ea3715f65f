//! Data-driven schema rules.
//!
//! Rules are loaded from the control store at runtime; nothing is
//! hardcoded. Lookup is keyed by (trace_type, version), and when no
//! version is requested the most recent active rule wins.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::PipelineError;
use crate::extraction::json_path::resolve_json_path;
use crate::logging::structured::LogContext;

/// Registry refresh TTL - 5 minutes
const REGISTRY_TTL_SECS: u64 = 300;

/// Declared type of an extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Float,
    Int,
    Boolean,
    Json,
    Timestamp,
}

impl FieldType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(FieldType::String),
            "float" => Some(FieldType::Float),
            "int" => Some(FieldType::Int),
            "boolean" => Some(FieldType::Boolean),
            "json" => Some(FieldType::Json),
            "timestamp" => Some(FieldType::Timestamp),
            _ => None,
        }
    }

    /// Structural type check against a JSON value. String-encoded numbers
    /// and booleans are accepted, matching how agents serialize payloads.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String | FieldType::Timestamp => value.is_string(),
            FieldType::Float => match value {
                Value::Number(_) => true,
                Value::String(s) => s.parse::<f64>().is_ok(),
                _ => false,
            },
            FieldType::Int => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => s.parse::<i64>().is_ok(),
                _ => false,
            },
            FieldType::Boolean => match value {
                Value::Bool(_) => true,
                Value::String(s) => {
                    matches!(s.to_lowercase().as_str(), "true" | "false" | "0" | "1")
                }
                _ => false,
            },
            FieldType::Json => true,
        }
    }
}

/// One extraction directive of a schema rule.
#[derive(Debug, Clone)]
pub struct FieldDirective {
    pub field_name: String,
    pub json_path: String,
    pub field_type: FieldType,
    pub required: bool,
    pub column: String,
}

/// A versioned, data-driven rule describing what a valid trace of a given
/// type looks like and which fields may be extracted.
#[derive(Debug, Clone)]
pub struct SchemaRule {
    pub trace_type: String,
    pub version: u32,
    pub active: bool,
    pub description: String,
    /// Ordered extraction directives; order is preserved from the control
    /// store so projections are reproducible.
    pub directives: Vec<FieldDirective>,
    /// Top-level fields that must be present.
    pub required_fields: Vec<String>,
}

impl SchemaRule {
    /// Structural validation: payload shape, required fields, declared
    /// types of required directives. Returns every violation, not just
    /// the first, so a quarantined trace is diagnosable in one pass.
    pub fn validate(&self, payload: &Value, ctx: &LogContext) -> Result<(), PipelineError> {
        let mut violations = Vec::new();

        let obj = match payload.as_object() {
            Some(obj) => obj,
            None => {
                return Err(PipelineError::SchemaValidation {
                    violations: vec!["payload is not a JSON object".to_string()],
                });
            }
        };

        for field in &self.required_fields {
            if !obj.contains_key(field) {
                violations.push(format!("missing required field: {}", field));
            }
        }

        for directive in &self.directives {
            match resolve_json_path(payload, &directive.json_path) {
                Some(value) => {
                    if !directive.field_type.matches(value) {
                        violations.push(format!(
                            "field {}: expected {:?}",
                            directive.field_name, directive.field_type
                        ));
                    }
                }
                None if directive.required => {
                    violations.push(format!(
                        "missing required field: {} (path {})",
                        directive.field_name, directive.json_path
                    ));
                }
                None => {}
            }
        }

        if violations.is_empty() {
            log::debug!(
                "{} SCHEMA_VALID type={} version={}",
                ctx,
                self.trace_type,
                self.version
            );
            Ok(())
        } else {
            log::warn!(
                "{} SCHEMA_INVALID type={} version={} violations={:?}",
                ctx,
                self.trace_type,
                self.version,
                violations
            );
            Err(PipelineError::SchemaValidation { violations })
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    /// trace_type -> rules sorted by version, descending.
    rules: HashMap<String, Vec<SchemaRule>>,
    loaded_at: Option<Instant>,
}

/// In-memory schema rule registry, refreshed from the control store on a
/// bounded interval or by explicit invalidation.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    state: RwLock<RegistryState>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from control-store rows, replacing the current set.
    ///
    /// # Arguments
    /// * `rules` - (trace_type, version, active, description)
    /// * `fields` - (trace_type, version, field_name, json_path, data_type,
    ///   required, column); unknown data types are skipped with a warning
    /// * `required` - (trace_type, version, field_name)
    pub fn load_from_rows(
        &self,
        rules: Vec<(String, u32, bool, String)>,
        fields: Vec<(String, u32, String, String, String, bool, String)>,
        required: Vec<(String, u32, String)>,
    ) {
        let mut directives: HashMap<(String, u32), Vec<FieldDirective>> = HashMap::new();
        for (trace_type, version, field_name, json_path, data_type, req, column) in fields {
            let field_type = match FieldType::parse(&data_type) {
                Some(t) => t,
                None => {
                    log::warn!(
                        "SCHEMA_FIELD_SKIPPED type={} version={} field={} data_type={}",
                        trace_type,
                        version,
                        field_name,
                        data_type
                    );
                    continue;
                }
            };
            directives
                .entry((trace_type, version))
                .or_default()
                .push(FieldDirective {
                    field_name,
                    json_path,
                    field_type,
                    required: req,
                    column,
                });
        }

        let mut required_fields: HashMap<(String, u32), Vec<String>> = HashMap::new();
        for (trace_type, version, field_name) in required {
            required_fields
                .entry((trace_type, version))
                .or_default()
                .push(field_name);
        }

        let mut by_type: HashMap<String, Vec<SchemaRule>> = HashMap::new();
        for (trace_type, version, active, description) in rules {
            let key = (trace_type.clone(), version);
            by_type.entry(trace_type.clone()).or_default().push(SchemaRule {
                trace_type,
                version,
                active,
                description,
                directives: directives.remove(&key).unwrap_or_default(),
                required_fields: required_fields.remove(&key).unwrap_or_default(),
            });
        }

        for rules in by_type.values_mut() {
            rules.sort_by(|a, b| b.version.cmp(&a.version));
        }

        let mut state = self.state.write();
        state.rules = by_type;
        state.loaded_at = Some(Instant::now());

        log::info!(
            "SCHEMA_REGISTRY_LOADED types={:?}",
            state.rules.keys().collect::<Vec<_>>()
        );
    }

    /// Resolve the rule for a trace type. With an explicit version, that
    /// exact active rule must exist; without one, the most recent active
    /// rule wins. No rule is a hard stop, never a soft default.
    pub fn resolve(
        &self,
        trace_type: &str,
        version: Option<u32>,
        ctx: &LogContext,
    ) -> Result<SchemaRule, PipelineError> {
        let state = self.state.read();
        let candidates = state.rules.get(trace_type);

        let found = candidates.and_then(|rules| match version {
            Some(v) => rules.iter().find(|r| r.version == v && r.active),
            None => rules.iter().find(|r| r.active),
        });

        match found {
            Some(rule) => {
                log::debug!(
                    "{} SCHEMA_RESOLVED type={} version={}",
                    ctx,
                    trace_type,
                    rule.version
                );
                Ok(rule.clone())
            }
            None => {
                log::warn!(
                    "{} SCHEMA_NOT_FOUND type={} version={:?}",
                    ctx,
                    trace_type,
                    version
                );
                Err(PipelineError::SchemaNotFound {
                    trace_type: trace_type.to_string(),
                    version: version.map(|v| v.to_string()).unwrap_or_else(|| "latest".to_string()),
                })
            }
        }
    }

    /// Check if the registry needs a refresh (empty or TTL expired).
    pub fn needs_refresh(&self) -> bool {
        let state = self.state.read();
        if state.rules.is_empty() {
            return true;
        }
        match state.loaded_at {
            Some(loaded_at) => loaded_at.elapsed() > Duration::from_secs(REGISTRY_TTL_SECS),
            None => true,
        }
    }

    /// Registry age in seconds, for logging.
    pub fn age_secs(&self) -> Option<u64> {
        self.state.read().loaded_at.map(|t| t.elapsed().as_secs())
    }

    /// Explicit invalidation; the next lookup cycle reloads.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.rules.clear();
        state.loaded_at = None;
        log::info!("SCHEMA_REGISTRY_INVALIDATED");
    }

    pub fn rule_count(&self) -> usize {
        self.state.read().rules.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_with_rule() -> SchemaRegistry {
        let registry = SchemaRegistry::new();
        registry.load_from_rows(
            vec![
                ("agent_step".to_string(), 1, true, "v1".to_string()),
                ("agent_step".to_string(), 2, true, "v2".to_string()),
                ("agent_step".to_string(), 3, false, "draft".to_string()),
            ],
            vec![(
                "agent_step".to_string(),
                2,
                "score".to_string(),
                "result.score".to_string(),
                "float".to_string(),
                true,
                "score".to_string(),
            )],
            vec![("agent_step".to_string(), 2, "task".to_string())],
        );
        registry
    }

    #[test]
    fn test_most_recent_active_wins() {
        let registry = registry_with_rule();
        let ctx = LogContext::new("test-batch");

        // Version 3 exists but is inactive; 2 is the newest active rule.
        let rule = registry.resolve("agent_step", None, &ctx).unwrap();
        assert_eq!(rule.version, 2);
    }

    #[test]
    fn test_explicit_version_lookup() {
        let registry = registry_with_rule();
        let ctx = LogContext::new("test-batch");

        let rule = registry.resolve("agent_step", Some(1), &ctx).unwrap();
        assert_eq!(rule.version, 1);

        // Inactive versions never resolve.
        assert!(matches!(
            registry.resolve("agent_step", Some(3), &ctx),
            Err(PipelineError::SchemaNotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_type_is_hard_stop() {
        let registry = registry_with_rule();
        let ctx = LogContext::new("test-batch");
        assert!(matches!(
            registry.resolve("unknown_type", None, &ctx),
            Err(PipelineError::SchemaNotFound { .. })
        ));
    }

    #[test]
    fn test_validation_passes() {
        let registry = registry_with_rule();
        let ctx = LogContext::new("test-batch");
        let rule = registry.resolve("agent_step", None, &ctx).unwrap();

        let payload = json!({
            "task": "summarize",
            "result": {"score": 0.93}
        });
        assert!(rule.validate(&payload, &ctx).is_ok());
    }

    #[test]
    fn test_validation_collects_all_violations() {
        let registry = registry_with_rule();
        let ctx = LogContext::new("test-batch");
        let rule = registry.resolve("agent_step", None, &ctx).unwrap();

        let payload = json!({
            "result": {"score": "not a number"}
        });
        let err = rule.validate(&payload, &ctx).unwrap_err();
        match err {
            PipelineError::SchemaValidation { violations } => {
                assert_eq!(violations.len(), 2);
                assert!(violations[0].contains("task"));
                assert!(violations[1].contains("score"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_object_payload() {
        let registry = registry_with_rule();
        let ctx = LogContext::new("test-batch");
        let rule = registry.resolve("agent_step", None, &ctx).unwrap();

        let err = rule.validate(&json!([1, 2, 3]), &ctx).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaValidation { .. }));
    }

    #[test]
    fn test_refresh_signal() {
        let registry = SchemaRegistry::new();
        assert!(registry.needs_refresh());

        registry.load_from_rows(
            vec![("agent_step".to_string(), 1, true, String::new())],
            vec![],
            vec![],
        );
        assert!(!registry.needs_refresh());

        registry.invalidate();
        assert!(registry.needs_refresh());
    }
}
