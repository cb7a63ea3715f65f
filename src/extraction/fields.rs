//! Reduced-field projection.
//!
//! Applies a schema rule's ordered extraction directives to a validated,
//! sanitized payload. Used when the retention tier is not full-fidelity.
//! Pure and side-effect-free: the same payload and rule always produce
//! the same projection.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::extraction::json_path::resolve_json_path;
use crate::logging::structured::LogContext;
use crate::validation::schema::{FieldType, SchemaRule};

/// Extract the reduced-field projection for a trace.
///
/// Missing optional fields are omitted; missing required fields were
/// already caught by validation and are only logged here. The projection
/// is keyed by storage column in a sorted map so iteration order is
/// stable.
pub fn extract_fields(
    payload: &Value,
    rule: &SchemaRule,
    ctx: &LogContext,
) -> BTreeMap<String, Value> {
    let mut projection = BTreeMap::new();

    log::debug!(
        "{} EXTRACT_START type={} version={} directives={}",
        ctx,
        rule.trace_type,
        rule.version,
        rule.directives.len()
    );

    for directive in &rule.directives {
        match resolve_json_path(payload, &directive.json_path) {
            Some(value) => match convert_value(value, directive.field_type) {
                Some(converted) => {
                    log::debug!(
                        "{} FIELD_EXTRACTED field={} path={} column={}",
                        ctx,
                        directive.field_name,
                        directive.json_path,
                        directive.column
                    );
                    projection.insert(directive.column.clone(), converted);
                }
                None => {
                    log::warn!(
                        "{} FIELD_TYPE_MISMATCH field={} path={} expected={:?}",
                        ctx,
                        directive.field_name,
                        directive.json_path,
                        directive.field_type
                    );
                }
            },
            None if directive.required => {
                // Contract violation already caught in validation.
                log::warn!(
                    "{} FIELD_MISSING field={} required=true",
                    ctx,
                    directive.field_name
                );
            }
            None => {}
        }
    }

    log::debug!("{} EXTRACT_COMPLETE fields={}", ctx, projection.len());
    projection
}

/// Convert a resolved value to its declared type. Returns None when the
/// value cannot represent the type, so mismatched optional fields are
/// omitted rather than stored with the wrong shape.
fn convert_value(value: &Value, field_type: FieldType) -> Option<Value> {
    match field_type {
        FieldType::String | FieldType::Timestamp => match value {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldType::Float => {
            let f = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }?;
            serde_json::Number::from_f64(f).map(Value::Number)
        }
        FieldType::Int => {
            let i: i64 = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            }?;
            Some(Value::Number(i.into()))
        }
        FieldType::Boolean => {
            let b = match value {
                Value::Bool(b) => Some(*b),
                Value::String(s) => match s.to_lowercase().as_str() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                },
                Value::Number(n) => n.as_i64().map(|i| i != 0),
                _ => None,
            }?;
            Some(Value::Bool(b))
        }
        FieldType::Json => Some(value.clone()),
    }
}
