//! Dot-notation path resolution over JSON payloads.

use serde_json::Value;

/// Resolve a dot-notation path like `"result.score"` against a payload.
/// Numeric segments index into arrays (`"steps.0.action"`).
pub fn resolve_json_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }

    let mut current = data;
    for segment in path.split('.') {
        match current {
            Value::Object(obj) => {
                current = obj.get(segment)?;
            }
            Value::Array(arr) => {
                let index: usize = segment.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_path() {
        let payload = json!({"result": {"score": 0.93, "label": "ok"}});
        assert_eq!(
            resolve_json_path(&payload, "result.score"),
            Some(&json!(0.93))
        );
    }

    #[test]
    fn test_array_index() {
        let payload = json!({"steps": [{"action": "plan"}, {"action": "act"}]});
        assert_eq!(
            resolve_json_path(&payload, "steps.1.action"),
            Some(&json!("act"))
        );
    }

    #[test]
    fn test_missing_and_empty() {
        let payload = json!({"task": "summarize"});
        assert_eq!(resolve_json_path(&payload, "absent"), None);
        assert_eq!(resolve_json_path(&payload, "task.deeper"), None);
        assert_eq!(resolve_json_path(&payload, ""), Some(&payload));
    }
}
