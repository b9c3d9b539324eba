//! # Argument Schema Validation
//!
//! Validates tool call arguments against the JSON Schema a tool declares.
//! Supported keywords: `type`, `properties`, `required`,
//! `additionalProperties`, `items`, `enum`, `const`, `minimum`, `maximum`,
//! `exclusiveMinimum`, `exclusiveMaximum`, `minLength`, `maxLength`,
//! `minItems`, `maxItems`, `anyOf`, `oneOf` and `allOf`. Unknown keywords
//! are ignored, so richer schemas still validate on the subset.
//!
//! Violations are collected rather than short-circuited, so the model sees
//! every problem with its call at once.

use std::fmt;

use serde_json::{Map, Value};

/// One schema violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Dotted path to the offending value, `root` for the top level.
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate `value` against `schema`.
pub fn validate(schema: &Value, value: &Value) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check(schema, value, &mut Vec::new(), &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Format violations the way they are reported back to the model.
pub fn format_violations(tool_name: &str, violations: &[Violation], args: &Map<String, Value>) -> String {
    let list = violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n");
    let received = serde_json::to_string_pretty(args).unwrap_or_else(|_| "{}".into());
    format!("Validation failed for tool \"{tool_name}\":\n{list}\n\nReceived arguments:\n{received}")
}

fn push(path: &[String], message: String, out: &mut Vec<Violation>) {
    let path = if path.is_empty() {
        "root".to_string()
    } else {
        path.join(".")
    };
    out.push(Violation { path, message });
}

fn is_valid(schema: &Value, value: &Value, path: &mut Vec<String>) -> bool {
    let mut scratch = Vec::new();
    check(schema, value, path, &mut scratch);
    scratch.is_empty()
}

#[allow(clippy::too_many_lines)]
fn check(schema: &Value, value: &Value, path: &mut Vec<String>, out: &mut Vec<Violation>) {
    let schema = match schema {
        Value::Bool(true) => return,
        Value::Bool(false) => {
            push(path, "False schema does not allow any value".into(), out);
            return;
        }
        Value::Object(schema) => schema,
        _ => return,
    };

    if let Some(expected) = schema.get("type") {
        let names: Vec<&str> = match expected {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !names.is_empty() && !names.iter().any(|t| matches_type(t, value)) {
            let expected = if names.len() == 1 {
                format!("'{}'", names[0])
            } else {
                names.iter().map(|t| format!("'{t}'")).collect::<Vec<_>>().join(", ")
            };
            push(path, format!("{value} is not of type {expected}"), out);
        }
    }

    if let Some(Value::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(value) {
            push(path, format!("{value} is not one of {}", Value::Array(allowed.clone())), out);
        }
    }

    if let Some(expected) = schema.get("const") {
        if expected != value {
            push(path, format!("{expected} was expected"), out);
        }
    }

    match value {
        Value::Object(object) => check_object(schema, object, path, out),
        Value::Array(items) => check_array(schema, items, path, out),
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
                if len < min {
                    push(path, format!("{value} is too short"), out);
                }
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
                if len > max {
                    push(path, format!("{value} is too long"), out);
                }
            }
        }
        Value::Number(n) => {
            if let Some(x) = n.as_f64() {
                check_bounds(schema, value, x, path, out);
            }
        }
        Value::Null | Value::Bool(_) => {}
    }

    if let Some(Value::Array(branches)) = schema.get("allOf") {
        for branch in branches {
            check(branch, value, path, out);
        }
    }

    if let Some(Value::Array(branches)) = schema.get("anyOf") {
        if !branches.iter().any(|b| is_valid(b, value, path)) {
            push(path, format!("{value} is not valid under any of the given schemas"), out);
        }
    }

    if let Some(Value::Array(branches)) = schema.get("oneOf") {
        let matching = branches.iter().filter(|b| is_valid(b, value, path)).count();
        match matching {
            1 => {}
            0 => push(path, format!("{value} is not valid under any of the given schemas"), out),
            _ => push(path, format!("{value} is valid under more than one of the given schemas"), out),
        }
    }
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "string" => value.is_string(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        _ => true,
    }
}

fn check_object(schema: &Map<String, Value>, object: &Map<String, Value>, path: &mut Vec<String>, out: &mut Vec<Violation>) {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                push(path, format!("'{key}' is a required property"), out);
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let mut unexpected = Vec::new();

    for (key, child) in object {
        if let Some(sub) = properties.and_then(|p| p.get(key)) {
            path.push(key.clone());
            check(sub, child, path, out);
            let _ = path.pop();
            continue;
        }
        match schema.get("additionalProperties") {
            Some(Value::Bool(false)) => unexpected.push(key.as_str()),
            Some(extra @ Value::Object(_)) => {
                path.push(key.clone());
                check(extra, child, path, out);
                let _ = path.pop();
            }
            _ => {}
        }
    }

    if !unexpected.is_empty() {
        let listed = unexpected.iter().map(|k| format!("'{k}'")).collect::<Vec<_>>().join(", ");
        let verb = if unexpected.len() == 1 { "was" } else { "were" };
        push(path, format!("Additional properties are not allowed ({listed} {verb} unexpected)"), out);
    }
}

fn check_array(schema: &Map<String, Value>, items: &[Value], path: &mut Vec<String>, out: &mut Vec<Violation>) {
    let len = items.len() as u64;
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if len < min {
            push(path, format!("expected at least {min} items, got {len}"), out);
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if len > max {
            push(path, format!("expected at most {max} items, got {len}"), out);
        }
    }
    if let Some(item_schema) = schema.get("items").filter(|s| s.is_object() || s.is_boolean()) {
        for (i, item) in items.iter().enumerate() {
            path.push(i.to_string());
            check(item_schema, item, path, out);
            let _ = path.pop();
        }
    }
}

fn check_bounds(schema: &Map<String, Value>, value: &Value, x: f64, path: &[String], out: &mut Vec<Violation>) {
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        if x < min {
            push(path, format!("{value} is less than the minimum of {}", schema["minimum"]), out);
        }
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        if x > max {
            push(path, format!("{value} is greater than the maximum of {}", schema["maximum"]), out);
        }
    }
    if let Some(min) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
        if x <= min {
            push(path, format!("{value} is less than or equal to the minimum of {}", schema["exclusiveMinimum"]), out);
        }
    }
    if let Some(max) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
        if x >= max {
            push(path, format!("{value} is greater than or equal to the maximum of {}", schema["exclusiveMaximum"]), out);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors(schema: &Value, value: &Value) -> Vec<String> {
        validate(schema, value)
            .err()
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.to_string())
            .collect()
    }

    fn read_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "minLength": 1},
                "limit": {"type": "integer", "minimum": 1, "maximum": 1000},
                "mode": {"enum": ["text", "binary"]}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    // ── Objects ──────────────────────────────────────────────────────────

    #[test]
    fn valid_arguments_pass() {
        assert!(validate(&read_schema(), &json!({"path": "/a", "limit": 10, "mode": "text"})).is_ok());
    }

    #[test]
    fn missing_required_reported_at_root() {
        assert_eq!(errors(&read_schema(), &json!({})), ["root: 'path' is a required property"]);
    }

    #[test]
    fn all_violations_are_collected() {
        let errs = errors(&read_schema(), &json!({"path": "", "limit": 0, "mode": "hex", "x": 1}));
        assert_eq!(errs.len(), 4, "{errs:?}");
        assert!(errs.contains(&"path: \"\" is too short".to_string()));
        assert!(errs.contains(&"limit: 0 is less than the minimum of 1".to_string()));
        assert!(errs.iter().any(|e| e.starts_with("mode: \"hex\" is not one of")));
        assert!(errs.contains(&"root: Additional properties are not allowed ('x' was unexpected)".to_string()));
    }

    #[test]
    fn additional_properties_schema_applies_to_extras() {
        let schema = json!({"type": "object", "additionalProperties": {"type": "number"}});
        assert!(validate(&schema, &json!({"a": 1})).is_ok());
        assert_eq!(errors(&schema, &json!({"a": "x"})), ["a: \"x\" is not of type 'number'"]);
    }

    // ── Types ────────────────────────────────────────────────────────────

    #[test]
    fn integer_accepts_whole_floats() {
        let schema = json!({"type": "integer"});
        assert!(validate(&schema, &json!(3)).is_ok());
        assert!(validate(&schema, &json!(3.0)).is_ok());
        assert!(validate(&schema, &json!(3.5)).is_err());
    }

    #[test]
    fn type_union() {
        let schema = json!({"type": ["string", "null"]});
        assert!(validate(&schema, &json!(null)).is_ok());
        assert_eq!(errors(&schema, &json!(1)), ["root: 1 is not of type 'string', 'null'"]);
    }

    #[test]
    fn boolean_schemas() {
        assert!(validate(&json!(true), &json!({"anything": 1})).is_ok());
        assert!(validate(&json!(false), &json!(1)).is_err());
    }

    #[test]
    fn unknown_keywords_are_ignored() {
        let schema = json!({"type": "string", "format": "uri", "x-custom": true});
        assert!(validate(&schema, &json!("not a uri")).is_ok());
    }

    #[test]
    fn const_keyword() {
        assert!(validate(&json!({"const": "v1"}), &json!("v1")).is_ok());
        assert_eq!(errors(&json!({"const": "v1"}), &json!("v2")), ["root: \"v1\" was expected"]);
    }

    // ── Arrays ───────────────────────────────────────────────────────────

    #[test]
    fn array_items_and_bounds() {
        let schema = json!({"type": "array", "items": {"type": "string"}, "minItems": 1, "maxItems": 2});
        assert!(validate(&schema, &json!(["a"])).is_ok());
        assert_eq!(errors(&schema, &json!([])), ["root: expected at least 1 items, got 0"]);
        assert_eq!(errors(&schema, &json!(["a", 2])), ["1: 2 is not of type 'string'"]);
        assert!(validate(&schema, &json!(["a", "b", "c"])).is_err());
    }

    #[test]
    fn nested_paths_are_dotted() {
        let schema = json!({
            "type": "object",
            "properties": {"edits": {"type": "array", "items": {
                "type": "object",
                "properties": {"old": {"type": "string"}},
                "required": ["old"]
            }}}
        });
        let errs = errors(&schema, &json!({"edits": [{"old": "a"}, {"old": 5}, {}]}));
        assert_eq!(
            errs,
            ["edits.1.old: 5 is not of type 'string'", "edits.2: 'old' is a required property"]
        );
    }

    // ── Combinators ──────────────────────────────────────────────────────

    #[test]
    fn any_of_and_one_of() {
        let any = json!({"anyOf": [{"type": "string"}, {"type": "integer"}]});
        assert!(validate(&any, &json!(1)).is_ok());
        assert!(validate(&any, &json!(true)).is_err());

        let one = json!({"oneOf": [{"type": "integer"}, {"type": "number"}]});
        assert!(validate(&one, &json!(1.5)).is_ok());
        assert_eq!(
            errors(&one, &json!(1)),
            ["root: 1 is valid under more than one of the given schemas"]
        );
    }

    #[test]
    fn exclusive_bounds() {
        let schema = json!({"exclusiveMinimum": 0, "exclusiveMaximum": 1});
        assert!(validate(&schema, &json!(0.5)).is_ok());
        assert!(validate(&schema, &json!(0)).is_err());
        assert!(validate(&schema, &json!(1)).is_err());
    }

    // ── Formatting ───────────────────────────────────────────────────────

    #[test]
    fn report_lists_violations_and_arguments() {
        let args = json!({"limit": "ten"});
        let Err(violations) = validate(&read_schema(), &args) else {
            panic!("expected violations");
        };
        let report = format_violations("read", &violations, args.as_object().unwrap());
        assert!(report.starts_with("Validation failed for tool \"read\":\n  - "));
        assert!(report.contains("  - root: 'path' is a required property"));
        assert!(report.contains("Received arguments:\n{\n  \"limit\": \"ten\"\n}"));
    }
}
