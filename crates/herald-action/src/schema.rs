//! Action schema validation.
//!
//! Checks one `{type, payload}` action against the payload schema of its
//! declared type. Every independent problem is collected so a caller sees
//! the full diagnostic set in a single pass; only a non-object root stops
//! validation early.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{ActionType, Privacy, Scope};

/// Verdict of [`validate`]. `valid` is exactly `errors.is_empty()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validate a single action. Pure and total: never panics, never mutates.
pub fn validate(action: &Value) -> ValidationReport {
    let Some(action) = action.as_object() else {
        return ValidationReport::from_errors(vec!["action must be an object".to_string()]);
    };

    let mut errors = Vec::new();

    let action_type = match action.get("type") {
        None => {
            errors.push("missing type".to_string());
            None
        }
        Some(Value::String(s)) => match s.parse::<ActionType>() {
            Ok(t) => Some(t),
            Err(e) => {
                errors.push(e);
                None
            }
        },
        Some(other) => {
            errors.push(format!("unsupported type: {}", other));
            None
        }
    };

    let payload = match action.get("payload") {
        None => {
            errors.push("missing payload".to_string());
            None
        }
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            errors.push("payload must be an object".to_string());
            None
        }
    };

    if let (Some(action_type), Some(payload)) = (action_type, payload) {
        match action_type {
            ActionType::Message => check_message(payload, &mut errors),
            ActionType::Event => check_event(payload, &mut errors),
            ActionType::Command => check_command(payload, &mut errors),
            ActionType::Memory => check_memory(payload, &mut errors),
        }
    }

    ValidationReport::from_errors(errors)
}

fn check_message(payload: &Map<String, Value>, errors: &mut Vec<String>) {
    require_text(payload, "text", errors);
    require_one_of(payload, "scope", &Scope::NAMES, errors);
    require_one_of(payload, "privacy", &Privacy::NAMES, errors);

    match optional(payload, "target") {
        None => {}
        Some(Value::Object(target)) => {
            for field in ["chat_id", "message_id"] {
                if !target.get(field).is_some_and(Value::is_i64) {
                    errors.push(format!("payload.target.{} must be an integer", field));
                }
            }
        }
        Some(_) => errors.push("payload.target must be an object".to_string()),
    }
}

fn check_event(payload: &Map<String, Value>, errors: &mut Vec<String>) {
    require_text(payload, "name", errors);
    if optional(payload, "parameters").is_some_and(|v| !v.is_object()) {
        errors.push("payload.parameters must be an object".to_string());
    }
}

fn check_command(payload: &Map<String, Value>, errors: &mut Vec<String>) {
    require_text(payload, "name", errors);
    if optional(payload, "args").is_some_and(|v| !v.is_array()) {
        errors.push("payload.args must be a list".to_string());
    }
}

fn check_memory(payload: &Map<String, Value>, errors: &mut Vec<String>) {
    require_text(payload, "content", errors);
    if let Some(tags) = optional(payload, "tags") {
        let all_strings = tags
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !all_strings {
            errors.push("payload.tags must be a list of strings".to_string());
        }
    }
}

/// An optional field; explicit `null` counts as absent.
fn optional<'a>(payload: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    payload.get(field).filter(|v| !v.is_null())
}

fn require_text(payload: &Map<String, Value>, field: &str, errors: &mut Vec<String>) {
    let ok = payload
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !ok {
        errors.push(format!("payload.{} must be a non-empty string", field));
    }
}

fn require_one_of(
    payload: &Map<String, Value>,
    field: &str,
    allowed: &[&str],
    errors: &mut Vec<String>,
) {
    let ok = payload
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| allowed.contains(&s));
    if !ok {
        errors.push(format!(
            "payload.{} must be one of: {}",
            field,
            allowed.join(", ")
        ));
    }
}
