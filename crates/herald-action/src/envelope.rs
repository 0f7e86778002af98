//! Wire envelope parsing.
//!
//! Turns a raw `{"actions": [{"action": ..., "params": {...}}, ...]}`
//! document into an ordered list of [`ActionCall`]s. Any structural problem
//! rejects the whole message.

use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::ActionCall;

/// Parse a raw wire message.
pub fn parse(raw: &str) -> Result<Vec<ActionCall>, ProtocolError> {
    let root: Value = serde_json::from_str(raw)
        .map_err(|e| ProtocolError::Parse(format!("malformed input: {}", e)))?;
    parse_value(&root)
}

/// Check an already-decoded message root.
pub fn parse_value(root: &Value) -> Result<Vec<ActionCall>, ProtocolError> {
    let root = root
        .as_object()
        .ok_or_else(|| ProtocolError::Parse("message root must be an object".to_string()))?;

    let actions = match root.get("actions") {
        Some(Value::Array(actions)) => actions,
        Some(_) => return Err(ProtocolError::Parse("actions must be a list".to_string())),
        None => return Err(ProtocolError::Parse("missing actions".to_string())),
    };

    actions
        .iter()
        .enumerate()
        .map(|(index, item)| parse_call(index, item))
        .collect()
}

fn parse_call(index: usize, item: &Value) -> Result<ActionCall, ProtocolError> {
    let item = item
        .as_object()
        .ok_or_else(|| ProtocolError::Parse(format!("actions[{}] must be an object", index)))?;

    let action = match item.get("action") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        Some(_) => {
            return Err(ProtocolError::Parse(format!(
                "actions[{}].action must be a non-empty string",
                index
            )))
        }
        None => {
            return Err(ProtocolError::Parse(format!(
                "actions[{}] is missing its action name",
                index
            )))
        }
    };

    let params = match item.get("params") {
        None | Some(Value::Null) => Default::default(),
        Some(Value::Object(params)) => params.clone(),
        Some(_) => {
            return Err(ProtocolError::Parse(format!(
                "actions[{}].params must be an object",
                index
            )))
        }
    };

    Ok(ActionCall { action, params })
}
