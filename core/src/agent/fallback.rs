//! Rescue for models that print tool calls as JSON text instead of using the
//! structured channel.

use crate::traits::ToolCall;
use serde_json::Value;

/// Finds every `{"name": ..., "arguments": {...}}` object in `content`, in
/// textual order, and turns each into a [`ToolCall`] with a fresh id.
///
/// Prose around the objects is ignored. Objects that are not calls are
/// searched for nested calls, so wrappers such as `{"tool_calls": [...]}`
/// still yield their entries.
pub fn extract_tool_calls(content: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for value in extract_json_values(content) {
        collect_calls(&value, &mut calls);
    }
    calls
}

fn collect_calls(value: &Value, calls: &mut Vec<ToolCall>) {
    if let Some(call) = parse_tool_call_value(value) {
        calls.push(call);
        return;
    }

    match value {
        Value::Object(map) => map.values().for_each(|v| collect_calls(v, calls)),
        Value::Array(items) => items.iter().for_each(|v| collect_calls(v, calls)),
        _ => {}
    }
}

fn parse_tool_call_value(value: &Value) -> Option<ToolCall> {
    let name = value.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let arguments = match value.get("arguments")? {
        args @ Value::Object(_) => args.clone(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw).ok()? {
            args @ Value::Object(_) => args,
            _ => return None,
        },
        _ => return None,
    };

    Some(ToolCall {
        id: format!("call_{}", uuid::Uuid::new_v4().simple()),
        name: name.to_string(),
        arguments: serde_json::to_string(&arguments).ok()?,
    })
}

/// Parses every brace-balanced JSON object found in `text`.
///
/// A span that never closes or is not valid JSON is skipped one brace at a
/// time, so stray braces in prose cannot hide the objects after or inside them.
fn extract_json_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;

        if let Some(len) = balanced_span_len(&text[start..])
            && let Ok(value) = serde_json::from_str::<Value>(&text[start..start + len])
        {
            values.push(value);
            pos = start + len;
            continue;
        }

        pos = start + 1;
    }

    values
}

/// Byte length of the object opening at the start of `text`, through its
/// matching `}`. `None` if it never closes.
fn balanced_span_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escape_next => escape_next = false,
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
