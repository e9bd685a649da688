//! Pulls structured JSON out of free-form model output.
//!
//! Models wrap their answers in prose, markdown fences or both. Every stage
//! goes through these helpers so the extraction rules live in one place.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::core::errors::ParseError;

/// Returns the body of the first fenced block, or the trimmed input when there is none.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    trimmed
}

/// First well-formed JSON object in `text`.
pub fn extract_object(text: &str) -> Result<Map<String, Value>, ParseError> {
    match first_json(text, b'{', b'}', "object")? {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::Shape(format!("expected object, got {}", kind(&other)))),
    }
}

/// First well-formed JSON array in `text`.
pub fn extract_array(text: &str) -> Result<Vec<Value>, ParseError> {
    match first_json(text, b'[', b']', "array")? {
        Value::Array(items) => Ok(items),
        other => Err(ParseError::Shape(format!("expected array, got {}", kind(&other)))),
    }
}

/// Extracts the first object and deserializes it into `T`.
pub fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let map = extract_object(text)?;
    serde_json::from_value(Value::Object(map)).map_err(|e| ParseError::Shape(e.to_string()))
}

/// Lenient string list: arrays keep their scalar items, a bare string becomes one item.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Lenient number: accepts JSON numbers and numeric strings such as `"72"` or `"7.5/10"`.
pub fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let head: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            head.parse().ok()
        }
        _ => None,
    }
}

/// Lenient text: strings as-is, other scalars and structures rendered as JSON.
pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn first_json(
    text: &str,
    open: u8,
    close: u8,
    what: &'static str,
) -> Result<Value, ParseError> {
    let mut last_error = None;
    for source in [strip_fences(text), text.trim()] {
        let bytes = source.as_bytes();
        let mut start = 0;
        while let Some(offset) = bytes[start..].iter().position(|b| *b == open) {
            let begin = start + offset;
            if let Some(end) = balanced_end(bytes, begin, open, close) {
                match serde_json::from_str::<Value>(&source[begin..=end]) {
                    Ok(value) => return Ok(value),
                    Err(err) => last_error = Some(err.to_string()),
                }
            }
            start = begin + 1;
        }
    }

    match last_error {
        Some(err) => Err(ParseError::Malformed(err)),
        None => Err(ParseError::NotFound(what)),
    }
}

/// Index of the bracket closing the one at `begin`, skipping string literals.
fn balanced_end(bytes: &[u8], begin: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(begin) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
