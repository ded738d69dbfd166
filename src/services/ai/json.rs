//! Locating a JSON object inside model output, which may arrive bare, inside
//! markdown code fences, or surrounded by prose.

use serde_json::Value;

pub fn extract_json_object(response: &str) -> anyhow::Result<Value> {
    let trimmed = response.trim();

    if let Some(value) = parse_object(trimmed) {
        return Ok(value);
    }

    let cleaned = strip_code_fence(trimmed);
    if let Some(value) = parse_object(cleaned) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Some(value) = parse_object(&cleaned[start..=end]) {
                return Ok(value);
            }
        }
    }

    anyhow::bail!("no JSON object found in model response")
}

fn strip_code_fence(s: &str) -> &str {
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```JSON"))
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

fn parse_object(s: &str) -> Option<Value> {
    serde_json::from_str::<Value>(s)
        .ok()
        .filter(|v| v.is_object())
}

/// A trimmed, non-empty string field, or `None`.
pub fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}

/// String items of an array field; anything else becomes an empty list.
pub fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A number field, also accepting numeric strings like `"0.8"`.
pub fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}
