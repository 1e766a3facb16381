use levo_models::{parse_amount, ActionKind, Advice, Decision};
use serde_json::Value;
use tracing::warn;

use crate::error::AdvisoryError;

/// Extract the first JSON object or array from text that may surround it.
///
/// Handles clean JSON, markdown code blocks (```json ... ```) and prose
/// around a JSON value, including prose that itself contains brackets.
pub fn extract_json(text: &str) -> Result<String, AdvisoryError> {
    let trimmed = text.trim();

    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<Value>(trimmed).is_ok()
    {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if serde_json::from_str::<Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_first_value(trimmed) {
        return Ok(json_str);
    }

    Err(AdvisoryError::InvalidResponse(format!(
        "no JSON value found in response (length={})",
        text.len()
    )))
}

fn extract_from_markdown_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(text[json_start..json_start + end].trim().to_string());
            }
        }
    }

    None
}

/// First balanced `{...}` or `[...]` that parses as JSON. An opening bracket
/// that does not start valid JSON (prose such as `[low]`) is skipped and the
/// scan resumes right after it.
fn extract_first_value(text: &str) -> Option<String> {
    let mut offset = 0;
    while let Some(found) = text[offset..].find(['{', '[']) {
        let start = offset + found;
        if let Some(len) = balanced_len(&text[start..]) {
            let candidate = &text[start..start + len];
            if serde_json::from_str::<Value>(candidate).is_ok() {
                return Some(candidate.to_string());
            }
        }
        offset = start + 1;
    }
    None
}

/// Byte length of the bracketed span opening `text`, ignoring brackets
/// inside strings. `None` if it never closes.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the oracle's reply into a validated [`Advice`].
///
/// The reply is an array whose first element carries `action`, `amount` and
/// optionally `text`. A bare object is accepted too. When the element has no
/// `action` but its `text` embeds a JSON object that does, that object is used.
pub fn parse_advice(raw: &str) -> Result<Advice, AdvisoryError> {
    let json_str = extract_json(raw)?;
    let value: Value = serde_json::from_str(&json_str)?;

    let element = match value {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| AdvisoryError::InvalidResponse("empty response array".to_string()))?,
        obj @ Value::Object(_) => obj,
        other => {
            return Err(AdvisoryError::InvalidResponse(format!(
                "expected array or object, got {other}"
            )))
        }
    };

    let text = element
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let source = if element.get("action").is_some() {
        element
    } else {
        embedded_decision(text.as_deref()).ok_or_else(|| {
            AdvisoryError::InvalidResponse("response has no action field".to_string())
        })?
    };

    let decision = decision_from(&source)?;
    Ok(Advice { decision, text })
}

fn embedded_decision(text: Option<&str>) -> Option<Value> {
    let json_str = extract_json(text?).ok()?;
    let value: Value = serde_json::from_str(&json_str).ok()?;
    let value = match value {
        Value::Array(items) => items.into_iter().next()?,
        other => other,
    };
    value.get("action").is_some().then_some(value)
}

fn decision_from(source: &Value) -> Result<Decision, AdvisoryError> {
    let action = source
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| AdvisoryError::InvalidResponse("action is not a string".to_string()))?;
    let kind: ActionKind = action.parse().map_err(AdvisoryError::InvalidResponse)?;

    let amount_value = source
        .get("amount")
        .ok_or_else(|| AdvisoryError::InvalidResponse(format!("{kind} without amount")))?;
    let amount = parse_amount(amount_value).ok_or_else(|| {
        AdvisoryError::InvalidResponse(format!("unparseable amount: {amount_value}"))
    })?;

    if kind == ActionKind::Hold && !amount.is_zero() {
        warn!(amount = %amount, "Hold returned with a non-zero amount, ignoring amount");
    }

    Decision::new(kind, amount)
        .ok_or_else(|| AdvisoryError::InvalidResponse(format!("{kind} requires a non-zero amount")))
}
