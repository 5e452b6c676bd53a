// SPDX-FileCopyrightText: 2026 Brieftrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns the model's raw text reply into a validated [`Classification`].
//!
//! Shape problems reject the whole reply. Individual fields that fail to
//! parse degrade to `None` (or the default priority) instead.

use brieftrack_core::{BriefFields, Classification, Platform, Priority};
use chrono::NaiveDate;
use serde_json::{Map, Value};

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return "",
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parse and validate a reply. The error names the first violated rule.
pub fn parse_reply(raw: &str) -> Result<Classification, String> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err("empty response text".to_string());
    }
    let value: Value = serde_json::from_str(body).map_err(|e| format!("malformed JSON: {e}"))?;
    normalize(&value)
}

/// Validate the top-level shape and normalize nested fields.
pub fn normalize(payload: &Value) -> Result<Classification, String> {
    let obj = payload
        .as_object()
        .ok_or_else(|| "payload is not an object".to_string())?;

    let is_task = obj
        .get("is_task")
        .and_then(Value::as_bool)
        .ok_or_else(|| "is_task is not a boolean".to_string())?;

    let confidence = obj
        .get("confidence")
        .filter(|v| v.is_number())
        .and_then(Value::as_f64)
        .ok_or_else(|| "confidence is not a number".to_string())?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence {confidence} out of range"));
    }

    if !is_task {
        let reason = text(obj, "reason").unwrap_or_else(|| "not_a_brief".to_string());
        return Ok(Classification {
            is_task: false,
            confidence,
            data: None,
            reason: Some(reason),
        });
    }

    let data = obj
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| "task data is not an object".to_string())?;

    Ok(Classification {
        is_task: true,
        confidence,
        data: Some(normalize_fields(data)),
        reason: None,
    })
}

fn normalize_fields(data: &Map<String, Value>) -> BriefFields {
    BriefFields {
        task_date: date(data, "task_date"),
        deadline: date(data, "deadline"),
        platform: text(data, "platform").and_then(|p| p.to_lowercase().parse::<Platform>().ok()),
        priority: text(data, "priority")
            .and_then(|p| p.to_lowercase().parse::<Priority>().ok())
            .unwrap_or_default(),
        amount_total: amount(data, "amount_total"),
        amount_paid: amount(data, "amount_paid"),
        amount_remaining: amount(data, "amount_remaining"),
        payment_note: text(data, "payment_note"),
        duration: text(data, "duration"),
        description: text(data, "description"),
        outfit: text(data, "outfit"),
        notes: text(data, "notes"),
        fan_link: text(data, "fan_link"),
        fan_name: text(data, "fan_name"),
    }
}

/// Non-blank trimmed string, else `None`.
fn text(data: &Map<String, Value>, key: &str) -> Option<String> {
    let s = data.get(key)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn date(data: &Map<String, Value>, key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&text(data, key)?, "%Y-%m-%d").ok()
}

/// Numbers pass through; strings accept a decimal comma. Booleans are not
/// amounts.
fn amount(data: &Map<String, Value>, key: &str) -> Option<f64> {
    match data.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s.trim().replace(',', ".");
            if cleaned.is_empty() {
                None
            } else {
                cleaned.parse().ok()
            }
        }
        _ => None,
    }
}
