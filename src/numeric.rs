//! Lenient number handling for form-style payloads.
//!
//! Amount fields accept either JSON numbers or numeric strings. Anything that
//! does not start with a number collapses to zero instead of failing the
//! whole request.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

static FLOAT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap());

static INT_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+").unwrap());

/// Parses the longest numeric prefix of `s`, ignoring leading whitespace.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    FLOAT_PREFIX
        .find(s.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parses the leading integer of `s`, ignoring leading whitespace.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    INT_PREFIX
        .find(s.trim_start())
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

fn float_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }
}

/// `f64` field that defaults to zero when missing, null or unparseable.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(float_from_value).unwrap_or(0.0))
}

/// `i64` field that defaults to zero when missing, null or unparseable.
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => parse_int_prefix(&s),
        _ => None,
    };
    Ok(parsed.unwrap_or(0))
}

/// Optional age: absent, blank or non-numeric input means "not given".
pub fn lenient_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => parse_int_prefix(&s).and_then(|v| u64::try_from(v).ok()),
        _ => None,
    };
    Ok(parsed.and_then(|v| u32::try_from(v).ok()))
}
