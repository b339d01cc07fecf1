//! Normalization of event timestamps into UTC instants.
//!
//! Producers send ISO-8601 strings, epoch seconds as JSON numbers, or epoch
//! seconds as numeric strings. Anything unparseable is replaced with the
//! current time, and the replacement is tagged so callers can see it.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

static EPOCH_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("epoch pattern is a valid regex"));

/// Outcome of normalizing a raw timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedTimestamp {
    Parsed(DateTime<Utc>),
    /// The raw value could not be read; `now` stands in for it.
    Fallback {
        now: DateTime<Utc>,
        raw: Value,
        reason: String,
    },
}

impl NormalizedTimestamp {
    pub fn instant(&self) -> DateTime<Utc> {
        match self {
            NormalizedTimestamp::Parsed(at) => *at,
            NormalizedTimestamp::Fallback { now, .. } => *now,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, NormalizedTimestamp::Fallback { .. })
    }
}

/// Normalize a raw JSON timestamp. Absent or `null` yields `None`.
pub fn normalize(raw: Option<&Value>) -> Option<NormalizedTimestamp> {
    let raw = raw?;
    let parsed = match raw {
        Value::Null => return None,
        Value::String(s) => parse_str(s),
        Value::Number(n) => parse_number(n),
        other => Err(format!("unsupported timestamp type: {}", json_kind(other))),
    };

    Some(match parsed {
        Ok(at) => NormalizedTimestamp::Parsed(at),
        Err(reason) => {
            warn!(raw = %raw, reason = %reason, "Unparseable event timestamp, using current time");
            NormalizedTimestamp::Fallback {
                now: Utc::now(),
                raw: raw.clone(),
                reason,
            }
        }
    })
}

fn parse_str(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if EPOCH_SECONDS.is_match(s) {
        // Whole seconds only; the fractional part is dropped.
        let whole = s.split('.').next().unwrap_or(s);
        let secs: i64 = whole
            .parse()
            .map_err(|e| format!("epoch seconds '{s}' out of range: {e}"))?;
        return from_epoch_seconds(secs);
    }

    DateTime::parse_from_rfc3339(s)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("invalid ISO-8601 timestamp '{s}': {e}"))
}

fn parse_number(n: &serde_json::Number) -> Result<DateTime<Utc>, String> {
    if let Some(secs) = n.as_i64() {
        return from_epoch_seconds(secs);
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => {
            from_epoch_seconds(f.trunc() as i64)
        }
        _ => Err(format!("epoch seconds {n} out of range")),
    }
}

fn from_epoch_seconds(secs: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| format!("epoch seconds {secs} out of range"))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
