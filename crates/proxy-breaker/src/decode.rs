//! Field-by-field decoding of untyped configuration maps.
//!
//! Every reader returns `None` when the key is missing or holds a value of the
//! wrong shape, so callers keep the field's zero value and carry on with the
//! rest of the map.

use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`parse_duration`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("negative duration {0:?}")]
    Negative(String),

    #[error("duration {0:?} out of range")]
    Overflow(String),
}

const NANOS_PER_MICRO: f64 = 1e3;
const NANOS_PER_MILLI: f64 = 1e6;
const NANOS_PER_SEC: f64 = 1e9;

fn unit_nanos(unit: &str) -> Option<f64> {
    match unit {
        "ns" => Some(1.0),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60.0 * NANOS_PER_SEC),
        "h" => Some(3600.0 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parses a duration such as `"10s"`, `"1.5h"` or `"2h45m30.5s"`.
///
/// The input is a sequence of decimal numbers, each followed by a unit
/// (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`), optionally preceded by a sign. A
/// bare `"0"` is accepted. Negative durations are rejected since they cannot
/// be represented.
///
/// # Example
///
/// ```rust
/// use proxy_breaker::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert!(parse_duration("ten seconds").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let invalid = || ParseDurationError::Invalid(input.to_string());

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = 0.0_f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(invalid());
        }
        let value: f64 = number.parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        if unit.is_empty() {
            return Err(ParseDurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| ParseDurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;
        rest = &rest[unit_len..];

        total += value * scale;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(ParseDurationError::Overflow(input.to_string()));
    }
    if negative && total > 0.0 {
        return Err(ParseDurationError::Negative(input.to_string()));
    }

    Ok(Duration::from_nanos(total.round() as u64))
}

/// Formats a duration in the syntax accepted by [`parse_duration`].
pub(crate) fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        String::from("0s")
    } else if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else if duration.subsec_nanos() % 1_000_000 == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}ns", duration.as_nanos())
    }
}

/// Looks up `key`, falling back to its deprecated spelling.
pub(crate) fn aliased<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    deprecated: &str,
) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    let value = map.get(deprecated)?;
    tracing::warn!(
        option = deprecated,
        replacement = key,
        "deprecated circuit breaker option, use the camelCase spelling"
    );
    Some(value)
}

/// Reads a non-negative integer, accepting integer and float encodings.
pub(crate) fn uint(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f.trunc() as u64)
        }),
        _ => None,
    }
}

pub(crate) fn uint32(value: Option<&Value>) -> Option<u32> {
    uint(value).and_then(|n| u32::try_from(n).ok())
}

pub(crate) fn boolean(value: Option<&Value>) -> Option<bool> {
    value?.as_bool()
}

pub(crate) fn string(value: Option<&Value>) -> Option<String> {
    value?.as_str().map(str::to_owned)
}

pub(crate) fn duration(value: Option<&Value>) -> Option<Duration> {
    let raw = value?.as_str()?;
    match parse_duration(raw) {
        Ok(d) => Some(d),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring circuit breaker duration");
            None
        }
    }
}
