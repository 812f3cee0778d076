//! Value coercion and range validation
//!
//! Pure functions only: no logging, no state. Callers decide what a failed
//! coercion means (reject the message, emit an ack, ...).

use serde_json::{Number, Value};

use crate::framework::catalog::Format;

/// Result of coercing a raw wire value against declared properties.
///
/// `value` is always populated with the parsed form, even when `valid` is
/// false, so callers can quote the offending value in diagnostics. An
/// invalid value must never be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: Value,
    pub valid: bool,
}

/// Coerce `raw` to `format`, range-checking numerics against
/// `[min_value, max_value]` (inclusive).
///
/// - `bool`: `0`, `"0"` and `false` coerce to `false`, everything else to
///   `true`. Always valid.
/// - integer formats: parsed as integer, valid only inside the bounds.
/// - `float`: parsed as float, same bound check.
/// - anything else: passed through untouched, always valid.
pub fn coerce(format: Format, raw: &Value, min_value: Option<f64>, max_value: Option<f64>) -> Coerced {
    match format {
        Format::Bool => Coerced {
            value: Value::Bool(!is_falsy(raw)),
            valid: true,
        },
        Format::Int | Format::Uint8 | Format::Uint16 | Format::Uint32 => {
            match parse_number(raw) {
                Some(n) => {
                    let i = n.trunc() as i64;
                    Coerced {
                        value: Value::Number(Number::from(i)),
                        valid: in_bounds(i as f64, min_value, max_value),
                    }
                }
                None => Coerced {
                    value: raw.clone(),
                    valid: false,
                },
            }
        }
        Format::Float => match parse_number(raw).and_then(Number::from_f64) {
            Some(n) => {
                let f = n.as_f64().unwrap_or(0.0);
                Coerced {
                    value: Value::Number(n),
                    valid: in_bounds(f, min_value, max_value),
                }
            }
            None => Coerced {
                value: raw.clone(),
                valid: false,
            },
        },
        Format::String => Coerced {
            value: raw.clone(),
            valid: true,
        },
    }
}

/// Falsy test for the boolean coercion: `0`, `"0"` and `false`.
fn is_falsy(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim() == "0",
        _ => false,
    }
}

/// Extract a numeric reading from a JSON value (numbers pass through,
/// numeric strings are parsed).
fn parse_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn in_bounds(v: f64, min_value: Option<f64>, max_value: Option<f64>) -> bool {
    if let Some(min) = min_value {
        if v < min {
            return false;
        }
    }
    if let Some(max) = max_value {
        if v > max {
            return false;
        }
    }
    true
}

/// Render a value the way the ack messages quote it (bare, unquoted strings).
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
