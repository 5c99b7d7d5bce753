//! Runtime values and casting
//!
//! Block arguments are loosely typed: any value can be read as a number,
//! boolean or string. The casting functions here are total: malformed input
//! is coerced, never raised.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Value {
    /// The empty string, used wherever a block has nothing to report
    pub fn empty() -> Self {
        Value::Str(String::new())
    }

    pub fn to_number(&self) -> f64 {
        to_number(self)
    }

    pub fn to_boolean(&self) -> bool {
        to_boolean(self)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_string(self))
    }
}

/* ===================== Casting ===================== */

/// Read a value as a number. Anything that doesn't parse is 0.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Num(n) if n.is_nan() => 0.0,
        Value::Num(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        Value::Str(s) => parse_number(s).unwrap_or(0.0),
    }
}

/// Read a value as a boolean.
///
/// Strings are false only when empty, `"0"` or `"false"` (any case).
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
    }
}

/// Read a value as a string, formatting whole numbers without a fraction.
pub fn to_string(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Num(n) => format_number(*n),
    }
}

/// Round half up, matching the rounding the block language has always used
/// (`round(-0.5) == 0`, `round(2.5) == 3`).
pub fn round(n: f64) -> f64 {
    (n + 0.5).floor()
}

/// Compare two values: numerically when both look like numbers, otherwise
/// as case-insensitive strings.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => to_string(a)
            .to_lowercase()
            .cmp(&to_string(b).to_lowercase()),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Num(n) if n.is_nan() => None,
        Value::Num(n) => Some(*n),
        Value::Bool(_) => None,
        Value::Str(s) if s.trim().is_empty() => None,
        Value::Str(s) => parse_number(s),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }

    match t {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }

    // Rust accepts "inf" and "nan" spellings that aren't numbers here
    if t.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') {
        return None;
    }

    t.parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{}", n)
    }
}
