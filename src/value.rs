//! Scalar cell values.
//!
//! Interaction tables hold heterogeneous identifiers (numeric ids, opaque strings),
//! numeric ratings and numeric or ISO-8601 timestamps. [`Value`] is the closed set of
//! cell types with a total order so any column can be sorted, hashed and grouped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single cell of a [`Frame`](crate::Frame).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl Value {
    /// Infer a value from a text token.
    ///
    /// Integers are only recognized in canonical form, so `"007"` stays a string and
    /// writing the value back reproduces the original token.
    #[must_use]
    pub fn infer(token: &str) -> Self {
        if token.is_empty() {
            return Self::Null;
        }
        if let Ok(i) = token.parse::<i64>()
            && i.to_string() == token
        {
            return Self::Int(i);
        }
        let looks_numeric = token
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
        if looks_numeric && let Ok(f) = token.parse::<f64>() {
            return Self::Float(OrderedFloat(f));
        }
        Self::Str(token.to_string())
    }

    #[must_use]
    pub const fn float(v: f64) -> Self {
        Self::Float(OrderedFloat(v))
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, if it has one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(f.0),
            Self::Str(s) => s.trim().parse::<f64>().ok(),
            Self::Null => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Seconds since the Unix epoch for numeric or ISO-8601 timestamps.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_timestamp(&self) -> Option<f64> {
        match self {
            Self::Int(_) | Self::Float(_) => self.as_f64(),
            Self::Str(s) => parse_iso8601(s),
            Self::Null => None,
        }
    }

    /// Convert a JSON scalar. Arrays and objects are rejected with `None`.
    #[must_use]
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            serde_json::Value::Number(n) => Some(
                n.as_i64()
                    .map_or_else(|| Self::float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            ),
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(f.0)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Str(s) => serde_json::Value::String(s.clone()),
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int(_) | Self::Float(_) => 1,
            Self::Str(_) => 2,
        }
    }
}

/// Parse the ISO-8601 shapes found in public datasets into epoch seconds.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn parse_iso8601(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_micros()) / 1e6);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp() as f64);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp() as f64)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    // Numbers compare numerically across Int/Float; an Int sorts before an equal Float
    // so Eq and Hash stay consistent.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.cmp(b),
            (Self::Int(a), Self::Float(b)) => {
                #[allow(clippy::cast_precision_loss)]
                OrderedFloat(*a as f64).cmp(b).then(Ordering::Less)
            }
            (Self::Float(a), Self::Int(b)) => {
                #[allow(clippy::cast_precision_loss)]
                a.cmp(&OrderedFloat(*b as f64)).then(Ordering::Greater)
            }
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Null, Self::Null) => Ordering::Equal,
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Int(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                2u8.hash(state);
                f.hash(state);
            }
            Self::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(i) => write!(f, "{i}"),
            // keep a fractional part so the token is read back as a float
            Self::Float(v) if v.0.is_finite() && v.0.fract() == 0.0 => write!(f, "{:.1}", v.0),
            Self::Float(v) => write!(f, "{}", v.0),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
