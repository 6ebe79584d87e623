//! Output scalars.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One output row: alias → value, in field order.
pub type Record = IndexMap<String, Value>;

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Raw `NUMERIC` as decoded; normalized away before reaching callers.
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integral decimals become `Integer`, fractional ones `Float`.
    pub fn normalize_numeric(self) -> Value {
        match self {
            Value::Decimal(d) => {
                if d.fract().is_zero() {
                    if let Some(i) = d.to_i64() {
                        return Value::Integer(i);
                    }
                }
                d.to_f64().map(Value::Float).unwrap_or(Value::Null)
            }
            other => other,
        }
    }

    /// Coerce to an integer, whatever numeric subtype the engine returned.
    pub fn into_integer(self) -> Value {
        match self {
            Value::Integer(i) => Value::Integer(i),
            Value::Float(f) => Value::Integer(f.round() as i64),
            Value::Decimal(d) => d.round().to_i64().map(Value::Integer).unwrap_or(Value::Null),
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or(Value::Text(s)),
            other => other,
        }
    }

    /// Interpret naive timestamps as UTC.
    pub fn from_naive_datetime(naive: NaiveDateTime) -> Value {
        Value::DateTime(naive.and_utc())
    }
}

/// How a raw result cell is re-hydrated for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRule {
    /// Keep as decoded (decimals still normalized).
    Passthrough,
    /// Timestamps in UTC.
    Timestamp,
    Date,
    Integer,
    /// Integer when integral, float otherwise.
    Numeric,
}

impl ValueRule {
    pub fn apply(&self, value: Value) -> Value {
        match self {
            ValueRule::Passthrough => value.normalize_numeric(),
            ValueRule::Timestamp => match value {
                Value::Text(s) => match DateTime::parse_from_rfc3339(&s) {
                    Ok(dt) => Value::DateTime(dt.with_timezone(&Utc)),
                    Err(_) => Value::Text(s),
                },
                other => other,
            },
            ValueRule::Date => match value {
                Value::Text(s) => match NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                    Ok(date) => Value::Date(date),
                    Err(_) => Value::Text(s),
                },
                Value::DateTime(dt) => Value::Date(dt.date_naive()),
                other => other,
            },
            ValueRule::Integer => value.into_integer(),
            ValueRule::Numeric => match value {
                Value::Text(s) => match s.trim().parse::<Decimal>() {
                    Ok(d) => Value::Decimal(d).normalize_numeric(),
                    Err(_) => Value::Text(s),
                },
                other => other.normalize_numeric(),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
