//! Core data types for epsg-convert

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell of a row-set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value
    Null,
    /// Boolean flag
    Bool(bool),
    /// Any numeric value
    Number(f64),
    /// Free text
    Text(String),
}

impl Value {
    /// Parses a raw text field the way delimited-text loaders infer types:
    /// empty is null, numbers become numbers, everything else stays text
    pub fn infer(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if let Ok(number) = trimmed.parse::<f64>() {
            return Value::from_f64(number);
        }
        match trimmed {
            "true" | "True" | "TRUE" => Value::Bool(true),
            "false" | "False" | "FALSE" => Value::Bool(false),
            _ => Value::Text(field.to_string()),
        }
    }

    /// Wraps a float, mapping non-finite results to null
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Value::Number(value)
        } else {
            Value::Null
        }
    }

    /// Returns true for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell; text is parsed, null and booleans are `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}
