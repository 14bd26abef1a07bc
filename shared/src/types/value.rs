//! Free-form values found in allocation properties
//!
//! The Allocation API returns `properties` and `window` as arbitrary JSON.
//! Instead of carrying `serde_json::Value` around, the decoder converts them
//! into [`LabelValue`], a closed set of shapes the canonicalizer can match on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mapping of property names to values, ordered by key
pub type LabelMap = BTreeMap<String, LabelValue>;

/// A dynamically-typed value decoded from the Allocation API
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum LabelValue {
    /// JSON `null`, or a key that is present without a value
    #[default]
    Null,
    Bool(bool),
    String(String),
    /// A JSON number without fractional part that fits in an `i64`
    Integer(i64),
    Float(f64),
    Sequence(Vec<LabelValue>),
    Mapping(LabelMap),
}

/// Shape of a scalar, used to pick an ordering for sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Text,
    Number,
    Bool,
}

impl LabelValue {
    /// Scalar kind of this value, `None` for null, sequences and mappings
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            LabelValue::String(_) => Some(ScalarKind::Text),
            LabelValue::Integer(_) | LabelValue::Float(_) => Some(ScalarKind::Number),
            LabelValue::Bool(_) => Some(ScalarKind::Bool),
            _ => None,
        }
    }

    /// Borrow the inner mapping, if this value is one
    pub fn as_mapping(&self) -> Option<&LabelMap> {
        match self {
            LabelValue::Mapping(m) => Some(m),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for LabelValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => LabelValue::Null,
            Value::Bool(b) => LabelValue::Bool(b),
            Value::String(s) => LabelValue::String(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => LabelValue::Integer(i),
                // u64 above i64::MAX and all fractional numbers
                None => LabelValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::Array(items) => {
                LabelValue::Sequence(items.into_iter().map(LabelValue::from).collect())
            }
            Value::Object(map) => LabelValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, LabelValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<LabelValue> for serde_json::Value {
    fn from(value: LabelValue) -> Self {
        use serde_json::Value;

        match value {
            LabelValue::Null => Value::Null,
            LabelValue::Bool(b) => Value::Bool(b),
            LabelValue::String(s) => Value::String(s),
            LabelValue::Integer(i) => Value::from(i),
            LabelValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            LabelValue::Sequence(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            LabelValue::Mapping(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for LabelValue {
    fn from(s: &str) -> Self {
        LabelValue::String(s.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(s: String) -> Self {
        LabelValue::String(s)
    }
}

impl From<i64> for LabelValue {
    fn from(i: i64) -> Self {
        LabelValue::Integer(i)
    }
}

impl From<f64> for LabelValue {
    fn from(f: f64) -> Self {
        LabelValue::Float(f)
    }
}

impl From<bool> for LabelValue {
    fn from(b: bool) -> Self {
        LabelValue::Bool(b)
    }
}
