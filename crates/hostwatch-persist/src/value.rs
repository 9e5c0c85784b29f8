//! Primitive field kinds and values.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// The primitive kind of a leaf field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    String,
    Boolean,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }

    /// Parse the lowercase kind name used in schema descriptions.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current value of a leaf field.
///
/// Numbers keep their JSON representation so integers written by the
/// embedder are stored as integers.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Number(Number),
    String(String),
    Boolean(bool),
}

impl FieldValue {
    /// A number value from a float. Returns `None` for NaN and infinities.
    pub fn float(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Self::Number)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Number(_) => FieldKind::Number,
            Self::String(_) => FieldKind::String,
            Self::Boolean(_) => FieldKind::Boolean,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Boolean(b) => Value::Bool(*b),
        }
    }

    /// Interpret a JSON value as a field value.
    ///
    /// Returns `None` for `null`, arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Bool(b) => Some(Self::Boolean(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                Self::Number(Number::from(v))
            }
        })*
    };
}

number_from!(i32, i64, u32, u64, usize);

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_stay_integers() {
        let v = FieldValue::from(4);
        assert_eq!(v.to_json(), json!(4));
        assert_eq!(v.as_i64(), Some(4));
        assert_eq!(v.kind(), FieldKind::Number);
    }

    #[test]
    fn float_rejects_nan() {
        assert!(FieldValue::float(f64::NAN).is_none());
        assert_eq!(FieldValue::float(1.5).unwrap().as_f64(), Some(1.5));
    }

    #[test]
    fn from_json_ignores_structures() {
        assert_eq!(FieldValue::from_json(&json!(null)), None);
        assert_eq!(FieldValue::from_json(&json!({"a": 1})), None);
        assert_eq!(FieldValue::from_json(&json!([1])), None);
        assert_eq!(
            FieldValue::from_json(&json!("x")),
            Some(FieldValue::from("x"))
        );
    }

    #[test]
    fn kind_names() {
        assert_eq!(FieldKind::parse("boolean"), Some(FieldKind::Boolean));
        assert_eq!(FieldKind::parse("Boolean"), None);
        assert_eq!(FieldKind::String.to_string(), "string");
    }
}
