//! Case parameter values and records
//!
//! A `ParamRecord` is an insertion-ordered map from parameter name to a
//! scalar (or small list) value. Keys beginning with `_` are private: the
//! test body can read them, but they are excluded from the case's printable
//! identity and are rejected in query text.
//!
//! Values are printed in JSON syntax, except the bare word `undefined`.
//! The printed form and the value are mutually invertible, which is what
//! makes case names stable keys for expectation files and the worker
//! protocol.

use crate::separators::PARAM_SEPARATOR;
use crate::QueryError;
use indexmap::IndexMap;
use std::fmt;

/// A single parameter value
///
/// The engine never interprets these; they only need equality and a
/// canonical printed form.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Undefined => write!(f, "undefined"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => {
                // JSON float syntax; integral floats keep a trailing `.0` so
                // they stay distinguishable from Int on re-parse.
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            ParamValue::Str(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                write!(f, "{quoted}")
            }
            ParamValue::IntList(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}
impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}
impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v.into())
    }
}
impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}
impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}
impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}
impl From<Vec<i64>> for ParamValue {
    fn from(v: Vec<i64>) -> Self {
        ParamValue::IntList(v)
    }
}

/// Parse one printed parameter value back into a `ParamValue`.
pub fn parse_param_value(text: &str) -> Result<ParamValue, QueryError> {
    if text == "undefined" {
        return Ok(ParamValue::Undefined);
    }
    let bad = || QueryError::BadParamValue {
        value: text.to_string(),
    };
    let value: serde_json::Value = serde_json::from_str(text).map_err(|_| bad())?;
    match value {
        serde_json::Value::Bool(b) => Ok(ParamValue::Bool(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ParamValue::Int(i))
            } else {
                n.as_f64().map(ParamValue::Float).ok_or_else(bad)
            }
        }
        serde_json::Value::String(s) => Ok(ParamValue::Str(s)),
        serde_json::Value::Array(items) => {
            let ints = items
                .iter()
                .map(|v| v.as_i64())
                .collect::<Option<Vec<i64>>>()
                .ok_or_else(bad)?;
            Ok(ParamValue::IntList(ints))
        }
        _ => Err(bad()),
    }
}

/// Characters that may never appear in a printed parameter value.
///
/// A value containing one would make the printed case name unparseable:
/// `;` splits params, `=` splits key from value, `*` is the wildcard.
/// `,` and `:` are fine here because the params level is split last.
pub const BAD_PARAM_VALUE_CHARS: &[char] = &[';', '=', '*'];

/// Check a value's printed form for separator characters.
pub fn param_value_text_is_valid(text: &str) -> bool {
    !text.contains(BAD_PARAM_VALUE_CHARS)
}

/// A file segment, test segment, or parameter key: `[A-Za-z0-9_]+`.
pub fn valid_query_part(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Keys beginning with `_` are private to the test body.
pub fn param_key_is_public(key: &str) -> bool {
    !key.starts_with('_')
}

/// An insertion-ordered parameter record
///
/// Insertion order is part of the data model: it determines the printed
/// case name, which must be deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamRecord {
    entries: IndexMap<String, ParamValue>,
}

impl ParamRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous value for the key if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries that participate in the case's printable identity.
    pub fn public_entries(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.iter().filter(|(k, _)| param_key_is_public(k))
    }

    /// Public entries as `(key, printed value)` pairs, in insertion order.
    pub fn public_text_entries(&self) -> Vec<(String, String)> {
        self.public_entries()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl FromIterator<(String, ParamValue)> for ParamRecord {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Print the public entries of a record as `k1=v1;k2=v2`.
pub fn stringify_public_params(record: &ParamRecord) -> String {
    record
        .public_entries()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(&PARAM_SEPARATOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn value_display_roundtrip() {
        let values = [
            ParamValue::Undefined,
            ParamValue::Bool(true),
            ParamValue::Int(-3),
            ParamValue::Float(1.5),
            ParamValue::Float(2.0),
            ParamValue::Str("storage".to_string()),
            ParamValue::IntList(vec![1, 2, 3]),
        ];
        for v in values {
            let text = v.to_string();
            assert_eq!(parse_param_value(&text).unwrap(), v, "on: {text}");
        }
    }

    #[test]
    fn integral_float_stays_float() {
        assert_eq!(ParamValue::Float(2.0).to_string(), "2.0");
        assert_eq!(parse_param_value("2.0").unwrap(), ParamValue::Float(2.0));
        assert_eq!(parse_param_value("2").unwrap(), ParamValue::Int(2));
    }

    #[test]
    fn bad_values_rejected() {
        for text in ["", "nope", "{\"a\":1}", "[1,\"x\"]", "null"] {
            assert!(parse_param_value(text).is_err(), "on: {text}");
        }
    }

    #[test]
    fn private_keys_excluded_from_stringification() {
        let mut record = ParamRecord::new();
        record.insert("mode", "read");
        record.insert("_private", 7);
        record.insert("size", 16);
        assert_eq!(stringify_public_params(&record), "mode=\"read\";size=16");
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn insertion_order_preserved() {
        let mut record = ParamRecord::new();
        record.insert("z", 1);
        record.insert("a", 2);
        assert_eq!(stringify_public_params(&record), "z=1;a=2");
    }

    #[test]
    fn query_part_validity() {
        assert!(valid_query_part("buffer_mapping"));
        assert!(valid_query_part("a1"));
        assert!(!valid_query_part(""));
        assert!(!valid_query_part("a b"));
        assert!(!valid_query_part("a*"));
        assert!(!valid_query_part("a,b"));
    }
}
