//! Dynamic values produced by response cleaning.
//!
//! # Design
//! The vendor encodes nearly every field as a JSON string, so a cleaned
//! response is a tree whose leaves can be any of several native types.
//! `Value` is that tree. Maps use `IndexMap` so records keep the order the
//! vendor sent them; equality between maps ignores order.
//!
//! `Key` exists because cleaning changes key types: group responses are keyed
//! by stringified record ids that become integers, and PHP-serialized blobs
//! carry raw byte-string keys.

use std::fmt;
use std::ops::Index;

use chrono::{DateTime, Local, NaiveDate};
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// Ordered map used for every cleaned mapping.
pub type Map = IndexMap<Key, Value>;

static NULL: Value = Value::Null;

/// A mapping key inside a cleaned value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            Key::Bytes(b) => std::str::from_utf8(b).ok(),
            Key::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<&[u8]> for Key {
    fn from(value: &[u8]) -> Self {
        Key::Bytes(value.to_vec())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => f.write_str(s),
            Key::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// A cleaned response value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Local>),
    Date(NaiveDate),
    List(Vec<Value>),
    Map(Map),
}

impl Value {
    /// Convert decoded JSON into a value tree. Object keys become `Key::Str`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(object) => Value::Map(
                object
                    .into_iter()
                    .map(|(k, v)| (Key::Str(k), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Decimal(_) => "decimal",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Local>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `key` when this value is a map.
    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(&key.into()))
    }
}

impl Index<&str> for Value {
    type Output = Value;

    /// Missing keys and non-map values index to `Null`.
    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<i64> for Value {
    type Output = Value;

    fn index(&self, key: i64) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<DateTime<Local>> for Value {
    fn from(value: DateTime<Local>) -> Self {
        Value::DateTime(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_keeps_strings_as_strings() {
        let value = Value::from_json(json!({"clientid": "50", "balance": "1.00"}));
        assert_eq!(value["clientid"], Value::Str("50".to_string()));
        assert_eq!(value["balance"], Value::Str("1.00".to_string()));
    }

    #[test]
    fn from_json_maps_numbers() {
        let value = Value::from_json(json!([1, 2.5, null, true]));
        assert_eq!(
            value,
            Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Null,
                Value::Bool(true)
            ])
        );
    }

    #[test]
    fn index_on_missing_key_is_null() {
        let value = Value::from_json(json!({"a": {"b": "c"}}));
        assert_eq!(value["a"]["b"], Value::from("c"));
        assert!(value["a"]["missing"].is_null());
        assert!(value["a"]["b"]["deeper"].is_null());
    }

    #[test]
    fn map_equality_ignores_order() {
        let a = Value::from_json(json!({"x": "1", "y": "2"}));
        let b = Value::from_json(json!({"y": "2", "x": "1"}));
        assert_eq!(a, b);
    }

    #[test]
    fn from_json_keeps_vendor_field_order() {
        let raw = r#"{"login": "bob", "clientid": "50", "active": "1", "balance": "0.00"}"#;
        let value = Value::from_json(serde_json::from_str(raw).unwrap());
        let keys: Vec<String> = value.as_map().unwrap().keys().map(Key::to_string).collect();
        assert_eq!(keys, ["login", "clientid", "active", "balance"]);
    }

    #[test]
    fn keys_display_without_quotes() {
        assert_eq!(Key::from("key1").to_string(), "key1");
        assert_eq!(Key::from(7).to_string(), "7");
        assert_eq!(Key::from(&b"cbms"[..]).to_string(), "cbms");
    }

    #[test]
    fn byte_keys_read_as_str_when_utf8() {
        let key = Key::from(&b"cbms"[..]);
        assert_eq!(key.as_str(), Some("cbms"));
        assert_eq!(key.as_int(), None);
    }
}
