//! Field cleaning: coercing the vendor's string-typed fields into native types.
//!
//! # Design
//! Two layers:
//! - `Converter` is an atomic conversion (`int`, `decimal`, `timestamp`, ...).
//!   Every converter is idempotent on input that already has its output type,
//!   and passes `Null` through untouched.
//! - `Cleaner` composes converters over dicts and lists, targeting every
//!   key/value/element or only named keys and indices, nesting to any depth.
//!
//! `FieldRules` is the declarative per-call alternative: a rename table plus
//! one list of field names per converter, applied by the generic flat and
//! group algorithms. Only string-valued fields that are present are touched.
//!
//! The vendor emits thousands separators (`"1,234.56"`) and blank numeric
//! fields; `int` and `decimal` strip the former and turn the latter into
//! `Null` instead of failing.

use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::php::{self, PhpError};
use crate::value::{Key, Map, Value};

/// Input format of `date` fields, e.g. `Aug/31/2011`.
pub const DATE_FORMAT: &str = "%b/%d/%Y";

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("cannot convert {value:?} with the `{converter}` cleaner")]
    Invalid {
        converter: &'static str,
        value: String,
    },

    #[error("the `{converter}` cleaner does not accept a {kind}")]
    WrongType {
        converter: &'static str,
        kind: &'static str,
    },

    #[error("expected a {expected}, found a {found}")]
    Shape {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing key `{0}`")]
    MissingKey(Key),

    #[error("index {index} is out of range for a list of length {len}")]
    MissingIndex { index: usize, len: usize },

    #[error("php unserialize failed: {0}")]
    Php(#[from] PhpError),
}

fn invalid(converter: &'static str, value: &str) -> CleanError {
    CleanError::Invalid {
        converter,
        value: value.to_string(),
    }
}

/// Parse an integer, stripping thousands separators. Blank input is `None`.
pub fn clean_int(raw: &str) -> Result<Option<i64>, CleanError> {
    let stripped = raw.trim().replace(',', "");
    if stripped.is_empty() {
        return Ok(None);
    }
    stripped
        .parse::<i64>()
        .map(Some)
        .map_err(|_| invalid("int", raw))
}

/// Parse an exact decimal, stripping thousands separators. Blank input is `None`.
pub fn clean_decimal(raw: &str) -> Result<Option<Decimal>, CleanError> {
    let stripped = raw.trim().replace(',', "");
    if stripped.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(&stripped)
        .or_else(|_| Decimal::from_scientific(&stripped))
        .map(Some)
        .map_err(|_| invalid("decimal", raw))
}

pub fn clean_float(raw: &str) -> Result<f64, CleanError> {
    raw.trim().parse::<f64>().map_err(|_| invalid("float", raw))
}

/// Blank, `0`, `false`, `no` and `off` are false; everything else is true.
pub fn clean_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    !matches!(lowered.as_str(), "" | "0" | "false" | "no" | "off")
}

/// Interpret seconds since the epoch (fractions allowed) as local time.
pub fn clean_timestamp(raw: &str) -> Result<DateTime<Local>, CleanError> {
    let seconds = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| invalid("timestamp", raw))?;
    timestamp_from_f64(seconds).ok_or_else(|| invalid("timestamp", raw))
}

fn timestamp_from_f64(seconds: f64) -> Option<DateTime<Local>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).map(|utc| utc.with_timezone(&Local))
}

/// Parse a `Mon/DD/YYYY` date such as `Aug/31/2011`.
pub fn clean_date(raw: &str) -> Result<NaiveDate, CleanError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| invalid("date", raw))
}

pub fn clean_php(raw: &[u8]) -> Result<Value, CleanError> {
    Ok(php::unserialize(raw)?)
}

/// An atomic field converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Converter {
    Bool,
    Int,
    Decimal,
    Float,
    Timestamp,
    Date,
    PhpSerialized,
    Str,
}

impl Converter {
    pub fn name(self) -> &'static str {
        match self {
            Converter::Bool => "bool",
            Converter::Int => "int",
            Converter::Decimal => "decimal",
            Converter::Float => "float",
            Converter::Timestamp => "timestamp",
            Converter::Date => "date",
            Converter::PhpSerialized => "php_serialized",
            Converter::Str => "str",
        }
    }

    /// Convert one value.
    pub fn apply(self, value: Value) -> Result<Value, CleanError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let wrong_type = |value: &Value| CleanError::WrongType {
            converter: self.name(),
            kind: value.kind(),
        };
        match self {
            Converter::Bool => match value {
                Value::Bool(_) => Ok(value),
                Value::Str(s) => Ok(Value::Bool(clean_bool(&s))),
                Value::Int(i) => Ok(Value::Bool(i != 0)),
                Value::Float(f) => Ok(Value::Bool(f != 0.0)),
                Value::Decimal(d) => Ok(Value::Bool(!d.is_zero())),
                other => Err(wrong_type(&other)),
            },
            Converter::Int => match value {
                Value::Int(_) => Ok(value),
                Value::Str(s) => Ok(clean_int(&s)?.map_or(Value::Null, Value::Int)),
                Value::Bytes(b) => {
                    let text = String::from_utf8_lossy(&b);
                    Ok(clean_int(&text)?.map_or(Value::Null, Value::Int))
                }
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                Value::Decimal(d) => d
                    .trunc()
                    .to_i64()
                    .map(Value::Int)
                    .ok_or_else(|| invalid("int", &d.to_string())),
                other => Err(wrong_type(&other)),
            },
            Converter::Decimal => match value {
                Value::Decimal(_) => Ok(value),
                Value::Str(s) => Ok(clean_decimal(&s)?.map_or(Value::Null, Value::Decimal)),
                Value::Int(i) => Ok(Value::Decimal(Decimal::from(i))),
                Value::Float(f) => Decimal::try_from(f)
                    .map(Value::Decimal)
                    .map_err(|_| invalid("decimal", &f.to_string())),
                other => Err(wrong_type(&other)),
            },
            Converter::Float => match value {
                Value::Float(_) => Ok(value),
                Value::Str(s) => Ok(Value::Float(clean_float(&s)?)),
                Value::Int(i) => Ok(Value::Float(i as f64)),
                Value::Decimal(d) => d
                    .to_f64()
                    .map(Value::Float)
                    .ok_or_else(|| invalid("float", &d.to_string())),
                other => Err(wrong_type(&other)),
            },
            Converter::Timestamp => match value {
                Value::DateTime(_) => Ok(value),
                Value::Str(s) => Ok(Value::DateTime(clean_timestamp(&s)?)),
                Value::Int(i) => timestamp_from_f64(i as f64)
                    .map(Value::DateTime)
                    .ok_or_else(|| invalid("timestamp", &i.to_string())),
                Value::Float(f) => timestamp_from_f64(f)
                    .map(Value::DateTime)
                    .ok_or_else(|| invalid("timestamp", &f.to_string())),
                other => Err(wrong_type(&other)),
            },
            Converter::Date => match value {
                Value::Date(_) => Ok(value),
                Value::Str(s) => Ok(Value::Date(clean_date(&s)?)),
                other => Err(wrong_type(&other)),
            },
            Converter::PhpSerialized => match value {
                Value::Map(_) | Value::List(_) => Ok(value),
                Value::Str(s) => clean_php(s.as_bytes()),
                Value::Bytes(b) => clean_php(&b),
                other => Err(wrong_type(&other)),
            },
            Converter::Str => match value {
                Value::Str(_) => Ok(value),
                Value::Bytes(b) => Ok(Value::Str(String::from_utf8_lossy(&b).into_owned())),
                Value::Int(i) => Ok(Value::Str(i.to_string())),
                Value::Decimal(d) => Ok(Value::Str(d.to_string())),
                Value::Float(f) => Ok(Value::Str(f.to_string())),
                Value::Bool(b) => Ok(Value::Str(b.to_string())),
                Value::Date(d) => Ok(Value::Str(d.format(DATE_FORMAT).to_string())),
                other => Err(wrong_type(&other)),
            },
        }
    }

    /// Convert a mapping key. Only `int` and `str` apply to keys.
    pub fn apply_key(self, key: Key) -> Result<Key, CleanError> {
        match (self, key) {
            (Converter::Int, key @ Key::Int(_)) => Ok(key),
            (Converter::Int, Key::Str(s)) => match clean_int(&s)? {
                Some(i) => Ok(Key::Int(i)),
                None => Err(invalid("int", &s)),
            },
            (Converter::Int, Key::Bytes(b)) => {
                let text = String::from_utf8_lossy(&b).into_owned();
                match clean_int(&text)? {
                    Some(i) => Ok(Key::Int(i)),
                    None => Err(invalid("int", &text)),
                }
            }
            (Converter::Str, key @ Key::Str(_)) => Ok(key),
            (Converter::Str, Key::Int(i)) => Ok(Key::Str(i.to_string())),
            (Converter::Str, Key::Bytes(b)) => Ok(Key::Str(String::from_utf8_lossy(&b).into_owned())),
            (converter, _) => Err(CleanError::WrongType {
                converter: converter.name(),
                kind: "key",
            }),
        }
    }
}

/// How a dict cleaner treats keys.
#[derive(Debug, Clone)]
pub enum KeyRule {
    All(Converter),
    Only(Vec<(Key, Converter)>),
}

/// How a container cleaner treats values; `K` is `Key` for dicts and
/// `usize` for lists.
#[derive(Debug, Clone)]
pub enum ValueRule<K> {
    All(Box<Cleaner>),
    Only(Vec<(K, Cleaner)>),
}

/// A composable cleaner.
#[derive(Debug, Clone, Default)]
pub enum Cleaner {
    #[default]
    Identity,
    Atom(Converter),
    Dict(DictCleaner),
    List(ListCleaner),
}

impl Cleaner {
    pub fn dict() -> DictCleaner {
        DictCleaner::default()
    }

    pub fn list() -> ListCleaner {
        ListCleaner::default()
    }

    pub fn atom(converter: Converter) -> Cleaner {
        Cleaner::Atom(converter)
    }

    pub fn apply(&self, value: Value) -> Result<Value, CleanError> {
        match self {
            Cleaner::Identity => Ok(value),
            Cleaner::Atom(converter) => converter.apply(value),
            Cleaner::Dict(dict) => dict.apply(value),
            Cleaner::List(list) => list.apply(value),
        }
    }
}

impl From<Converter> for Cleaner {
    fn from(converter: Converter) -> Self {
        Cleaner::Atom(converter)
    }
}

impl From<DictCleaner> for Cleaner {
    fn from(dict: DictCleaner) -> Self {
        Cleaner::Dict(dict)
    }
}

impl From<ListCleaner> for Cleaner {
    fn from(list: ListCleaner) -> Self {
        Cleaner::List(list)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DictCleaner {
    keys: Option<KeyRule>,
    values: Option<ValueRule<Key>>,
    raises: bool,
}

impl DictCleaner {
    /// Convert every key.
    pub fn keys(mut self, converter: Converter) -> Self {
        self.keys = Some(KeyRule::All(converter));
        self
    }

    /// Convert one specific key; replaces an earlier `keys` rule.
    pub fn key(mut self, key: impl Into<Key>, converter: Converter) -> Self {
        let entry = (key.into(), converter);
        match &mut self.keys {
            Some(KeyRule::Only(rules)) => rules.push(entry),
            _ => self.keys = Some(KeyRule::Only(vec![entry])),
        }
        self
    }

    /// Clean every value.
    pub fn values(mut self, cleaner: impl Into<Cleaner>) -> Self {
        self.values = Some(ValueRule::All(Box::new(cleaner.into())));
        self
    }

    /// Clean one specific value; replaces an earlier `values` rule.
    pub fn field(mut self, key: impl Into<Key>, cleaner: impl Into<Cleaner>) -> Self {
        let entry = (key.into(), cleaner.into());
        match &mut self.values {
            Some(ValueRule::Only(rules)) => rules.push(entry),
            _ => self.values = Some(ValueRule::Only(vec![entry])),
        }
        self
    }

    /// Fail when a targeted field is missing instead of skipping it.
    pub fn raises(mut self, raises: bool) -> Self {
        self.raises = raises;
        self
    }

    fn apply(&self, value: Value) -> Result<Value, CleanError> {
        let mut map = into_map(value)?;

        if let Some(rule) = &self.keys {
            let mut rekeyed = Map::with_capacity(map.len());
            for (key, value) in map {
                let key = match rule {
                    KeyRule::All(converter) => converter.apply_key(key)?,
                    KeyRule::Only(rules) => match rules.iter().find(|(k, _)| *k == key) {
                        Some((_, converter)) => converter.apply_key(key)?,
                        None => key,
                    },
                };
                rekeyed.insert(key, value);
            }
            map = rekeyed;
        }

        match &self.values {
            None => {}
            Some(ValueRule::All(cleaner)) => {
                for value in map.values_mut() {
                    *value = cleaner.apply(std::mem::replace(value, Value::Null))?;
                }
            }
            Some(ValueRule::Only(rules)) => {
                for (key, cleaner) in rules {
                    match map.get_mut(key) {
                        Some(value) => {
                            *value = cleaner.apply(std::mem::replace(value, Value::Null))?;
                        }
                        None if self.raises => return Err(CleanError::MissingKey(key.clone())),
                        None => {}
                    }
                }
            }
        }

        Ok(Value::Map(map))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListCleaner {
    values: Option<ValueRule<usize>>,
    raises: bool,
}

impl ListCleaner {
    /// Clean every element.
    pub fn values(mut self, cleaner: impl Into<Cleaner>) -> Self {
        self.values = Some(ValueRule::All(Box::new(cleaner.into())));
        self
    }

    /// Clean the element at `index`; replaces an earlier `values` rule.
    pub fn index(mut self, index: usize, cleaner: impl Into<Cleaner>) -> Self {
        let entry = (index, cleaner.into());
        match &mut self.values {
            Some(ValueRule::Only(rules)) => rules.push(entry),
            _ => self.values = Some(ValueRule::Only(vec![entry])),
        }
        self
    }

    /// Fail on out-of-range indices instead of skipping them.
    pub fn raises(mut self, raises: bool) -> Self {
        self.raises = raises;
        self
    }

    fn apply(&self, value: Value) -> Result<Value, CleanError> {
        let mut items = match value {
            Value::List(items) => items,
            other => {
                return Err(CleanError::Shape {
                    expected: "list",
                    found: other.kind(),
                })
            }
        };

        match &self.values {
            None => {}
            Some(ValueRule::All(cleaner)) => {
                for item in items.iter_mut() {
                    *item = cleaner.apply(std::mem::replace(item, Value::Null))?;
                }
            }
            Some(ValueRule::Only(rules)) => {
                let len = items.len();
                for (index, cleaner) in rules {
                    match items.get_mut(*index) {
                        Some(item) => {
                            *item = cleaner.apply(std::mem::replace(item, Value::Null))?;
                        }
                        None if self.raises => {
                            return Err(CleanError::MissingIndex { index: *index, len })
                        }
                        None => {}
                    }
                }
            }
        }

        Ok(Value::List(items))
    }
}

/// The vendor encodes an empty PHP array as `[]`, so an empty list counts as
/// an empty map.
pub(crate) fn into_map(value: Value) -> Result<Map, CleanError> {
    match value {
        Value::Map(map) => Ok(map),
        Value::List(items) if items.is_empty() => Ok(Map::new()),
        other => Err(CleanError::Shape {
            expected: "map",
            found: other.kind(),
        }),
    }
}

/// Declarative field lists for flat and group records.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldRules {
    pub rename: &'static [(&'static str, &'static str)],
    pub bool_fields: &'static [&'static str],
    pub int_fields: &'static [&'static str],
    pub decimal_fields: &'static [&'static str],
    pub float_fields: &'static [&'static str],
    pub timestamp_fields: &'static [&'static str],
    pub date_fields: &'static [&'static str],
    pub php_serialized_fields: &'static [&'static str],
}

impl FieldRules {
    pub const EMPTY: FieldRules = FieldRules {
        rename: &[],
        bool_fields: &[],
        int_fields: &[],
        decimal_fields: &[],
        float_fields: &[],
        timestamp_fields: &[],
        date_fields: &[],
        php_serialized_fields: &[],
    };

    fn targets(&self) -> [(Converter, &'static [&'static str]); 7] {
        [
            (Converter::Bool, self.bool_fields),
            (Converter::Int, self.int_fields),
            (Converter::Decimal, self.decimal_fields),
            (Converter::Float, self.float_fields),
            (Converter::Timestamp, self.timestamp_fields),
            (Converter::Date, self.date_fields),
            (Converter::PhpSerialized, self.php_serialized_fields),
        ]
    }

    /// Rename and convert the fields of one record in place.
    pub fn clean_record(&self, record: &mut Map) -> Result<(), CleanError> {
        for (old, new) in self.rename {
            rename_key(record, &Key::from(*old), Key::from(*new));
        }
        for (converter, fields) in self.targets() {
            for field in fields {
                if let Some(value) = record.get_mut(&Key::from(*field)) {
                    if matches!(value, Value::Str(_)) {
                        *value = converter.apply(std::mem::replace(value, Value::Null))?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Move `old` to `new` unless `new` is already taken.
pub(crate) fn rename_key(map: &mut Map, old: &Key, new: Key) {
    if map.contains_key(&new) {
        return;
    }
    if let Some(value) = map.shift_remove(old) {
        map.insert(new, value);
    }
}

/// Convert string record ids at the top level of a group response to
/// integer keys. Keys that are not integers are left alone.
pub fn group_keys(map: Map) -> Map {
    let mut rekeyed = Map::with_capacity(map.len());
    for (key, value) in map {
        let key = match &key {
            Key::Str(s) => s.trim().parse::<i64>().map(Key::Int).unwrap_or(key),
            _ => key,
        };
        if !rekeyed.contains_key(&key) {
            rekeyed.insert(key, value);
        }
    }
    rekeyed
}
