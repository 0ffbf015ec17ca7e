//! Typed call results.
//!
//! # Design
//! Calls return a `Cleaned` value whose variant follows the call's response
//! shape. The wrappers are built eagerly from already-cleaned data:
//! - `DictResponse` is an ordered mapping with the usual lookup and mutation
//!   operations.
//! - `IntResponse` is an integer that works on either side of every integer
//!   operator, so it drops into arithmetic without unwrapping.
//! - `VendorFile` is a downloaded file with its name, type and modification
//!   time taken from the response headers.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Index, Mul, Neg, Not, Rem, Shl, Shr, Sub};

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::clean::{into_map, CleanError};
use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::value::{Key, Map, Value};

static NULL: Value = Value::Null;

/// A mapping-shaped call result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictResponse {
    map: Map,
}

impl DictResponse {
    pub fn new(map: Map) -> Self {
        Self { map }
    }

    /// Wrap cleaned data. An empty list counts as an empty mapping.
    pub fn from_cleaned(value: Value) -> Result<Self, CleanError> {
        Ok(Self::new(into_map(value)?))
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.map.get(&key.into())
    }

    pub fn get_or<'a>(&'a self, key: impl Into<Key>, default: &'a Value) -> &'a Value {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        self.map.contains_key(&key.into())
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.map.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.map.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Key, Value> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_map(&self) -> &Map {
        &self.map
    }

    pub fn into_inner(self) -> Map {
        self.map
    }

    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        self.map.insert(key.into(), value.into())
    }

    /// Remove `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: impl Into<Key>) -> Option<Value> {
        self.map.shift_remove(&key.into())
    }

    pub fn pop_or(&mut self, key: impl Into<Key>, default: Value) -> Value {
        self.remove(key).unwrap_or(default)
    }

    /// The value at `key`, inserting `default` first when absent.
    pub fn entry_or_insert(&mut self, key: impl Into<Key>, default: impl Into<Value>) -> &mut Value {
        self.map.entry(key.into()).or_insert_with(|| default.into())
    }

    /// Remove and return the most recently inserted entry.
    pub fn pop_last(&mut self) -> Option<(Key, Value)> {
        self.map.pop()
    }

    pub fn update<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl Index<&str> for DictResponse {
    type Output = Value;

    /// Missing keys index as `Null`.
    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<i64> for DictResponse {
    type Output = Value;

    fn index(&self, key: i64) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl<'a> IntoIterator for &'a DictResponse {
    type Item = (&'a Key, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

impl IntoIterator for DictResponse {
    type Item = (Key, Value);
    type IntoIter = indexmap::map::IntoIter<Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}

impl From<DictResponse> for Value {
    fn from(response: DictResponse) -> Self {
        Value::Map(response.map)
    }
}

/// An integer-shaped call result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntResponse(i64);

impl IntResponse {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    pub fn abs(self) -> i64 {
        self.0.abs()
    }

    pub fn pow(self, exp: u32) -> i64 {
        self.0.pow(exp)
    }

    /// Division rounding towards negative infinity.
    ///
    /// # Panics
    /// When `rhs` is zero.
    pub fn div_floor(self, rhs: i64) -> i64 {
        let quotient = self.0 / rhs;
        if (self.0 % rhs != 0) && ((self.0 < 0) != (rhs < 0)) {
            quotient - 1
        } else {
            quotient
        }
    }

    /// Remainder with the sign of `rhs`, pairing with `div_floor`.
    ///
    /// # Panics
    /// When `rhs` is zero.
    pub fn modulo(self, rhs: i64) -> i64 {
        let remainder = self.0 % rhs;
        if remainder != 0 && ((remainder < 0) != (rhs < 0)) {
            remainder + rhs
        } else {
            remainder
        }
    }

    pub fn rem_euclid(self, rhs: i64) -> i64 {
        self.0.rem_euclid(rhs)
    }

    /// `(div_floor, modulo)`.
    pub fn divmod(self, rhs: i64) -> (i64, i64) {
        (self.div_floor(rhs), self.modulo(rhs))
    }

    /// Division as floating point.
    pub fn true_div(self, rhs: i64) -> f64 {
        self.0 as f64 / rhs as f64
    }

    /// Bits needed to represent the magnitude, without sign.
    pub fn bit_length(self) -> u32 {
        u64::BITS - self.0.unsigned_abs().leading_zeros()
    }
}

macro_rules! forward_binop {
    ($($trait:ident $method:ident),* $(,)?) => {$(
        impl $trait for IntResponse {
            type Output = i64;

            fn $method(self, rhs: IntResponse) -> i64 {
                $trait::$method(self.0, rhs.0)
            }
        }

        impl $trait<i64> for IntResponse {
            type Output = i64;

            fn $method(self, rhs: i64) -> i64 {
                $trait::$method(self.0, rhs)
            }
        }

        impl $trait<IntResponse> for i64 {
            type Output = i64;

            fn $method(self, rhs: IntResponse) -> i64 {
                $trait::$method(self, rhs.0)
            }
        }
    )*};
}

forward_binop! {
    Add add,
    Sub sub,
    Mul mul,
    Div div,
    Rem rem,
    BitAnd bitand,
    BitOr bitor,
    BitXor bitxor,
    Shl shl,
    Shr shr,
}

impl Neg for IntResponse {
    type Output = i64;

    fn neg(self) -> i64 {
        -self.0
    }
}

impl Not for IntResponse {
    type Output = i64;

    fn not(self) -> i64 {
        !self.0
    }
}

impl From<i64> for IntResponse {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<IntResponse> for i64 {
    fn from(response: IntResponse) -> Self {
        response.0
    }
}

impl From<IntResponse> for f64 {
    fn from(response: IntResponse) -> Self {
        response.0 as f64
    }
}

impl PartialEq<i64> for IntResponse {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialEq<IntResponse> for i64 {
    fn eq(&self, other: &IntResponse) -> bool {
        *self == other.0
    }
}

impl PartialOrd<i64> for IntResponse {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}

impl PartialOrd<IntResponse> for i64 {
    fn partial_cmp(&self, other: &IntResponse) -> Option<Ordering> {
        self.partial_cmp(&other.0)
    }
}

macro_rules! forward_fmt {
    ($($trait:ident),*) => {$(
        impl fmt::$trait for IntResponse {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::$trait::fmt(&self.0, f)
            }
        }
    )*};
}

forward_fmt!(Display, LowerHex, UpperHex, Octal, Binary);

static FILENAME: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]*)"|([^;]+))"#));
static UNSAFE_CHARS: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9\-_. ]"));

/// A file downloaded from the vendor.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorFile {
    /// Sanitised name from `content-disposition`, if the header names one.
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// `last-modified`, or the download time when absent or unparseable.
    pub modified: DateTime<Local>,
    pub data: Vec<u8>,
}

impl VendorFile {
    pub fn from_response(response: HttpResponse) -> Self {
        let filename = response
            .header("content-disposition")
            .and_then(filename_from_disposition);
        let content_type = response.header("content-type").map(str::to_string);
        let modified = match response.header("last-modified") {
            Some(raw) => match DateTime::parse_from_rfc2822(raw.trim()) {
                Ok(modified) => modified.with_timezone(&Local),
                Err(e) => {
                    warn!(value = raw, error = %e, "unparseable last-modified header");
                    Local::now()
                }
            },
            None => Local::now(),
        };
        Self {
            filename,
            content_type,
            modified,
            data: response.body,
        }
    }
}

/// Extract and sanitise the filename of a `content-disposition` value.
pub fn filename_from_disposition(disposition: &str) -> Option<String> {
    let pattern = FILENAME.as_ref().ok()?;
    let captures = pattern.captures(disposition)?;
    let raw = captures.get(1).or_else(|| captures.get(2))?.as_str().trim();
    let sanitised = match UNSAFE_CHARS.as_ref() {
        Ok(unsafe_chars) => unsafe_chars.replace_all(raw, "-").into_owned(),
        Err(_) => raw.to_string(),
    };
    let name = sanitised.trim_start_matches('.');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Result of a call, by response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Cleaned {
    /// A flat record.
    Record(DictResponse),
    /// Records keyed by integer id.
    Group(DictResponse),
    Int(IntResponse),
    Scalar(Value),
    Bool(bool),
    File(VendorFile),
    /// Loosely typed data from a call with no cleaning rules.
    Value(Value),
}

impl Cleaned {
    fn kind(&self) -> &'static str {
        match self {
            Cleaned::Record(_) => "record",
            Cleaned::Group(_) => "group",
            Cleaned::Int(_) => "int",
            Cleaned::Scalar(_) => "scalar",
            Cleaned::Bool(_) => "bool",
            Cleaned::File(_) => "file",
            Cleaned::Value(_) => "value",
        }
    }

    fn mismatch(&self, expected: &str) -> ApiError {
        ApiError::Format(format!("expected a {expected} result, got a {}", self.kind()))
    }

    /// A record or group result; loosely typed maps are accepted too.
    pub fn into_dict(self) -> Result<DictResponse, ApiError> {
        match self {
            Cleaned::Record(dict) | Cleaned::Group(dict) => Ok(dict),
            Cleaned::Value(value @ (Value::Map(_) | Value::List(_))) => {
                Ok(DictResponse::from_cleaned(value)?)
            }
            other => Err(other.mismatch("mapping")),
        }
    }

    pub fn into_int(self) -> Result<IntResponse, ApiError> {
        match self {
            Cleaned::Int(int) => Ok(int),
            Cleaned::Scalar(Value::Int(i)) | Cleaned::Value(Value::Int(i)) => Ok(IntResponse(i)),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn into_bool(self) -> Result<bool, ApiError> {
        match self {
            Cleaned::Bool(b) | Cleaned::Scalar(Value::Bool(b)) | Cleaned::Value(Value::Bool(b)) => Ok(b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn into_file(self) -> Result<VendorFile, ApiError> {
        match self {
            Cleaned::File(file) => Ok(file),
            other => Err(other.mismatch("file")),
        }
    }

    /// The result as a plain value tree. Files have no value form.
    pub fn into_value(self) -> Result<Value, ApiError> {
        match self {
            Cleaned::Record(dict) | Cleaned::Group(dict) => Ok(dict.into()),
            Cleaned::Int(int) => Ok(Value::Int(int.value())),
            Cleaned::Scalar(value) | Cleaned::Value(value) => Ok(value),
            Cleaned::Bool(b) => Ok(Value::Bool(b)),
            other @ Cleaned::File(_) => Err(other.mismatch("value")),
        }
    }
}
