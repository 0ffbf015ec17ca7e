//! Request argument model and wire encoding.
//!
//! # Design
//! The vendor is a PHP application, so nested arguments travel as PHP-style
//! bracketed form keys: `{"a": {"b": [10, 20]}}` becomes `a[b][0]=10` and
//! `a[b][1]=20`. File payloads are pulled out into a separate list (under
//! their flattened key) for multipart transport; everything else becomes a
//! plain `(key, value)` pair. The transport renders the multipart body;
//! this module only guarantees file metadata is safe to put in part headers.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use url::form_urlencoded;

use crate::error::ApiError;

/// Named call arguments, in insertion order.
pub type Args = IndexMap<String, Arg>;

/// Build `Args` from `key => value` pairs.
///
/// ```
/// use ubersmith_core::args;
/// let args = args! { "client_id" => 50, "email" => "bob@example.com" };
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    () => { $crate::Args::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut args = $crate::Args::new();
        $( args.insert(::std::string::String::from($key), $crate::Arg::from($value)); )+
        args
    }};
}

/// A file uploaded with a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FilePayload {
    pub fn new(filename: &str, content_type: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data: data.into(),
        }
    }
}

/// One argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Str(String),
    List(Vec<Arg>),
    Map(Args),
    File(FilePayload),
}

impl Arg {
    /// Convert decoded JSON. Objects become maps, arrays lists.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Arg::Null,
            serde_json::Value::Bool(b) => Arg::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Arg::Int(i),
                None => Arg::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Arg::Str(s),
            serde_json::Value::Array(items) => Arg::List(items.into_iter().map(Arg::from_json).collect()),
            serde_json::Value::Object(object) => {
                Arg::Map(object.into_iter().map(|(k, v)| (k, Arg::from_json(v))).collect())
            }
        }
    }

    /// True when the argument carries no usable value (`Null` or a blank string).
    pub fn is_blank(&self) -> bool {
        match self {
            Arg::Null => true,
            Arg::Str(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    fn scalar(&self) -> Option<String> {
        match self {
            Arg::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Arg::Int(i) => Some(i.to_string()),
            Arg::Float(f) => Some(f.to_string()),
            Arg::Decimal(d) => Some(d.to_string()),
            Arg::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Build `Args` from a JSON object.
pub fn args_from_json(json: serde_json::Value) -> Result<Args, ApiError> {
    match Arg::from_json(json) {
        Arg::Map(args) => Ok(args),
        _ => Err(ApiError::Encoding("arguments must be a JSON object".to_string())),
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Bool(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Arg::Int(i64::from(value))
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Arg::Int(i64::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<Decimal> for Arg {
    fn from(value: Decimal) -> Self {
        Arg::Decimal(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Str(value)
    }
}

impl From<FilePayload> for Arg {
    fn from(value: FilePayload) -> Self {
        Arg::File(value)
    }
}

impl From<Args> for Arg {
    fn from(value: Args) -> Self {
        Arg::Map(value)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(value: Vec<T>) -> Self {
        Arg::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

/// Arguments flattened for the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedRequest {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, FilePayload)>,
}

impl EncodedRequest {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// `application/x-www-form-urlencoded` rendering of `fields`.
    pub fn form_body(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.fields)
            .finish()
    }
}

/// Multipart part headers carry field names and file metadata verbatim:
/// no control characters or quotes.
fn check_header_safe(key: &str, what: &str, value: &str) -> Result<(), ApiError> {
    if value.chars().any(|c| c.is_control() || c == '"') {
        return Err(ApiError::Encoding(format!(
            "file field `{key}` has an invalid {what}: {value:?}"
        )));
    }
    Ok(())
}

/// Flatten `args` into wire fields and file fields.
pub fn encode(args: &Args) -> Result<EncodedRequest, ApiError> {
    let mut encoded = EncodedRequest::default();
    for (name, arg) in args {
        flatten(name.clone(), arg, &mut encoded)?;
    }
    if encoded.has_files() {
        for (key, _) in &encoded.fields {
            check_header_safe(key, "field name", key)?;
        }
    }
    Ok(encoded)
}

fn flatten(key: String, arg: &Arg, out: &mut EncodedRequest) -> Result<(), ApiError> {
    match arg {
        Arg::Null => Err(ApiError::Encoding(format!("field `{key}` has no value"))),
        Arg::Map(map) => {
            for (name, value) in map {
                flatten(format!("{key}[{name}]"), value, out)?;
            }
            Ok(())
        }
        Arg::List(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten(format!("{key}[{index}]"), value, out)?;
            }
            Ok(())
        }
        Arg::File(file) => {
            check_header_safe(&key, "field name", &key)?;
            check_header_safe(&key, "filename", &file.filename)?;
            check_header_safe(&key, "content type", &file.content_type)?;
            out.files.push((key, file.clone()));
            Ok(())
        }
        scalar => {
            // every remaining variant is a scalar
            let value = scalar.scalar().unwrap_or_default();
            out.fields.push((key, value));
            Ok(())
        }
    }
}
