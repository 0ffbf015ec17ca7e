//! Call contracts: validation, dispatch and cleaning for one vendor method.
//!
//! # Design
//! A `CallSpec` is static data describing one method: which arguments are
//! required, what shape the response has and how to clean it, and the two
//! escape hatches some methods need (a fallback result when validation
//! fails, and a vendor error that is really an answer). `Call` binds a spec
//! to arguments and runs the lifecycle:
//!
//! validate -> dispatch (JSON or raw) -> clean -> `Cleaned`
//!
//! Validation runs before a handler is even resolved, so a call that falls
//! back never needs one.

use tracing::debug;

use crate::clean::{group_keys, into_map, Cleaner, Converter, FieldRules};
use crate::encode::{Arg, Args};
use crate::error::ApiError;
use crate::handler::{resolve, RequestHandler};
use crate::response::{Cleaned, DictResponse, IntResponse, VendorFile};
use crate::value::Value;

/// One required-argument rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Required {
    /// The argument must be present.
    Field(&'static str),
    /// At least one of the arguments must be present.
    AnyOf(&'static [&'static str]),
    /// The argument must be present and not blank.
    NonBlank(&'static str),
}

impl Required {
    fn check(&self, args: &Args) -> Result<(), String> {
        match self {
            Required::Field(name) => {
                if args.contains_key(*name) {
                    Ok(())
                } else {
                    Err(format!("missing required field `{name}`"))
                }
            }
            Required::AnyOf(names) => {
                if names.iter().any(|name| args.contains_key(*name)) {
                    Ok(())
                } else {
                    Err(format!("one of `{}` is required", names.join("`, `")))
                }
            }
            Required::NonBlank(name) => match args.get(*name) {
                Some(arg) if !arg.is_blank() => Ok(()),
                _ => Err(format!("`{name}` must not be blank")),
            },
        }
    }
}

/// How a flat record or group member is cleaned.
#[derive(Debug, Clone, Copy)]
pub enum CleanRules {
    None,
    /// Rename table plus per-type field lists.
    Fields(FieldRules),
    /// A composite cleaner, built on demand.
    Cleaner(fn() -> Cleaner),
}

/// Response shape of a call.
#[derive(Debug, Clone, Copy)]
pub enum Shape {
    /// JSON data returned untouched as a `Value`.
    Passthrough,
    /// One record.
    Flat(CleanRules),
    /// Records keyed by stringified integer ids.
    Group(CleanRules),
    /// A single value coerced with the converter.
    Scalar(Converter),
    /// A binary download.
    File,
}

/// A result returned in place of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Bool(bool),
    Null,
}

impl From<Fallback> for Cleaned {
    fn from(fallback: Fallback) -> Self {
        match fallback {
            Fallback::Bool(b) => Cleaned::Bool(b),
            Fallback::Null => Cleaned::Value(Value::Null),
        }
    }
}

/// A vendor error that is turned into `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptedError {
    pub code: i64,
    pub message: &'static str,
    pub value: Fallback,
}

/// Static description of one vendor method.
#[derive(Debug, Clone, Copy)]
pub struct CallSpec {
    pub method: &'static str,
    pub required: &'static [Required],
    pub shape: Shape,
    /// Result to return when validation fails.
    pub on_invalid: Option<Fallback>,
    pub accept_error: Option<AcceptedError>,
    /// Switch to the file shape when the named argument has this value.
    pub file_when: Option<(&'static str, &'static str)>,
}

impl CallSpec {
    /// A pass-through contract: no required arguments, no cleaning.
    pub const fn new(method: &'static str) -> Self {
        Self {
            method,
            required: &[],
            shape: Shape::Passthrough,
            on_invalid: None,
            accept_error: None,
            file_when: None,
        }
    }

    pub const fn required(self, required: &'static [Required]) -> Self {
        Self { required, ..self }
    }

    pub const fn shape(self, shape: Shape) -> Self {
        Self { shape, ..self }
    }

    pub const fn on_invalid(self, fallback: Fallback) -> Self {
        Self {
            on_invalid: Some(fallback),
            ..self
        }
    }

    pub const fn accept_error(self, accepted: AcceptedError) -> Self {
        Self {
            accept_error: Some(accepted),
            ..self
        }
    }

    pub const fn file_when(self, arg: &'static str, value: &'static str) -> Self {
        Self {
            file_when: Some((arg, value)),
            ..self
        }
    }

    /// Check every required-argument rule, reporting the first unmet one.
    pub fn validate(&self, args: &Args) -> Result<(), ApiError> {
        for rule in self.required {
            rule.check(args)
                .map_err(|reason| ApiError::Validation(format!("{}: {reason}", self.method)))?;
        }
        Ok(())
    }

    /// Shape for these particular arguments.
    pub fn shape_for(&self, args: &Args) -> Shape {
        match self.file_when {
            Some((name, expected)) if matches!(args.get(name), Some(Arg::Str(v)) if v == expected) => {
                Shape::File
            }
            _ => self.shape,
        }
    }
}

/// One invocation of a call contract.
#[derive(Debug, Clone)]
pub struct Call<'s> {
    spec: &'s CallSpec,
    args: Args,
}

impl<'s> Call<'s> {
    pub fn new(spec: &'s CallSpec, args: Args) -> Self {
        Self { spec, args }
    }

    pub fn spec(&self) -> &CallSpec {
        self.spec
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Validate, dispatch and clean. `handler` falls back to the default.
    pub fn render(&self, handler: Option<&RequestHandler>) -> Result<Cleaned, ApiError> {
        if let Err(err) = self.spec.validate(&self.args) {
            return match self.spec.on_invalid {
                Some(fallback) => {
                    debug!(method = self.spec.method, error = %err, "returning fallback for invalid call");
                    Ok(fallback.into())
                }
                None => Err(err),
            };
        }

        let handler = resolve(handler)?;
        let result = match self.spec.shape_for(&self.args) {
            Shape::File => handler
                .process_raw(self.spec.method, &self.args)
                .and_then(clean_file),
            shape => handler
                .process_json(self.spec.method, &self.args)
                .and_then(|data| clean_payload(shape, data)),
        };

        match (result, self.spec.accept_error) {
            (Err(ApiError::Response { code: Some(code), message }), Some(accepted))
                if code == accepted.code && message == accepted.message =>
            {
                debug!(method = self.spec.method, code, "vendor error accepted as a result");
                Ok(accepted.value.into())
            }
            (result, _) => result,
        }
    }
}

fn clean_file(response: crate::http::HttpResponse) -> Result<Cleaned, ApiError> {
    if response.media_type().as_deref() == Some("application/json") {
        return Err(ApiError::Format(
            "expected a file download, got a JSON envelope".to_string(),
        ));
    }
    Ok(Cleaned::File(VendorFile::from_response(response)))
}

fn clean_member(rules: CleanRules, value: Value) -> Result<Value, ApiError> {
    match rules {
        CleanRules::None => Ok(value),
        CleanRules::Fields(fields) => {
            let mut map = into_map(value)?;
            fields.clean_record(&mut map)?;
            Ok(Value::Map(map))
        }
        CleanRules::Cleaner(build) => Ok(build().apply(value)?),
    }
}

/// Clean the `data` of a successful JSON response according to `shape`.
pub fn clean_payload(shape: Shape, data: serde_json::Value) -> Result<Cleaned, ApiError> {
    let value = Value::from_json(data);
    match shape {
        Shape::Passthrough => Ok(Cleaned::Value(value)),
        Shape::Flat(rules) => {
            let cleaned = clean_member(rules, value)?;
            Ok(Cleaned::Record(DictResponse::from_cleaned(cleaned)?))
        }
        Shape::Group(rules) => {
            let mut group = group_keys(into_map(value)?);
            for member in group.values_mut() {
                if matches!(member, Value::Map(_)) {
                    *member = clean_member(rules, std::mem::replace(member, Value::Null))?;
                }
            }
            Ok(Cleaned::Group(DictResponse::new(group)))
        }
        Shape::Scalar(converter) => Ok(match converter.apply(value)? {
            Value::Int(i) => Cleaned::Int(IntResponse::new(i)),
            Value::Bool(b) => Cleaned::Bool(b),
            other => Cleaned::Scalar(other),
        }),
        Shape::File => Err(ApiError::Format(
            "file responses cannot be cleaned from JSON".to_string(),
        )),
    }
}
