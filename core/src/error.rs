//! Error types for the Ubersmith client core.
//!
//! # Design
//! One public enum covers every failure a call can surface. Request and
//! validation errors are produced before any network I/O; response,
//! maintenance and token errors after the retry loop has run. Transport
//! failures carry the collaborator's own error untouched so callers can
//! downcast it.
//!
//! `Maintenance` and `UpdatingToken` are specialisations of a vendor response
//! error; `is_response_error` reports that relationship for callers that only
//! care about "the vendor said no".

use thiserror::Error;

use crate::clean::CleanError;
use crate::http::TransportError;

/// Errors returned by request handlers and call contracts.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested method is malformed or not in the registry.
    #[error("invalid request: {0}")]
    Request(String),

    /// The arguments do not satisfy the call's required-field contract.
    #[error("invalid request data: {0}")]
    Validation(String),

    /// The vendor processed the call and reported a failure.
    #[error("vendor error {}: {message}", display_code(.code))]
    Response { code: Option<i64>, message: String },

    /// Every attempt landed on the vendor's token refresh page.
    #[error("vendor is updating its token, retry later")]
    UpdatingToken,

    /// The vendor is in scheduled maintenance.
    #[error("vendor is undergoing maintenance ({code}): {message}")]
    Maintenance { code: i64, message: String },

    /// The transport could not complete the round-trip.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    /// The response was not in the format the call expected.
    #[error("unexpected response format: {0}")]
    Format(String),

    /// The arguments could not be encoded for the wire.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Response data could not be coerced into native types.
    #[error("cleaning failed: {0}")]
    Clean(#[from] CleanError),

    /// The handler configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A call omitted its handler and no default handler is installed.
    #[error("no request handler given and no default handler installed")]
    NoDefaultHandler,
}

impl ApiError {
    /// True for every error that originates from a vendor response.
    pub fn is_response_error(&self) -> bool {
        matches!(
            self,
            ApiError::Response { .. } | ApiError::Maintenance { .. } | ApiError::UpdatingToken
        )
    }

    /// Vendor error code, when the error carries one.
    pub fn error_code(&self) -> Option<i64> {
        match self {
            ApiError::Response { code, .. } => *code,
            ApiError::Maintenance { code, .. } => Some(*code),
            _ => None,
        }
    }
}

fn display_code(code: &Option<i64>) -> String {
    code.map_or_else(|| "-".to_string(), |c| c.to_string())
}
