//! HTTP transport types and the transport seam.
//!
//! # Design
//! Requests and responses are plain data. The core builds an `HttpRequest`,
//! hands it to a `Transport`, and classifies the `HttpResponse` it gets
//! back. The transport owns sockets, TLS and timeouts; the core never does
//! I/O itself, which keeps every protocol decision testable with a scripted
//! transport.
//!
//! Every vendor call is a POST to `<base_url>?method=<namespace.action>`, so
//! there is no HTTP method or path to model beyond the URL.

use std::borrow::Cow;

use crate::encode::EncodedRequest;

/// Error type transports report. Carried through `ApiError::Transport`
/// without being rewrapped.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// A vendor call described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Vendor method id, e.g. `client.get`.
    pub api_method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: EncodedRequest,
}

/// A raw response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A 200 response with `content_type` and `body`.
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(
            200,
            vec![("content-type".to_string(), content_type.to_string())],
            body,
        )
    }

    /// A 200 `application/json` response serialising `value`.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::ok("application/json", value.to_string())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup; the first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Lowercased media type of `content-type`, without parameters.
    pub fn media_type(&self) -> Option<String> {
        self.header("content-type")
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// The narrow interface to whatever actually performs HTTP.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync,
{
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}
