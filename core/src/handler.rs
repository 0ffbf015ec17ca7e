//! Request dispatch: response classification and the token refresh retry loop.
//!
//! # Design
//! `RequestHandler` pairs a `HandlerConfig` with a `Transport`. Dispatch is
//! split the same way as everywhere else in the crate:
//! - `build_request` turns a method id and arguments into an `HttpRequest`
//!   without I/O;
//! - `classify` turns an `HttpResponse` into a `Classified` outcome without
//!   I/O;
//! - `process_request` runs the loop in between, sending through the
//!   transport and retrying while the vendor serves its token refresh page.
//!
//! The vendor signals state in-band rather than with HTTP status codes: a
//! `text/html` page containing "Updating Token" means "try again in a few
//! seconds", and a JSON envelope with `status` falsy carries an error code
//! and message. Maintenance mode is error code 1 with one exact message.
//!
//! A process-wide default handler can be installed for calls that omit one.
//! Installing or clearing it while calls are in flight is the caller's
//! business; in-flight calls keep the `Arc` they resolved.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::HandlerConfig;
use crate::encode::{encode, Args};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::registry::MethodId;

/// Body marker of the vendor's token refresh page.
pub const TOKEN_UPDATING_MARKER: &str = "Updating Token";

/// Error code the vendor reports during maintenance.
pub const MAINTENANCE_CODE: i64 = 1;

/// Error message the vendor reports during maintenance.
pub const MAINTENANCE_MESSAGE: &str =
    "We are currently undergoing maintenance, please check back shortly.";

const USER_AGENT: &str = concat!("ubersmith-rs/", env!("CARGO_PKG_VERSION"));

/// What the caller wants back from a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// The envelope's `data` member.
    Json,
    /// The raw response, for file downloads.
    Raw,
}

/// Outcome of one response, before any retry decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    JsonOk(serde_json::Value),
    JsonError { code: Option<i64>, message: String },
    TokenUpdating,
    Maintenance { code: i64, message: String },
    /// Anything that is not `application/json` and not the token page.
    NonJson,
}

/// Successful result of `process_request`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Raw(HttpResponse),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: serde_json::Value,
    #[serde(default)]
    error_code: serde_json::Value,
    #[serde(default)]
    error_message: serde_json::Value,
    #[serde(default)]
    data: serde_json::Value,
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
    }
}

fn error_code(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn error_message(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Classify one vendor response. Only an unparseable JSON body is an error.
pub fn classify(response: &HttpResponse) -> Result<Classified, ApiError> {
    let media_type = response.media_type();
    if media_type.as_deref() != Some("application/json") {
        if media_type.as_deref() == Some("text/html")
            && response.body_text().contains(TOKEN_UPDATING_MARKER)
        {
            return Ok(Classified::TokenUpdating);
        }
        return Ok(Classified::NonJson);
    }

    let envelope: Envelope = serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::Format(format!("invalid JSON envelope: {e}")))?;

    if truthy(&envelope.status) {
        return Ok(Classified::JsonOk(envelope.data));
    }

    let code = error_code(&envelope.error_code);
    let message = error_message(&envelope.error_message);
    if code == Some(MAINTENANCE_CODE) && message == MAINTENANCE_MESSAGE {
        return Ok(Classified::Maintenance {
            code: MAINTENANCE_CODE,
            message,
        });
    }
    Ok(Classified::JsonError { code, message })
}

/// Dispatches vendor calls through a transport.
pub struct RequestHandler {
    config: HandlerConfig,
    transport: Box<dyn Transport>,
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RequestHandler {
    /// Validates `config` and takes ownership of `transport`.
    pub fn new(config: HandlerConfig, transport: impl Transport + 'static) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self {
            config,
            transport: Box::new(transport),
        })
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn build_request(&self, method: MethodId, args: &Args) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![("user-agent".to_string(), USER_AGENT.to_string())];
        if let Some(auth) = self.config.basic_auth() {
            headers.push(("authorization".to_string(), auth));
        }
        Ok(HttpRequest {
            api_method: method.to_string(),
            url: self.config.method_url(method.as_str())?,
            headers,
            body: encode(args)?,
        })
    }

    /// Send `method` with `args`, retrying while the vendor refreshes its
    /// token. Unknown methods fail before anything is sent.
    pub fn process_request(&self, method: &str, args: &Args, mode: ResponseMode) -> Result<Payload, ApiError> {
        let method = MethodId::parse(method)?;
        let request = self.build_request(method, args)?;
        let retry = &self.config.retry;
        let attempts = retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            debug!(
                method = %method,
                attempt,
                fields = request.body.fields.len(),
                files = request.body.files.len(),
                "dispatching vendor call"
            );
            let response = self.transport.send(&request).map_err(ApiError::Transport)?;
            debug!(method = %method, status = response.status, "vendor responded");

            match classify(&response)? {
                Classified::TokenUpdating => {
                    warn!(method = %method, attempt, attempts, "vendor is updating its token");
                    if attempt < attempts && !retry.delay.is_zero() {
                        thread::sleep(retry.delay);
                    }
                }
                Classified::Maintenance { code, message } => {
                    warn!(method = %method, "vendor is in maintenance");
                    return Err(ApiError::Maintenance { code, message });
                }
                Classified::JsonError { code, message } => {
                    return Err(ApiError::Response { code, message });
                }
                Classified::JsonOk(data) => {
                    return Ok(match mode {
                        ResponseMode::Json => Payload::Json(data),
                        ResponseMode::Raw => Payload::Raw(response),
                    });
                }
                Classified::NonJson => {
                    return match mode {
                        ResponseMode::Raw => Ok(Payload::Raw(response)),
                        ResponseMode::Json => Err(ApiError::Format(format!(
                            "expected application/json, got {}",
                            response.media_type().as_deref().unwrap_or("no content type")
                        ))),
                    };
                }
            }
        }

        Err(ApiError::UpdatingToken)
    }

    /// `process_request` in JSON mode, returning the envelope's `data`.
    pub fn process_json(&self, method: &str, args: &Args) -> Result<serde_json::Value, ApiError> {
        match self.process_request(method, args, ResponseMode::Json)? {
            Payload::Json(data) => Ok(data),
            Payload::Raw(_) => Err(ApiError::Format("expected a JSON payload".to_string())),
        }
    }

    /// `process_request` in raw mode, returning the whole response.
    pub fn process_raw(&self, method: &str, args: &Args) -> Result<HttpResponse, ApiError> {
        match self.process_request(method, args, ResponseMode::Raw)? {
            Payload::Raw(response) => Ok(response),
            Payload::Json(_) => Err(ApiError::Format("expected a raw payload".to_string())),
        }
    }
}

static DEFAULT_HANDLER: RwLock<Option<Arc<RequestHandler>>> = RwLock::new(None);

/// Install `handler` as the process-wide default, returning the previous one.
pub fn set_default_handler(handler: RequestHandler) -> Option<Arc<RequestHandler>> {
    let mut slot = DEFAULT_HANDLER.write().unwrap_or_else(PoisonError::into_inner);
    slot.replace(Arc::new(handler))
}

pub fn default_handler() -> Option<Arc<RequestHandler>> {
    DEFAULT_HANDLER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn clear_default_handler() -> Option<Arc<RequestHandler>> {
    DEFAULT_HANDLER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

/// A handler given explicitly or taken from the default slot.
#[derive(Debug)]
pub enum Resolved<'a> {
    Given(&'a RequestHandler),
    Default(Arc<RequestHandler>),
}

impl Deref for Resolved<'_> {
    type Target = RequestHandler;

    fn deref(&self) -> &RequestHandler {
        match self {
            Resolved::Given(handler) => handler,
            Resolved::Default(handler) => handler,
        }
    }
}

/// `handler`, or the default handler when `None`.
pub fn resolve(handler: Option<&RequestHandler>) -> Result<Resolved<'_>, ApiError> {
    match handler {
        Some(handler) => Ok(Resolved::Given(handler)),
        None => default_handler()
            .map(Resolved::Default)
            .ok_or(ApiError::NoDefaultHandler),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::config::RetryPolicy;
    use crate::testing::ScriptedTransport;
    use serde_json::json;

    const TOKEN_PAGE: &str = "<html><head><title>Updating Token...</title>\
        <meta http-equiv=\"Refresh\" content=\"4\"></head>\
        <body>Please wait while your token is updated.</body></html>";

    fn ok(data: serde_json::Value) -> HttpResponse {
        HttpResponse::json(&json!({
            "status": true,
            "error_code": null,
            "error_message": "",
            "data": data,
        }))
    }

    fn error(code: i64, message: &str) -> HttpResponse {
        HttpResponse::json(&json!({
            "status": false,
            "error_code": code,
            "error_message": message,
            "data": "",
        }))
    }

    fn token_page() -> HttpResponse {
        HttpResponse::ok("text/html", TOKEN_PAGE)
    }

    fn handler(transport: &ScriptedTransport) -> RequestHandler {
        let config = HandlerConfig::new("http://127.0.0.1/api/2.0/")
            .with_credentials("admin", "test_pass")
            .with_retry(RetryPolicy::immediate(3));
        RequestHandler::new(config, transport.clone()).unwrap()
    }

    #[test]
    fn returns_data_of_successful_envelope() {
        let transport = ScriptedTransport::with_responses([ok(json!("Testing FTW!"))]);
        let data = handler(&transport).process_json("uber.method_list", &args! {}).unwrap();
        assert_eq!(data, json!("Testing FTW!"));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn builds_post_url_and_auth_headers() {
        let transport = ScriptedTransport::with_responses([ok(json!({}))]);
        handler(&transport)
            .process_json("client.get", &args! { "client_id" => 50 })
            .unwrap();
        let request = &transport.requests()[0];
        assert_eq!(request.api_method, "client.get");
        assert_eq!(request.url, "http://127.0.0.1/api/2.0/?method=client.get");
        assert_eq!(request.body.field("client_id"), Some("50"));
        assert!(request
            .headers
            .contains(&("authorization".to_string(), "Basic YWRtaW46dGVzdF9wYXNz".to_string())));
    }

    #[test]
    fn html_without_token_marker_is_a_format_error_in_json_mode() {
        let transport = ScriptedTransport::with_responses([HttpResponse::ok("text/html", "Testing FTW!")]);
        let err = handler(&transport).process_json("uber.method_list", &args! {}).unwrap_err();
        assert!(matches!(err, ApiError::Format(_)));
    }

    #[test]
    fn retries_through_token_refresh() {
        let transport = ScriptedTransport::with_responses([token_page(), token_page(), ok(json!("done"))]);
        let data = handler(&transport).process_json("uber.method_list", &args! {}).unwrap();
        assert_eq!(data, json!("done"));
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let transport =
            ScriptedTransport::with_responses([token_page(), token_page(), token_page(), ok(json!("late"))]);
        let err = handler(&transport).process_json("uber.method_list", &args! {}).unwrap_err();
        assert!(matches!(err, ApiError::UpdatingToken));
        assert!(err.is_response_error());
        assert_eq!(transport.calls(), 3);
        assert_eq!(transport.remaining(), 1);
    }

    #[test]
    fn maintenance_is_not_retried() {
        let transport = ScriptedTransport::with_responses([error(MAINTENANCE_CODE, MAINTENANCE_MESSAGE)]);
        let err = handler(&transport).process_json("client.list", &args! {}).unwrap_err();
        assert!(matches!(err, ApiError::Maintenance { code: 1, .. }));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn code_one_with_other_message_is_a_plain_error() {
        let transport = ScriptedTransport::with_responses([error(1, "Something else")]);
        let err = handler(&transport).process_json("client.list", &args! {}).unwrap_err();
        assert!(matches!(err, ApiError::Response { code: Some(1), .. }));
    }

    #[test]
    fn vendor_errors_carry_code_and_message() {
        let transport = ScriptedTransport::with_responses([error(3, "Invalid login or password.")]);
        let err = handler(&transport).process_json("uber.check_login", &args! {}).unwrap_err();
        assert_eq!(err.error_code(), Some(3));
        assert_eq!(err.to_string(), "vendor error 3: Invalid login or password.");
    }

    #[test]
    fn unknown_method_sends_nothing() {
        let transport = ScriptedTransport::new();
        let err = handler(&transport).process_json("bogus.method", &args! {}).unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn transport_failures_propagate_immediately() {
        let transport = ScriptedTransport::new();
        transport.push_failure("connection refused").push(ok(json!(1)));
        let err = handler(&transport).process_json("client.count", &args! {}).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn raw_mode_returns_files_and_propagates_errors() {
        let pdf = HttpResponse::ok("application/pdf", "Some PDF data.")
            .with_header("content-disposition", "inline; filename=\"doc.pdf\";");
        let transport = ScriptedTransport::with_responses([pdf.clone(), error(2, "nope")]);
        let handler = handler(&transport);
        assert_eq!(handler.process_raw("uber.documentation", &args! {}).unwrap(), pdf);
        let err = handler.process_raw("uber.documentation", &args! {}).unwrap_err();
        assert!(matches!(err, ApiError::Response { code: Some(2), .. }));
    }

    #[test]
    fn classify_accepts_string_status_and_codes() {
        let response = HttpResponse::json(&json!({"status": "1", "data": [1, 2]}));
        assert_eq!(classify(&response).unwrap(), Classified::JsonOk(json!([1, 2])));

        let response = HttpResponse::json(&json!({"status": 0, "error_code": "7", "error_message": "x"}));
        assert_eq!(
            classify(&response).unwrap(),
            Classified::JsonError {
                code: Some(7),
                message: "x".to_string()
            }
        );
    }

    #[test]
    fn classify_rejects_garbled_json() {
        let response = HttpResponse::ok("application/json; charset=utf-8", "{not json");
        assert!(matches!(classify(&response), Err(ApiError::Format(_))));
    }

    #[test]
    fn classify_token_page_ignores_charset() {
        let response = HttpResponse::ok("text/html; charset=UTF-8", TOKEN_PAGE);
        assert_eq!(classify(&response).unwrap(), Classified::TokenUpdating);
    }

    #[test]
    fn resolve_prefers_explicit_handler() {
        let transport = ScriptedTransport::new();
        let explicit = handler(&transport);
        let resolved = resolve(Some(&explicit)).unwrap();
        assert!(matches!(resolved, Resolved::Given(_)));
        assert_eq!(resolved.config().base_url, "http://127.0.0.1/api/2.0/");
    }
}
