//! `uber.*` contracts and helpers.

use crate::call::{AcceptedError, CallSpec, CleanRules, Fallback, Required, Shape};
use crate::clean::{Cleaner, Converter};
use crate::encode::Args;
use crate::error::ApiError;
use crate::handler::RequestHandler;
use crate::response::{Cleaned, DictResponse, VendorFile};
use crate::value::Value;

use super::{render, set, set_opt};

/// Vendor error code for rejected credentials.
pub const INVALID_LOGIN_CODE: i64 = 3;
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid login or password.";

fn login() -> Cleaner {
    Cleaner::dict()
        .field("password_expired", Converter::Int)
        .field("last_login", Converter::Timestamp)
        .field("password_changed", Converter::Timestamp)
        .into()
}

fn welcome_stats() -> Cleaner {
    Cleaner::dict()
        .field("client_activity_type", Converter::Int)
        .field("closed_count", Converter::Int)
        .field("inv_count", Converter::Int)
        .field("pack_count", Converter::Int)
        .field("ticket", Converter::Int)
        .field("type", Converter::Int)
        .field("client_activity", Converter::Timestamp)
        .field("next_inv", Converter::Date)
        .into()
}

pub const API_EXPORT: CallSpec = CallSpec::new("uber.api_export").required(&[Required::Field("table")]);

/// Rejected credentials and blank credentials both answer `false`.
pub const CHECK_LOGIN: CallSpec = CallSpec::new("uber.check_login")
    .required(&[Required::NonBlank("login"), Required::NonBlank("pass")])
    .shape(Shape::Flat(CleanRules::Cleaner(login)))
    .on_invalid(Fallback::Bool(false))
    .accept_error(AcceptedError {
        code: INVALID_LOGIN_CODE,
        message: INVALID_LOGIN_MESSAGE,
        value: Fallback::Bool(false),
    });

pub const CLIENT_WELCOME_STATS: CallSpec = CallSpec::new("uber.client_welcome_stats")
    .required(&[Required::Field("client_id")])
    .shape(Shape::Flat(CleanRules::Cleaner(welcome_stats)));

pub const METHOD_GET: CallSpec = CallSpec::new("uber.method_get");

pub const METHOD_LIST: CallSpec = CallSpec::new("uber.method_list").shape(Shape::Flat(CleanRules::None));

pub const DOCUMENTATION: CallSpec = CallSpec::new("uber.documentation").shape(Shape::File);

/// Export table data in CSV format.
pub fn api_export(
    table: &str,
    gzip: bool,
    order_by: Option<&str>,
    handler: Option<&RequestHandler>,
) -> Result<Value, ApiError> {
    let mut args = Args::new();
    set(&mut args, "table", table);
    set_opt(&mut args, "order_by", order_by);
    if gzip {
        set(&mut args, "gzip", 1);
    }
    render(&API_EXPORT, args, handler)?.into_value()
}

/// Check a username and password. `None` means the vendor rejected them.
pub fn check_login(
    username: &str,
    password: &str,
    handler: Option<&RequestHandler>,
) -> Result<Option<DictResponse>, ApiError> {
    let mut args = Args::new();
    set(&mut args, "login", username);
    set(&mut args, "pass", password);
    match render(&CHECK_LOGIN, args, handler)? {
        Cleaned::Bool(false) => Ok(None),
        other => other.into_dict().map(Some),
    }
}

pub fn client_welcome_stats(client_id: i64, handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    let mut args = Args::new();
    set(&mut args, "client_id", client_id);
    render(&CLIENT_WELCOME_STATS, args, handler)?.into_dict()
}

/// Details of one API method.
pub fn method_get(method_name: &str, handler: Option<&RequestHandler>) -> Result<Value, ApiError> {
    let mut args = Args::new();
    set(&mut args, "method_name", method_name);
    render(&METHOD_GET, args, handler)?.into_value()
}

/// Every method the vendor exposes, with its description.
pub fn method_list(handler: Option<&RequestHandler>) -> Result<DictResponse, ApiError> {
    render(&METHOD_LIST, Args::new(), handler)?.into_dict()
}

/// PDF describing every API method.
pub fn documentation(handler: Option<&RequestHandler>) -> Result<VendorFile, ApiError> {
    render(&DOCUMENTATION, Args::new(), handler)?.into_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlerConfig;
    use crate::http::HttpResponse;
    use crate::testing::ScriptedTransport;
    use chrono::NaiveDate;
    use serde_json::json;

    fn handler(responses: Vec<HttpResponse>) -> (RequestHandler, ScriptedTransport) {
        let transport = ScriptedTransport::with_responses(responses);
        let handler = RequestHandler::new(HandlerConfig::new("http://127.0.0.1/"), transport.clone()).unwrap();
        (handler, transport)
    }

    fn ok(data: serde_json::Value) -> HttpResponse {
        HttpResponse::json(&json!({"status": true, "error_code": null, "error_message": "", "data": data}))
    }

    #[test]
    fn rejected_login_is_none() {
        let (handler, _) = handler(vec![HttpResponse::json(&json!({
            "status": false,
            "error_code": 3,
            "error_message": "Invalid login or password.",
            "data": "",
        }))]);
        assert_eq!(check_login("bob", "wrong", Some(&handler)).unwrap(), None);
    }

    #[test]
    fn blank_login_is_none_without_dispatch() {
        let (handler, transport) = handler(vec![]);
        assert_eq!(check_login("", "secret", Some(&handler)).unwrap(), None);
        assert_eq!(check_login("bob", "  ", Some(&handler)).unwrap(), None);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn accepted_login_returns_cleaned_record() {
        let (handler, transport) = handler(vec![ok(json!({
            "id": "1",
            "password_expired": "0",
            "last_login": "1272400333",
        }))]);
        let login = check_login("bob", "secret", Some(&handler)).unwrap().unwrap();
        assert_eq!(login["password_expired"], Value::Int(0));
        assert!(login["last_login"].as_datetime().is_some());
        let request = &transport.requests()[0];
        assert_eq!(request.body.field("login"), Some("bob"));
        assert_eq!(request.body.field("pass"), Some("secret"));
    }

    #[test]
    fn other_login_errors_propagate() {
        let (handler, _) = handler(vec![HttpResponse::json(&json!({
            "status": false,
            "error_code": 5,
            "error_message": "Account locked.",
        }))]);
        let err = check_login("bob", "secret", Some(&handler)).unwrap_err();
        assert!(matches!(err, ApiError::Response { code: Some(5), .. }));
    }

    #[test]
    fn welcome_stats_parse_dates() {
        let (handler, _) = handler(vec![ok(json!({"next_inv": "Aug/31/2011", "inv_count": "3"}))]);
        let stats = client_welcome_stats(50, Some(&handler)).unwrap();
        assert_eq!(stats["next_inv"], Value::Date(NaiveDate::from_ymd_opt(2011, 8, 31).unwrap()));
        assert_eq!(stats["inv_count"], Value::Int(3));
    }

    #[test]
    fn api_export_sends_gzip_flag_only_when_set() {
        let (handler, transport) = handler(vec![ok(json!("a,b\n1,2\n")), ok(json!(""))]);
        let csv = api_export("client", true, None, Some(&handler)).unwrap();
        assert_eq!(csv, Value::from("a,b\n1,2\n"));
        api_export("client", false, Some("clientid"), Some(&handler)).unwrap();
        let requests = transport.requests();
        assert_eq!(requests[0].body.field("gzip"), Some("1"));
        assert_eq!(requests[0].body.field("order_by"), None);
        assert_eq!(requests[1].body.field("gzip"), None);
        assert_eq!(requests[1].body.field("order_by"), Some("clientid"));
    }

    #[test]
    fn method_list_supports_lookup() {
        let (handler, _) = handler(vec![ok(json!({"foo": "bar", "nested": {"baz": "qux"}}))]);
        let methods = method_list(Some(&handler)).unwrap();
        assert_eq!(methods["foo"], Value::from("bar"));
        assert_eq!(methods["nested"]["baz"], Value::from("qux"));
    }

    #[test]
    fn documentation_is_a_file() {
        let (handler, _) = handler(vec![HttpResponse::ok("application/pdf", "Some PDF data.")
            .with_header("content-disposition", "inline; filename=\"doc.pdf\";")]);
        let file = documentation(Some(&handler)).unwrap();
        assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(file.filename.as_deref(), Some("doc.pdf"));
        assert_eq!(file.data, b"Some PDF data.");
    }
}
