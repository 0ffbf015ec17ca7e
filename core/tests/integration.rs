//! End-to-end calls against the live mock vendor.
//!
//! # Design
//! Starts the mock server on a random port, then drives the core through
//! `UreqTransport` over real HTTP: client lifecycle, login checks, file
//! downloads and uploads, the token refresh retry loop and maintenance
//! detection. The control routes of the mock server script the failure
//! modes.

#![cfg(feature = "ureq")]

use std::time::Duration;

use chrono::Datelike;
use rust_decimal::Decimal;
use ubersmith_core::calls::{self, client, uber};
use ubersmith_core::{
    args, ApiError, FilePayload, HandlerConfig, Key, RequestHandler, RetryPolicy, UreqTransport,
    Value,
};

/// Start the mock server on a random port and return its origin.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn handler(origin: &str) -> RequestHandler {
    let config = HandlerConfig::new(&format!("{origin}{}", mock_server::API_PATH))
        .with_credentials("admin", "secret")
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy::immediate(3));
    let transport = UreqTransport::new(config.timeout);
    RequestHandler::new(config, transport).unwrap()
}

fn queue_token_pages(origin: &str, pages: u32) {
    ureq::post(&format!("{origin}/control/token-refresh?pages={pages}"))
        .send_empty()
        .unwrap();
}

fn set_maintenance(origin: &str, enabled: bool) {
    ureq::put(&format!("{origin}/control/maintenance"))
        .content_type("application/json")
        .send(format!(r#"{{"enabled":{enabled}}}"#).as_bytes())
        .unwrap();
}

fn hits(origin: &str) -> u64 {
    let body = ureq::get(&format!("{origin}/control/hits"))
        .call()
        .unwrap()
        .body_mut()
        .read_to_string()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    json["hits"].as_u64().unwrap()
}

#[test]
fn client_lifecycle() {
    let origin = start_server();
    let h = handler(&origin);

    // Step 1: list is empty.
    let clients = client::list(args! {}, Some(&h)).unwrap();
    assert!(clients.is_empty(), "expected no clients");

    // Step 2: add two clients through the pass-through contract.
    let added = calls::call(
        Some(&h),
        "client.add",
        args! { "first" => "Alice", "last" => "Smith", "login" => "alice", "pass" => "pw1", "email" => "alice@example.com" },
    )
    .unwrap()
    .into_value()
    .unwrap();
    assert_eq!(added, Value::from("1001"));
    calls::call(Some(&h), "client.add", args! { "login" => "bob", "pass" => "pw2" }).unwrap();

    // Step 3: fetch by login and by email; string fields come back typed.
    let alice = client::get(None, Some("alice"), None, Some(&h)).unwrap();
    assert_eq!(alice["clientid"], Value::Int(1001));
    assert_eq!(alice["active"], Value::Bool(true));
    assert_eq!(alice["balance"], Value::Decimal(Decimal::ZERO));
    assert!(alice["created"].as_datetime().is_some());
    assert_eq!(alice["first"], Value::from("Alice"));

    let by_email = client::get(None, None, Some("alice@example.com"), Some(&h)).unwrap();
    assert_eq!(by_email["clientid"], Value::Int(1001));

    // Step 4: the list is keyed by integer id.
    let clients = client::list(args! {}, Some(&h)).unwrap();
    let keys: Vec<&Key> = clients.keys().collect();
    assert_eq!(keys, vec![&Key::Int(1001), &Key::Int(1002)]);
    assert_eq!(clients[1002]["login"], Value::from("bob"));

    // Step 5: count.
    let count = calls::call(Some(&h), "client.count", args! {}).unwrap().into_value().unwrap();
    assert_eq!(count, Value::from("2"));

    // Step 6: an unknown client is a vendor error carrying its code.
    let err = client::get(Some(9999), None, None, Some(&h)).unwrap_err();
    assert!(matches!(err, ApiError::Response { code: Some(1), .. }), "{err:?}");
}

#[test]
fn login_checks() {
    let origin = start_server();
    let h = handler(&origin);
    calls::call(Some(&h), "client.add", args! { "login" => "carol", "pass" => "hunter2" }).unwrap();

    let login = uber::check_login("carol", "hunter2", Some(&h)).unwrap().unwrap();
    assert_eq!(login["password_expired"], Value::Int(0));
    assert!(login["last_login"].as_datetime().is_some());

    assert_eq!(uber::check_login("carol", "wrong", Some(&h)).unwrap(), None);

    // Blank credentials never reach the server.
    let before = hits(&origin);
    assert_eq!(uber::check_login("", "hunter2", Some(&h)).unwrap(), None);
    assert_eq!(hits(&origin), before);
}

#[test]
fn method_list_and_documentation() {
    let origin = start_server();
    let h = handler(&origin);

    let methods = uber::method_list(Some(&h)).unwrap();
    assert_eq!(
        methods["uber.method_list"],
        Value::from("Get a list of all available API methods")
    );
    assert!(methods.contains_key("client.get"));

    let doc = uber::documentation(Some(&h)).unwrap();
    assert_eq!(doc.filename.as_deref(), Some("ubersmith_api_documentation.pdf"));
    assert_eq!(doc.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(doc.data, mock_server::DOCUMENTATION_PDF);
    assert_eq!(doc.modified.year(), 2021);
}

#[test]
fn token_refresh_pages_are_retried() {
    let origin = start_server();
    let h = handler(&origin);

    // Two refresh pages, then the real answer on the third attempt.
    queue_token_pages(&origin, 2);
    let count = calls::call(Some(&h), "client.count", args! {}).unwrap().into_value().unwrap();
    assert_eq!(count, Value::from("0"));
    assert_eq!(hits(&origin), 3);

    // Three refresh pages exhaust the retry budget.
    queue_token_pages(&origin, 3);
    let err = calls::call(Some(&h), "client.count", args! {}).unwrap_err();
    assert!(matches!(err, ApiError::UpdatingToken), "{err:?}");
    assert_eq!(hits(&origin), 6);
}

#[test]
fn maintenance_is_reported() {
    let origin = start_server();
    let h = handler(&origin);

    set_maintenance(&origin, true);
    let err = client::list(args! {}, Some(&h)).unwrap_err();
    assert!(matches!(err, ApiError::Maintenance { code: 1, .. }), "{err:?}");
    assert!(err.is_response_error());

    set_maintenance(&origin, false);
    assert!(client::list(args! {}, Some(&h)).is_ok());
}

#[test]
fn unknown_methods_fail_before_dispatch() {
    let origin = start_server();
    let h = handler(&origin);

    let err = calls::call(Some(&h), "client.teleport", args! {}).unwrap_err();
    assert!(matches!(err, ApiError::Request(_)), "{err:?}");
    assert_eq!(hits(&origin), 0);
}

#[test]
fn file_uploads_travel_as_multipart() {
    let origin = start_server();
    let h = handler(&origin);

    let ticket_id = calls::call(
        Some(&h),
        "support.ticket_submit",
        args! {
            "subject" => "Disk full",
            "body" => "See attached log",
            "attachment" => FilePayload::new("trace.log", "text/plain", b"/dev/sda1 full".to_vec()),
        },
    )
    .unwrap()
    .into_value()
    .unwrap();
    assert_eq!(ticket_id, Value::from("5001"));

    let ticket = calls::call(Some(&h), "support.ticket_get", args! { "ticket_id" => 5001 })
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(ticket["subject"], Value::from("Disk full"));
    assert_eq!(ticket["body"], Value::from("See attached log"));
    let attachment = &ticket["attachments"]["trace.log"];
    assert_eq!(attachment["field"], Value::from("attachment"));
    assert_eq!(attachment["content_type"], Value::from("text/plain"));
    assert_eq!(attachment["body"], Value::from("/dev/sda1 full"));
}

#[test]
fn unsafe_file_metadata_is_rejected_before_dispatch() {
    let origin = start_server();
    let h = handler(&origin);

    let err = calls::call(
        Some(&h),
        "support.ticket_submit",
        args! {
            "subject" => "Injected",
            "attachment" => FilePayload::new("r.txt", "text/plain\r\nX-Injected: 1", b"hello".to_vec()),
        },
    )
    .unwrap_err();
    assert!(matches!(err, ApiError::Encoding(_)), "{err:?}");
    assert_eq!(hits(&origin), 0);
}
