use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, API_PATH, DOCUMENTATION_PDF, INVALID_LOGIN_MESSAGE, MAINTENANCE_MESSAGE};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn api_request(method: &str, form: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(format!("{API_PATH}?method={method}"))
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(form.to_string())
        .unwrap()
}

fn control_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

async fn call(app: &axum::Router, method: &str, form: &str) -> axum::response::Response {
    app.clone().oneshot(api_request(method, form)).await.unwrap()
}

// --- client.* ---

#[tokio::test]
async fn client_list_starts_empty() {
    let app = app();
    let resp = call(&app, "client.list", "").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let envelope = body_json(resp).await;
    assert_eq!(envelope["status"], true);
    assert_eq!(envelope["data"], serde_json::json!({}));
}

#[tokio::test]
async fn client_add_then_get_by_login() {
    let app = app();
    let resp = call(&app, "client.add", "first=Alice&last=Smith&login=alice&pass=secret").await;
    let envelope = body_json(resp).await;
    assert_eq!(envelope["data"], "1001");

    let resp = call(&app, "client.get", "user_login=alice").await;
    let envelope = body_json(resp).await;
    assert_eq!(envelope["status"], true);
    assert_eq!(envelope["data"]["clientid"], "1001");
    assert_eq!(envelope["data"]["first"], "Alice");
    assert!(envelope["data"].get("pass").is_none());
}

#[tokio::test]
async fn client_count_tracks_adds() {
    let app = app();
    call(&app, "client.add", "login=a").await;
    call(&app, "client.add", "login=b").await;

    let envelope = body_json(call(&app, "client.count", "").await).await;
    assert_eq!(envelope["data"], "2");
}

#[tokio::test]
async fn unknown_client_is_a_vendor_error() {
    let app = app();
    let envelope = body_json(call(&app, "client.get", "client_id=77").await).await;
    assert_eq!(envelope["status"], false);
    assert_eq!(envelope["error_code"], 1);
}

// --- support.* ---

#[tokio::test]
async fn ticket_submit_accepts_multipart_attachments() {
    let app = app();
    let body = concat!(
        "--XYZ\r\n",
        "Content-Disposition: form-data; name=\"subject\"\r\n\r\n",
        "Disk full\r\n",
        "--XYZ\r\n",
        "Content-Disposition: form-data; name=\"attachment\"; filename=\"trace.log\"\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "boom\r\n",
        "--XYZ--\r\n",
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("{API_PATH}?method=support.ticket_submit"))
        .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
        .body(body.to_string())
        .unwrap();
    let envelope = body_json(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(envelope["data"], "5001");

    let envelope = body_json(call(&app, "support.ticket_get", "ticket_id=5001").await).await;
    assert_eq!(envelope["data"]["subject"], "Disk full");
    assert_eq!(envelope["data"]["attachments"]["trace.log"]["size"], "4");
    assert_eq!(envelope["data"]["attachments"]["trace.log"]["field"], "attachment");
}

// --- uber.* ---

#[tokio::test]
async fn check_login_rejects_bad_password() {
    let app = app();
    call(&app, "client.add", "login=alice&pass=secret").await;

    let envelope = body_json(call(&app, "uber.check_login", "login=alice&pass=wrong").await).await;
    assert_eq!(envelope["error_code"], 3);
    assert_eq!(envelope["error_message"], INVALID_LOGIN_MESSAGE);

    let envelope = body_json(call(&app, "uber.check_login", "login=alice&pass=secret").await).await;
    assert_eq!(envelope["status"], true);
    assert_eq!(envelope["data"]["id"], "1001");
}

#[tokio::test]
async fn documentation_is_served_as_pdf() {
    let app = app();
    let resp = call(&app, "uber.documentation", "").await;

    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/pdf");
    assert!(resp.headers()[http::header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("ubersmith_api_documentation.pdf"));
    assert!(resp.headers().contains_key(http::header::LAST_MODIFIED));
    assert_eq!(&body_bytes(resp).await[..], DOCUMENTATION_PDF);
}

#[tokio::test]
async fn unknown_method_is_a_vendor_error() {
    let app = app();
    let envelope = body_json(call(&app, "bogus.method", "").await).await;
    assert_eq!(envelope["status"], false);
    assert!(envelope["error_message"].as_str().unwrap().contains("bogus.method"));
}

// --- control ---

#[tokio::test]
async fn queued_token_pages_are_served_first() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(control_request("POST", "/control/token-refresh?pages=1", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = call(&app, "client.count", "").await;
    let content_type = resp.headers()[http::header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let page = body_bytes(resp).await;
    assert!(String::from_utf8_lossy(&page).contains("Updating Token"));

    let envelope = body_json(call(&app, "client.count", "").await).await;
    assert_eq!(envelope["data"], "0");
}

#[tokio::test]
async fn maintenance_mode_answers_every_call() {
    let app = app();
    app.clone()
        .oneshot(control_request("PUT", "/control/maintenance", r#"{"enabled":true}"#))
        .await
        .unwrap();

    let envelope = body_json(call(&app, "client.list", "").await).await;
    assert_eq!(envelope["error_code"], 1);
    assert_eq!(envelope["error_message"], MAINTENANCE_MESSAGE);

    app.clone()
        .oneshot(control_request("PUT", "/control/maintenance", r#"{"enabled":false}"#))
        .await
        .unwrap();
    let envelope = body_json(call(&app, "client.list", "").await).await;
    assert_eq!(envelope["status"], true);
}

#[tokio::test]
async fn hits_count_api_calls_only() {
    let app = app();
    call(&app, "client.count", "").await;
    call(&app, "client.count", "").await;

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/control/hits").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["hits"], 2);
}
