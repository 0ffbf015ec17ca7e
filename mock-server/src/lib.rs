//! In-memory stand-in for an Ubersmith API endpoint.
//!
//! # Design
//! Every vendor call arrives as `POST /api/2.0/?method=<namespace.action>`
//! with form-encoded (or, when files are attached, multipart) arguments and
//! is answered with the vendor's JSON envelope. Only a handful of methods are served: enough to drive the
//! client core end to end.
//!
//! Control routes under `/control/` let tests queue token refresh pages,
//! toggle maintenance mode and read the number of API hits, so the client's
//! retry and error paths can be exercised over real HTTP.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

pub const API_PATH: &str = "/api/2.0/";

pub const MAINTENANCE_MESSAGE: &str =
    "We are currently undergoing maintenance, please check back shortly.";

pub const INVALID_LOGIN_MESSAGE: &str = "Invalid login or password.";

/// Bytes served by `uber.documentation`.
pub const DOCUMENTATION_PDF: &[u8] = b"%PDF-1.4\n% Ubersmith API documentation\n%%EOF\n";

const DOCUMENTATION_MODIFIED: &str = "Tue, 05 Oct 2021 14:30:00 GMT";

const TOKEN_PAGE: &str =
    "<html><head><title>Ubersmith</title></head><body><h1>Updating Token</h1></body></html>";

const SERVED_METHODS: &[(&str, &str)] = &[
    ("client.add", "Create a new client account"),
    ("client.count", "Count clients matching the given criteria"),
    ("client.get", "Get a client's details"),
    ("client.list", "List clients"),
    ("support.ticket_get", "Get a support ticket"),
    ("support.ticket_submit", "Submit a new support ticket"),
    ("uber.check_login", "Check the specified username and password"),
    ("uber.documentation", "Get a PDF document describing every API method"),
    ("uber.method_list", "Get a list of all available API methods"),
];

/// A stored client: the vendor keeps every field as a string.
pub type ClientRecord = Map<String, Value>;

pub type TicketRecord = Map<String, Value>;

/// A file part received with a multipart call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct Store {
    pub clients: BTreeMap<i64, ClientRecord>,
    pub tickets: BTreeMap<i64, TicketRecord>,
    /// Token refresh pages still to serve before answering normally.
    pub token_pages: u32,
    pub maintenance: bool,
    pub hits: u64,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Deserialize)]
pub struct MethodQuery {
    #[serde(default)]
    pub method: String,
}

#[derive(Deserialize)]
pub struct TokenPages {
    pub pages: u32,
}

#[derive(Deserialize)]
pub struct MaintenanceToggle {
    pub enabled: bool,
}

pub fn app() -> Router {
    app_with_store(Arc::new(RwLock::new(Store::default())))
}

/// Router over an existing store, for tests that seed or inspect it.
pub fn app_with_store(db: Db) -> Router {
    Router::new()
        .route(API_PATH, post(dispatch))
        .route("/control/token-refresh", post(queue_token_pages))
        .route("/control/maintenance", put(set_maintenance))
        .route("/control/hits", get(hits))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock vendor listening");
    }
    axum::serve(listener, app()).await
}

fn ok(data: Value) -> Response {
    Json(json!({
        "status": true,
        "error_code": null,
        "error_message": "",
        "data": data,
    }))
    .into_response()
}

fn fail(code: i64, message: &str) -> Response {
    Json(json!({
        "status": false,
        "error_code": code,
        "error_message": message,
        "data": "",
    }))
    .into_response()
}

fn now() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

/// Form fields and file parts of a call, from either body encoding.
async fn read_args(request: Request) -> Result<(HashMap<String, String>, Vec<Upload>), Response> {
    if !is_multipart(&request) {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(IntoResponse::into_response)?;
        return Ok((fields, Vec::new()));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    let mut fields = HashMap::new();
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(IntoResponse::into_response)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(IntoResponse::into_response)?;
                uploads.push(Upload {
                    field: name,
                    filename,
                    content_type,
                    data: data.to_vec(),
                });
            }
            None => {
                let text = field.text().await.map_err(IntoResponse::into_response)?;
                fields.insert(name, text);
            }
        }
    }
    Ok((fields, uploads))
}

async fn dispatch(State(db): State<Db>, Query(query): Query<MethodQuery>, request: Request) -> Response {
    let (args, uploads) = match read_args(request).await {
        Ok(parsed) => parsed,
        Err(rejection) => return rejection,
    };
    let mut store = db.write().await;
    store.hits += 1;
    info!(method = %query.method, fields = args.len(), files = uploads.len(), "api call");

    if store.token_pages > 0 {
        store.token_pages -= 1;
        debug!(remaining = store.token_pages, "serving token refresh page");
        return Html(TOKEN_PAGE).into_response();
    }
    if store.maintenance {
        return fail(1, MAINTENANCE_MESSAGE);
    }

    match query.method.as_str() {
        "client.add" => client_add(&mut store, args),
        "client.get" => client_get(&store, &args),
        "client.list" => ok(Value::Object(
            store
                .clients
                .iter()
                .map(|(id, record)| (id.to_string(), Value::Object(record.clone())))
                .collect(),
        )),
        "client.count" => ok(json!(store.clients.len().to_string())),
        "support.ticket_submit" => ticket_submit(&mut store, args, uploads),
        "support.ticket_get" => ticket_get(&store, &args),
        "uber.check_login" => check_login(&store, &args),
        "uber.method_list" => ok(Value::Object(
            SERVED_METHODS
                .iter()
                .map(|(method, description)| (method.to_string(), json!(description)))
                .collect(),
        )),
        "uber.documentation" => documentation(),
        "" => fail(1, "No method specified."),
        other => fail(1, &format!("Invalid method specified: {other}")),
    }
}

fn client_add(store: &mut Store, args: HashMap<String, String>) -> Response {
    if !args.get("login").is_some_and(|login| !login.trim().is_empty()) {
        return fail(1, "A login is required to create a client.");
    }
    let id = store.clients.keys().next_back().map_or(1001, |last| last + 1);
    let mut record: ClientRecord = args
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect();
    record.insert("clientid".to_string(), json!(id.to_string()));
    record.insert("active".to_string(), json!("1"));
    record.insert("balance".to_string(), json!("0.00"));
    record.insert("created".to_string(), json!(now()));
    store.clients.insert(id, record);
    ok(json!(id.to_string()))
}

fn find_client<'a>(store: &'a Store, args: &HashMap<String, String>) -> Option<&'a ClientRecord> {
    if let Some(id) = args.get("client_id") {
        return id.trim().parse::<i64>().ok().and_then(|id| store.clients.get(&id));
    }
    let (field, wanted) = match (args.get("user_login"), args.get("email")) {
        (Some(login), _) => ("login", login),
        (None, Some(email)) => ("email", email),
        (None, None) => return None,
    };
    store
        .clients
        .values()
        .find(|record| record.get(field).and_then(Value::as_str) == Some(wanted.as_str()))
}

fn client_get(store: &Store, args: &HashMap<String, String>) -> Response {
    match find_client(store, args) {
        Some(record) => {
            let mut record = record.clone();
            record.remove("pass");
            ok(Value::Object(record))
        }
        None => fail(1, "Invalid client specified."),
    }
}

fn check_login(store: &Store, args: &HashMap<String, String>) -> Response {
    let (Some(login), Some(pass)) = (args.get("login"), args.get("pass")) else {
        return fail(3, INVALID_LOGIN_MESSAGE);
    };
    let matched = store.clients.values().find(|record| {
        record.get("login").and_then(Value::as_str) == Some(login.as_str())
            && record.get("pass").and_then(Value::as_str) == Some(pass.as_str())
    });
    match matched {
        Some(record) => ok(json!({
            "id": record.get("clientid").cloned().unwrap_or(Value::Null),
            "login": login,
            "type": "client",
            "password_expired": "0",
            "last_login": now(),
        })),
        None => fail(3, INVALID_LOGIN_MESSAGE),
    }
}

fn ticket_submit(store: &mut Store, args: HashMap<String, String>, uploads: Vec<Upload>) -> Response {
    if !args.get("subject").is_some_and(|subject| !subject.trim().is_empty()) {
        return fail(1, "A subject is required to submit a ticket.");
    }
    let id = store.tickets.keys().next_back().map_or(5001, |last| last + 1);
    let attachments: Map<String, Value> = uploads
        .into_iter()
        .map(|upload| {
            let meta = json!({
                "field": upload.field,
                "content_type": upload.content_type,
                "size": upload.data.len().to_string(),
                "body": String::from_utf8_lossy(&upload.data),
            });
            (upload.filename, meta)
        })
        .collect();
    let mut record: TicketRecord = args
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect();
    record.insert("ticket_id".to_string(), json!(id.to_string()));
    record.insert("timestamp".to_string(), json!(now()));
    record.insert("attachments".to_string(), Value::Object(attachments));
    store.tickets.insert(id, record);
    ok(json!(id.to_string()))
}

fn ticket_get(store: &Store, args: &HashMap<String, String>) -> Response {
    let ticket = args
        .get("ticket_id")
        .and_then(|id| id.trim().parse::<i64>().ok())
        .and_then(|id| store.tickets.get(&id));
    match ticket {
        Some(record) => ok(Value::Object(record.clone())),
        None => fail(1, "Invalid ticket specified."),
    }
}

fn documentation() -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "inline; filename=\"ubersmith_api_documentation.pdf\"",
            ),
            (header::LAST_MODIFIED, DOCUMENTATION_MODIFIED),
        ],
        DOCUMENTATION_PDF,
    )
        .into_response()
}

async fn queue_token_pages(State(db): State<Db>, Query(input): Query<TokenPages>) -> StatusCode {
    db.write().await.token_pages += input.pages;
    StatusCode::NO_CONTENT
}

async fn set_maintenance(State(db): State<Db>, Json(input): Json<MaintenanceToggle>) -> StatusCode {
    db.write().await.maintenance = input.enabled;
    StatusCode::NO_CONTENT
}

async fn hits(State(db): State<Db>) -> Json<Value> {
    Json(json!({ "hits": db.read().await.hits }))
}
