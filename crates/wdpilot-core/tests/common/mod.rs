//! Shared test helpers for wdpilot-core integration tests.
//!
//! [`FakeServer`] is a minimal in-process WebDriver endpoint: it tracks live
//! sessions, records every request it sees, and answers the handful of
//! element commands the tests drive.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

use wdpilot_core::element::W3C_ELEMENT_KEY;

/// Accessibility id of the one element the fake server knows about.
pub const KNOWN_ELEMENT: &str = "Login";
pub const KNOWN_ELEMENT_ID: &str = "el-1";
pub const KNOWN_LABEL: &str = "Welcome";

#[derive(Default)]
struct ServerState {
    requests: Vec<String>,
    live: HashSet<String>,
    created: usize,
}

type Shared = Arc<Mutex<ServerState>>;

/// Handle to a running fake server.
#[derive(Clone)]
pub struct FakeServer {
    addr: SocketAddr,
    state: Shared,
}

impl FakeServer {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request seen so far as `METHOD /path`.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Number of `POST /session` requests.
    pub fn sessions_created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn is_live(&self, session_id: &str) -> bool {
        self.state.lock().unwrap().live.contains(session_id)
    }

    /// Registers a session as if another process had created it.
    pub fn add_live(&self, session_id: &str) {
        self.state.lock().unwrap().live.insert(session_id.to_string());
    }

    /// Forgets a session, as a server restart would.
    pub fn kill(&self, session_id: &str) {
        self.state.lock().unwrap().live.remove(session_id);
    }
}

fn ok(value: Value) -> Response {
    (StatusCode::OK, Json(json!({ "value": value }))).into_response()
}

fn error(status: StatusCode, code: &str) -> Response {
    (
        status,
        Json(json!({ "value": { "error": code, "message": code, "stacktrace": "" } })),
    )
        .into_response()
}

async fn handle(State(state): State<Shared>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut state = state.lock().unwrap();
    state.requests.push(format!("{method} {path}"));

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method, segments.as_slice()) {
        (Method::POST, ["session"]) => {
            state.created += 1;
            let id = format!("sess-{}", state.created);
            state.live.insert(id.clone());
            ok(json!({ "sessionId": id, "capabilities": { "platformName": "iOS" } }))
        }
        (_, ["session", id, ..]) if !state.live.contains(*id) => {
            error(StatusCode::NOT_FOUND, "invalid session id")
        }
        (Method::GET, ["session", _]) => ok(json!({ "capabilities": { "platformName": "iOS" } })),
        (Method::DELETE, ["session", id]) => {
            let id = id.to_string();
            state.live.remove(&id);
            ok(Value::Null)
        }
        (Method::POST, ["session", _, "timeouts"]) => ok(Value::Null),
        (Method::POST, ["session", _, "element"]) => {
            if body["using"] == "accessibility id" && body["value"] == KNOWN_ELEMENT {
                ok(json!({ W3C_ELEMENT_KEY: KNOWN_ELEMENT_ID }))
            } else {
                error(StatusCode::NOT_FOUND, "no such element")
            }
        }
        (Method::POST, ["session", _, "element", _, "click"]) => ok(Value::Null),
        (Method::GET, ["session", _, "element", _, "attribute", "label"]) => ok(json!(KNOWN_LABEL)),
        (Method::GET, ["session", _, "element", _, "attribute", _]) => ok(Value::Null),
        (Method::GET, ["session", _, "element", _, "text"]) => ok(json!(KNOWN_LABEL)),
        (Method::GET, ["session", _, "source"]) => ok(json!(format!(
            "<AppRoot><XCUIElementTypeButton name=\"{KNOWN_ELEMENT}\" label=\"{KNOWN_LABEL}\"/></AppRoot>"
        ))),
        _ => error(StatusCode::NOT_FOUND, "unknown command"),
    }
}
