#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

/// One request seen by the fake server.
#[derive(Debug, Clone)]
pub struct Call {
    pub path: String,
    pub body: Value,
    pub authorization: Option<String>,
}

/// Coordinating server double: records every request, answers register with
/// `register_reply` and everything else with `status`.
pub struct FakeServer {
    pub calls: Mutex<Vec<Call>>,
    pub register_reply: Mutex<Value>,
    pub status: Mutex<StatusCode>,
}

impl FakeServer {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }

    pub fn fail_with(&self, status: StatusCode) {
        *self.status.lock().unwrap() = status;
    }

    pub fn reply_to_register(&self, body: Value) {
        *self.register_reply.lock().unwrap() = body;
    }
}

async fn record(
    State(server): State<Arc<FakeServer>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = Call {
        path: uri.path().to_string(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    server.calls.lock().unwrap().push(call);

    let status = *server.status.lock().unwrap();
    if !status.is_success() {
        return status.into_response();
    }
    if uri.path().ends_with("/workers/register") {
        let reply = server.register_reply.lock().unwrap().clone();
        return Json(reply).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Start a fake server on an ephemeral port; returns it with its base url.
pub async fn fake_server() -> (Arc<FakeServer>, String) {
    let server = Arc::new(FakeServer {
        calls: Mutex::new(Vec::new()),
        register_reply: Mutex::new(json!({"worker_id": 42})),
        status: Mutex::new(StatusCode::OK),
    });
    let app = Router::new().fallback(record).with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (server, format!("http://{addr}/api"))
}
