//! Local stand-in for the Google REST endpoints, served with axum.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use cogee::auth::{Session, StaticToken};
use serde_json::Value;

pub const TOKEN: &str = "test-token";

/// One request as seen by the fake server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: String,
    pub authorization: Option<String>,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

type Responder = dyn Fn(&Recorded) -> (StatusCode, Value) + Send + Sync;

#[derive(Clone)]
struct FakeApi {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

async fn handle(
    State(api): State<FakeApi>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let recorded = Recorded {
        method,
        path: uri.path().to_string(),
        query: uri.query().unwrap_or("").to_string(),
        body,
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    let (status, json) = (api.responder)(&recorded);
    api.requests.lock().unwrap().push(recorded);
    (status, Json(json)).into_response()
}

/// Serves `responder` on an ephemeral port; returns the base URL and the request log.
pub async fn serve<F>(responder: F) -> (String, Arc<Mutex<Vec<Recorded>>>)
where
    F: Fn(&Recorded) -> (StatusCode, Value) + Send + Sync + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let api = FakeApi {
        responder: Arc::new(responder),
        requests: requests.clone(),
    };
    let app = Router::new().fallback(handle).with_state(api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), requests)
}

pub fn session(project: Option<&str>) -> Arc<Session> {
    Arc::new(Session::from_token_source(
        StaticToken(TOKEN.into()),
        project.map(str::to_string),
        "test",
    ))
}
