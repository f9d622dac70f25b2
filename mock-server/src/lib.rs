//! Scriptable HTTP fixture for exercising the transports end-to-end.
//!
//! # Design
//! Tests register a canned `(status, headers, body)` reply per `(verb, path)` pair and
//! then point a real client at the server. Every request that reaches the
//! fallback handler is recorded, so tests can assert on the headers and body
//! that actually went over the wire.

use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

/// Path of the admin route used to register stubs over HTTP.
pub const STUB_ROUTE: &str = "/__stubs";

/// A canned reply for one `(verb, path)` pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stub {
    pub method: String,
    pub path: String,
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

/// A request as observed by the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Default)]
struct Inner {
    replies: HashMap<(String, String), Stub>,
    requests: Vec<Recorded>,
}

/// Shared stub table and request log.
#[derive(Clone, Default)]
pub struct Stubs {
    inner: Arc<RwLock<Inner>>,
}

impl Stubs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `method path` with `status` and `body` until replaced.
    pub async fn stub(&self, method: &str, path: &str, status: u16, body: &str) {
        self.stub_with_headers(method, path, status, &[], body).await;
    }

    /// Like [`Stubs::stub`], also sending the given response headers.
    pub async fn stub_with_headers(
        &self,
        method: &str,
        path: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
    ) {
        self.insert(Stub {
            method: method.to_string(),
            path: path.to_string(),
            status,
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: body.to_string(),
        })
        .await;
    }

    async fn insert(&self, stub: Stub) {
        let key = (stub.method.to_ascii_uppercase(), stub.path.clone());
        self.inner.write().await.replies.insert(key, stub);
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<Recorded> {
        self.inner.read().await.requests.clone()
    }

    pub async fn last_request(&self) -> Option<Recorded> {
        self.inner.read().await.requests.last().cloned()
    }
}

pub fn app(stubs: Stubs) -> Router {
    Router::new()
        .route(STUB_ROUTE, post(register_stub))
        .fallback(respond)
        .with_state(stubs)
}

pub async fn run(listener: TcpListener, stubs: Stubs) -> Result<(), std::io::Error> {
    axum::serve(listener, app(stubs)).await
}

async fn register_stub(State(stubs): State<Stubs>, Json(stub): Json<Stub>) -> StatusCode {
    tracing::debug!(method = %stub.method, path = %stub.path, status = stub.status, "stub registered");
    stubs.insert(stub).await;
    StatusCode::NO_CONTENT
}

async fn respond(
    State(stubs): State<Stubs>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, HeaderMap, String) {
    let path = uri.path().to_string();
    let recorded = Recorded {
        method: method.as_str().to_string(),
        path: path.clone(),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body,
    };

    let mut inner = stubs.inner.write().await;
    inner.requests.push(recorded);

    let key = (method.as_str().to_string(), path);
    match inner.replies.get(&key) {
        Some(stub) => {
            let status = StatusCode::from_u16(stub.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, reply_headers(&stub.headers), stub.body.clone())
        }
        None => {
            tracing::warn!(method = %key.0, path = %key.1, "no stub registered");
            (
                StatusCode::NOT_FOUND,
                HeaderMap::new(),
                format!("no stub for {} {}", key.0, key.1),
            )
        }
    }
}

/// Entries that are not valid HTTP are skipped.
fn reply_headers(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => tracing::warn!(%name, %value, "skipping invalid stub header"),
        }
    }
    map
}
