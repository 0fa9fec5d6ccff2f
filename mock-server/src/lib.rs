//! Programmable HTTP mock server.
//!
//! # Design
//! Tests register expectations (method + path + optional body, answered with
//! a canned status/body) and afterwards ask how many times a request was
//! seen. Every request that is not a control call is recorded, matched or
//! not. The first registered expectation that matches answers; anything
//! unmatched gets `404`.
//!
//! The same registry is reachable in-process through [`MockServer`] and over
//! HTTP through the `/mockserver/*` control routes, so the standalone binary
//! can be driven from any language.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::put,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{error, info};
use uuid::Uuid;

/// Which requests an expectation applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMatcher {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl RequestMatcher {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Bodies compare as JSON values when both sides parse as JSON, and as
    /// exact strings otherwise.
    pub fn matches(&self, request: &RecordedRequest) -> bool {
        if !self.method.eq_ignore_ascii_case(&request.method) || self.path != request.path {
            return false;
        }
        let Some(expected) = &self.body else {
            return true;
        };
        match (
            serde_json::from_str::<serde_json::Value>(expected),
            serde_json::from_str::<serde_json::Value>(&request.body),
        ) {
            (Ok(expected), Ok(actual)) => expected == actual,
            _ => *expected == request.body,
        }
    }
}

/// What the server answers for a matched request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockResponse {
    pub status: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl MockResponse {
    /// A bodiless response, e.g. `204 No Content`.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            content_type: None,
            delay_ms: None,
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: Some("application/json".to_string()),
            delay_ms: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(delay.as_millis() as u64);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub request: RequestMatcher,
    pub response: MockResponse,
}

/// A request as the server received it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Registered expectations plus the request log.
#[derive(Debug, Default)]
pub struct Registry {
    expectations: Vec<(Uuid, Expectation)>,
    requests: Vec<RecordedRequest>,
}

impl Registry {
    pub fn register(&mut self, expectation: Expectation) -> Uuid {
        let id = Uuid::new_v4();
        self.expectations.push((id, expectation));
        id
    }

    pub fn clear(&mut self, id: Uuid) -> bool {
        let before = self.expectations.len();
        self.expectations.retain(|(existing, _)| *existing != id);
        self.expectations.len() != before
    }

    pub fn reset(&mut self) {
        self.expectations.clear();
        self.requests.clear();
    }

    /// Exact number of recorded requests the matcher accepts.
    pub fn count(&self, matcher: &RequestMatcher) -> usize {
        self.requests.iter().filter(|r| matcher.matches(r)).count()
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    /// Record `request` and return the answer of the first matching
    /// expectation.
    pub fn handle(&mut self, request: RecordedRequest) -> Option<MockResponse> {
        let response = self
            .expectations
            .iter()
            .find(|(_, e)| e.request.matches(&request))
            .map(|(_, e)| e.response.clone());
        self.requests.push(request);
        response
    }
}

pub type SharedRegistry = Arc<Mutex<Registry>>;

fn lock(registry: &SharedRegistry) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registered {
    pub id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub count: usize,
}

pub fn app(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/mockserver/expectation", put(register_expectation))
        .route("/mockserver/verify", put(verify_requests))
        .route("/mockserver/retrieve", put(retrieve_requests))
        .route("/mockserver/reset", put(reset_registry))
        .fallback(dispatch)
        .with_state(registry)
}

pub async fn run(listener: TcpListener, registry: SharedRegistry) -> Result<(), std::io::Error> {
    axum::serve(listener, app(registry)).await
}

async fn register_expectation(
    State(registry): State<SharedRegistry>,
    Json(expectation): Json<Expectation>,
) -> (StatusCode, Json<Registered>) {
    info!(
        method = %expectation.request.method,
        path = %expectation.request.path,
        status = expectation.response.status,
        "expectation registered"
    );
    let id = lock(&registry).register(expectation);
    (StatusCode::CREATED, Json(Registered { id }))
}

async fn verify_requests(
    State(registry): State<SharedRegistry>,
    Json(matcher): Json<RequestMatcher>,
) -> Json<Verification> {
    let count = lock(&registry).count(&matcher);
    Json(Verification { count })
}

async fn retrieve_requests(State(registry): State<SharedRegistry>) -> Json<Vec<RecordedRequest>> {
    Json(lock(&registry).requests().to_vec())
}

async fn reset_registry(State(registry): State<SharedRegistry>) -> StatusCode {
    lock(&registry).reset();
    StatusCode::OK
}

async fn dispatch(
    State(registry): State<SharedRegistry>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request = RecordedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect(),
        body,
    };
    let path = request.path.clone();
    let matched = lock(&registry).handle(request);
    let Some(mock) = matched else {
        info!(%method, %path, "no expectation matched");
        return StatusCode::NOT_FOUND.into_response();
    };
    info!(%method, %path, status = mock.status, "expectation matched");

    if let Some(delay) = mock.delay_ms {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    into_response(mock)
}

fn into_response(mock: MockResponse) -> Response {
    let status = StatusCode::from_u16(mock.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match mock.content_type {
        Some(content_type) => (status, [(header::CONTENT_TYPE, content_type)], mock.body).into_response(),
        None if mock.body.is_empty() => status.into_response(),
        None => (status, mock.body).into_response(),
    }
}

/// A mock server on an ephemeral loopback port, running on its own thread
/// and runtime so blocking and async clients can both call it. Stops when
/// dropped.
pub struct MockServer {
    addr: SocketAddr,
    registry: SharedRegistry,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    pub fn spawn() -> Result<Self, std::io::Error> {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = std_listener.local_addr()?;
        std_listener.set_nonblocking(true)?;

        let registry = SharedRegistry::default();
        let router = app(registry.clone());
        let (shutdown, stopped) = oneshot::channel::<()>();

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(err) => {
                    error!(%err, "mock server runtime failed to start");
                    return;
                }
            };
            rt.block_on(async move {
                let listener = match TcpListener::from_std(std_listener) {
                    Ok(listener) => listener,
                    Err(err) => {
                        error!(%err, "mock server listener failed");
                        return;
                    }
                };
                let served = axum::serve(listener, router)
                    .with_graceful_shutdown(async {
                        let _ = stopped.await;
                    })
                    .await;
                if let Err(err) = served {
                    error!(%err, "mock server stopped with error");
                }
            });
        });

        Ok(Self {
            addr,
            registry,
            shutdown: Some(shutdown),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Answer requests accepted by `request` with `response`.
    pub fn when(&self, request: RequestMatcher, response: MockResponse) -> Uuid {
        lock(&self.registry).register(Expectation { request, response })
    }

    /// Number of recorded requests accepted by `request`.
    pub fn verify(&self, request: &RequestMatcher) -> usize {
        lock(&self.registry).count(request)
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        lock(&self.registry).requests().to_vec()
    }

    pub fn clear(&self, id: Uuid) -> bool {
        lock(&self.registry).clear(id)
    }

    pub fn reset(&self) {
        lock(&self.registry).reset();
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(method: &str, path: &str, body: &str) -> RecordedRequest {
        RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            query: None,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn matcher_without_body_ignores_body() {
        let matcher = RequestMatcher::new("GET", "/posts/1");
        assert!(matcher.matches(&recorded("get", "/posts/1", "anything")));
        assert!(!matcher.matches(&recorded("GET", "/posts/2", "")));
        assert!(!matcher.matches(&recorded("POST", "/posts/1", "")));
    }

    #[test]
    fn json_bodies_compare_structurally() {
        let matcher = RequestMatcher::new("POST", "/posts").with_body(r#"{"id":null,"userId":"u"}"#);
        assert!(matcher.matches(&recorded("POST", "/posts", r#"{ "userId": "u", "id": null }"#)));
        assert!(!matcher.matches(&recorded("POST", "/posts", r#"{"id":1,"userId":"u"}"#)));
    }

    #[test]
    fn non_json_bodies_compare_exactly() {
        let matcher = RequestMatcher::new("PUT", "/raw").with_body("hello");
        assert!(matcher.matches(&recorded("PUT", "/raw", "hello")));
        assert!(!matcher.matches(&recorded("PUT", "/raw", "hello ")));
    }

    #[test]
    fn first_registered_expectation_wins() {
        let mut registry = Registry::default();
        registry.register(Expectation {
            request: RequestMatcher::new("GET", "/posts"),
            response: MockResponse::json(200, "[1]"),
        });
        registry.register(Expectation {
            request: RequestMatcher::new("GET", "/posts"),
            response: MockResponse::json(200, "[2]"),
        });
        let answer = registry.handle(recorded("GET", "/posts", "")).unwrap();
        assert_eq!(answer.body, "[1]");
    }

    #[test]
    fn unmatched_requests_are_still_recorded() {
        let mut registry = Registry::default();
        assert!(registry.handle(recorded("GET", "/nothing", "")).is_none());
        assert_eq!(registry.count(&RequestMatcher::new("GET", "/nothing")), 1);
    }

    #[test]
    fn clear_and_reset() {
        let mut registry = Registry::default();
        let id = registry.register(Expectation {
            request: RequestMatcher::new("GET", "/a"),
            response: MockResponse::status(204),
        });
        registry.handle(recorded("GET", "/a", ""));
        assert!(registry.clear(id));
        assert!(!registry.clear(id));
        assert!(registry.handle(recorded("GET", "/a", "")).is_none());
        registry.reset();
        assert!(registry.requests().is_empty());
    }

    #[test]
    fn expectation_roundtrips_through_json() {
        let expectation = Expectation {
            request: RequestMatcher::new("POST", "/posts").with_body("{}"),
            response: MockResponse::json(201, r#"{"id":1}"#).with_delay(Duration::from_millis(5)),
        };
        let json = serde_json::to_string(&expectation).unwrap();
        let back: Expectation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expectation);
    }

    #[test]
    fn minimal_expectation_json_uses_defaults() {
        let expectation: Expectation = serde_json::from_str(
            r#"{"request":{"method":"DELETE","path":"/posts/1"},"response":{"status":204}}"#,
        )
        .unwrap();
        assert_eq!(expectation.response, MockResponse::status(204));
        assert!(expectation.request.body.is_none());
    }
}
