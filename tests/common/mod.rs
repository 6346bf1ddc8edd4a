//! In-process identity provider and OAC instance for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use oac_client::config::IdentityConfig;

pub const TOKEN_PATH: &str = "/oauth2/v1/token";

/// A request received by the mock
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

/// A request received by the token endpoint
#[derive(Debug, Clone)]
pub struct SeenToken {
    pub authorization: Option<String>,
    pub form: HashMap<String, String>,
}

#[derive(Default)]
pub struct MockState {
    token_calls: AtomicUsize,
    api_calls: AtomicUsize,
    token_override: Mutex<Option<(StatusCode, String)>>,
    expires_in: Mutex<Option<Value>>,
    api_queue: Mutex<VecDeque<(StatusCode, String)>>,
    api_default: Mutex<Option<(StatusCode, String)>>,
    token_requests: Mutex<Vec<SeenToken>>,
    api_requests: Mutex<Vec<Seen>>,
}

/// Handle on a running mock server
#[derive(Clone)]
pub struct MockServer {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        *state.expires_in.lock().unwrap() = Some(json!(3600));

        let app = Router::new()
            .route(TOKEN_PATH, post(token))
            .fallback(api)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.base_url)
    }

    pub fn identity(&self, grant_type: &str) -> IdentityConfig {
        IdentityConfig {
            token_url: Some(self.token_url()),
            client_id: Some("my-client".to_string()),
            client_secret: Some("my-secret".to_string()),
            scope: Some("urn:opc:resource:consumer::all".to_string()),
            grant_type: Some(grant_type.to_string()),
            ..Default::default()
        }
    }

    /// Answer every token request with this status and body
    pub fn token_responds(&self, status: StatusCode, body: &str) {
        *self.state.token_override.lock().unwrap() = Some((status, body.to_string()));
    }

    /// `expires_in` value in issued tokens; `None` omits the field
    pub fn set_expires_in(&self, value: Option<Value>) {
        *self.state.expires_in.lock().unwrap() = value;
    }

    /// Queue a one-off API response
    pub fn api_responds_once(&self, status: StatusCode, body: &str) {
        self.state
            .api_queue
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    /// API response once the queue is empty
    pub fn api_responds(&self, status: StatusCode, body: &str) {
        *self.state.api_default.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn token_calls(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    pub fn api_calls(&self) -> usize {
        self.state.api_calls.load(Ordering::SeqCst)
    }

    pub fn token_requests(&self) -> Vec<SeenToken> {
        self.state.token_requests.lock().unwrap().clone()
    }

    pub fn api_requests(&self) -> Vec<Seen> {
        self.state.api_requests.lock().unwrap().clone()
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn token(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let n = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    state.token_requests.lock().unwrap().push(SeenToken {
        authorization: header_value(&headers, header::AUTHORIZATION),
        form,
    });

    if let Some((status, body)) = state.token_override.lock().unwrap().clone() {
        return (status, body).into_response();
    }

    let mut body = json!({
        "access_token": format!("token-{n}"),
        "token_type": "Bearer",
    });
    if let Some(expires_in) = state.expires_in.lock().unwrap().clone() {
        body["expires_in"] = expires_in;
    }
    Json(body).into_response()
}

async fn api(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.api_calls.fetch_add(1, Ordering::SeqCst);
    state.api_requests.lock().unwrap().push(Seen {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: header_value(&headers, header::AUTHORIZATION),
        content_type: header_value(&headers, header::CONTENT_TYPE),
        body,
    });

    let queued = state.api_queue.lock().unwrap().pop_front();
    let (status, body) = queued
        .or_else(|| state.api_default.lock().unwrap().clone())
        .unwrap_or((StatusCode::OK, String::new()));
    (status, body).into_response()
}
