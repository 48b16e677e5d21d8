//! Test helpers: an in-process stand-in for the remote compression API.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use compress_relay::config::{ClientConfig, ReconcileConfig};
use compress_relay::models::job::ObjectId;
use compress_relay::services::{
    compressor::CompressorClient,
    jobs::JobRepository,
    metadata::InMemoryMetadataStore,
    reconcile::Reconciler,
    submission::{MetadataSourceResolver, Submitter},
};

pub const API_KEY: &str = "sk_test_key";

type Canned = (StatusCode, String);

#[derive(Default)]
pub struct MockState {
    pub submit: Option<Canned>,
    pub statuses: HashMap<String, Canned>,
    pub results: HashMap<String, Canned>,
    pub submissions: Vec<Value>,
    pub api_keys: Vec<String>,
    pub status_calls: usize,
    pub result_calls: usize,
}

/// Scriptable fake of `POST /compress`, `GET /status/{id}` and `GET /result/{id}`.
#[derive(Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_submit(&self, status: StatusCode, body: Value) {
        self.state.lock().unwrap().submit = Some((status, body.to_string()));
    }

    pub fn on_submit_raw(&self, status: StatusCode, body: &str) {
        self.state.lock().unwrap().submit = Some((status, body.to_string()));
    }

    pub fn on_status(&self, job_id: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(job_id.to_string(), (StatusCode::OK, body.to_string()));
    }

    pub fn on_status_raw(&self, job_id: &str, status: StatusCode, body: &str) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(job_id.to_string(), (status, body.to_string()));
    }

    pub fn on_result(&self, job_id: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .results
            .insert(job_id.to_string(), (StatusCode::OK, body.to_string()));
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn api_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().api_keys.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    pub fn result_calls(&self) -> usize {
        self.state.lock().unwrap().result_calls
    }

    fn record_key(&self, headers: &HeaderMap) {
        let key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.state.lock().unwrap().api_keys.push(key);
    }

    /// Serve the mock on an ephemeral port. Returns the API base URL.
    pub async fn spawn(&self) -> String {
        let router = Router::new()
            .route("/api/compress", post(compress))
            .route("/api/status/{job_id}", get(status))
            .route("/api/result/{job_id}", get(result))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api", addr)
    }
}

fn not_found() -> Canned {
    (StatusCode::NOT_FOUND, r#"{"error":"Job not found"}"#.to_string())
}

async fn compress(State(api): State<MockApi>, headers: HeaderMap, Json(body): Json<Value>) -> Canned {
    api.record_key(&headers);
    let mut state = api.state.lock().unwrap();
    state.submissions.push(body);
    state.submit.clone().unwrap_or_else(not_found)
}

async fn status(State(api): State<MockApi>, headers: HeaderMap, Path(job_id): Path<String>) -> Canned {
    api.record_key(&headers);
    let mut state = api.state.lock().unwrap();
    state.status_calls += 1;
    state.statuses.get(&job_id).cloned().unwrap_or_else(not_found)
}

async fn result(State(api): State<MockApi>, headers: HeaderMap, Path(job_id): Path<String>) -> Canned {
    api.record_key(&headers);
    let mut state = api.state.lock().unwrap();
    state.result_calls += 1;
    state.results.get(&job_id).cloned().unwrap_or_else(not_found)
}

/// A base URL nothing listens on, for transport failures.
pub async fn unreachable_base() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}

pub fn client(base_url: &str) -> Arc<CompressorClient> {
    let mut config = ClientConfig::new(base_url, API_KEY);
    config.submit_timeout = Duration::from_secs(5);
    config.query_timeout = Duration::from_secs(5);
    Arc::new(CompressorClient::new(config).unwrap())
}

/// Client components wired to one in-memory store.
pub struct Harness {
    pub store: Arc<InMemoryMetadataStore>,
    pub jobs: JobRepository,
    pub submitter: Submitter,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(base_url, ReconcileConfig::default())
    }

    pub fn with_config(base_url: &str, reconcile: ReconcileConfig) -> Self {
        let store = Arc::new(InMemoryMetadataStore::new());
        let jobs = JobRepository::new(store.clone());
        let client = client(base_url);
        let resolver = Arc::new(MetadataSourceResolver::new(jobs.clone()));
        Self {
            submitter: Submitter::new(client.clone(), jobs.clone(), resolver),
            reconciler: Reconciler::new(client, jobs.clone(), reconcile),
            store,
            jobs,
        }
    }

    /// Register a source URL for `id` so submissions can resolve it.
    pub async fn register(&self, id: u64, url: &str) -> ObjectId {
        let id = ObjectId(id);
        self.jobs.register_source(id, url).await.unwrap();
        id
    }
}
