//! Fake log file API server for HTTP source tests.
//!
//! Spins up a minimal `axum` HTTP server on a random TCP port bound to
//! 127.0.0.1. Serves:
//! - `GET /v1/instances/{instance}/logfiles`: the file listing
//! - `GET /v1/instances/{instance}/logfiles/{file}`: one portion of a file
//!
//! Marker tokens are line offsets. Status codes queued with
//! [`FakeLogApi::respond_with`] are served, in order, before normal handling.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Default)]
struct ApiState {
    instance: String,
    /// File name → (LastWritten millis, lines).
    files: BTreeMap<String, (i64, Vec<String>)>,
    page_lines: Option<usize>,
    scripted: VecDeque<StatusCode>,
    /// Raw request paths with query, in arrival order.
    requests: Vec<String>,
}

type Shared = Arc<Mutex<ApiState>>;

/// Handle to the running fake log API.
pub struct FakeLogApi {
    addr: SocketAddr,
    state: Shared,
}

impl FakeLogApi {
    /// Start serving `instance`. Returns once the listener is bound.
    pub async fn start(instance: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(ApiState {
            instance: instance.to_string(),
            ..ApiState::default()
        }));

        let app = Router::new()
            .route("/v1/instances/{instance}/logfiles", get(list_files))
            .route("/v1/instances/{instance}/logfiles/{file}", get(fetch_portion))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Ok(Self { addr, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn add_file(&self, name: &str, last_written_ms: i64, lines: &[&str]) {
        let mut state = self.state.lock().await;
        state.files.insert(
            name.to_string(),
            (last_written_ms, lines.iter().map(|l| l.to_string()).collect()),
        );
    }

    pub async fn remove_file(&self, name: &str) {
        self.state.lock().await.files.remove(name);
    }

    /// Page size used when a request carries no `lines` parameter.
    pub async fn set_page_lines(&self, n: usize) {
        self.state.lock().await.page_lines = Some(n);
    }

    /// Answer the next request with `status` and an empty body.
    pub async fn respond_with(&self, status: StatusCode) {
        self.state.lock().await.scripted.push_back(status);
    }

    pub async fn requests(&self) -> Vec<String> {
        self.state.lock().await.requests.clone()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn list_files(Path(instance): Path<String>, State(state): State<Shared>) -> Response {
    let mut state = state.lock().await;
    state.requests.push(format!("/v1/instances/{instance}/logfiles"));
    if let Some(status) = state.scripted.pop_front() {
        return status.into_response();
    }
    if instance != state.instance {
        return StatusCode::NOT_FOUND.into_response();
    }

    let files: Vec<_> = state
        .files
        .iter()
        .map(|(name, (last_written, lines))| {
            let size: usize = lines.iter().map(|l| l.len() + 1).sum();
            json!({ "LogFileName": name, "LastWritten": last_written, "Size": size })
        })
        .collect();
    Json(json!({ "DescribeDBLogFiles": files })).into_response()
}

async fn fetch_portion(
    Path((instance, file)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<Shared>,
) -> Response {
    let mut state = state.lock().await;
    let mut request = format!("/v1/instances/{instance}/logfiles/{file}");
    let mut params: Vec<_> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    params.sort();
    if !params.is_empty() {
        request.push('?');
        request.push_str(&params.join("&"));
    }
    state.requests.push(request);

    if let Some(status) = state.scripted.pop_front() {
        return status.into_response();
    }
    if instance != state.instance {
        return StatusCode::NOT_FOUND.into_response();
    }
    let page_lines = state.page_lines;
    let Some((_, lines)) = state.files.get(&file) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let len = lines.len();
    let requested: Option<usize> = query.get("lines").and_then(|n| n.parse().ok());
    let limit = requested.or(page_lines).unwrap_or(usize::MAX);
    let (from, to) = match query.get("marker") {
        None => (len.saturating_sub(requested.unwrap_or(len)), len),
        Some(marker) => match marker.parse::<usize>() {
            Ok(from) => {
                let from = from.min(len);
                (from, len.min(from.saturating_add(limit)))
            }
            Err(_) => return (StatusCode::BAD_REQUEST, "bad marker").into_response(),
        },
    };

    let data: String = lines[from..to].iter().map(|l| format!("{l}\n")).collect();
    Json(json!({
        "LogFileData": data,
        "Marker": to.to_string(),
        "AdditionalDataPending": to < len,
    }))
    .into_response()
}
