//! HTTP/JSON client for the log file API.
//!
//! Speaks to a gateway exposing the two log-file operations:
//!
//! | Request | Response |
//! |---------|----------|
//! | `GET /v1/instances/{instance}/logfiles` | `{"DescribeDBLogFiles":[{"LogFileName","LastWritten","Size"}]}` |
//! | `GET /v1/instances/{instance}/logfiles/{file}?marker=M&lines=N` | `{"LogFileData","Marker","AdditionalDataPending"}` |
//!
//! `marker=0` reads from the start of the file; omitting the marker asks for
//! the last `lines` lines. Throttling (429), server errors, transport errors
//! and timeouts are retried with capped exponential backoff; once the budget
//! is spent the request fails with [`SourceError::Unavailable`].

use crate::{LogSource, SourceError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Empty};
use hyper::{header, Request, StatusCode, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use rdstail_core::config::SourceConfig;
use rdstail_core::{Marker, Position, RawChunk, RemoteFile, RetryPolicy};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Everything outside the RFC 3986 unreserved set.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DescribeLogFilesResponse {
    #[serde(rename = "DescribeDBLogFiles", default)]
    files: Vec<LogFileDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LogFileDetails {
    log_file_name: String,
    /// Milliseconds since the Unix epoch.
    last_written: i64,
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LogFilePortion {
    #[serde(default)]
    log_file_data: String,
    marker: String,
    #[serde(default)]
    additional_data_pending: bool,
}

impl LogFileDetails {
    fn into_remote_file(self) -> Result<RemoteFile, SourceError> {
        let last_written = DateTime::<Utc>::from_timestamp_millis(self.last_written).ok_or_else(|| {
            SourceError::Protocol(format!(
                "{}: LastWritten {} out of range",
                self.log_file_name, self.last_written
            ))
        })?;
        Ok(RemoteFile::new(self.log_file_name, last_written, self.size))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`LogSource`] backed by the HTTP log API.
#[derive(Debug, Clone)]
pub struct HttpLogSource {
    client: Client<HttpConnector, Empty<Bytes>>,
    endpoint: String,
    retry: RetryPolicy,
    request_timeout: Duration,
}

enum Outcome {
    Body(Bytes),
    NotFound,
    /// Worth retrying.
    Transient(String),
    /// A client error that retrying will not fix.
    Rejected(String),
}

impl HttpLogSource {
    pub fn new(config: &SourceConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(config.max_retries, RETRY_BASE_DELAY, RETRY_MAX_DELAY),
            request_timeout: config.request_timeout,
        }
    }

    /// Replace the backoff schedule (tests use millisecond delays).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn uri(&self, path_and_query: &str) -> Result<Uri, SourceError> {
        format!("{}{}", self.endpoint, path_and_query)
            .parse()
            .map_err(|e| SourceError::Protocol(format!("invalid request uri: {e}")))
    }

    async fn send_once(&self, request: Request<Empty<Bytes>>) -> Outcome {
        let response = match tokio::time::timeout(self.request_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Outcome::Transient(e.to_string()),
            Err(_) => return Outcome::Transient("request timed out".to_string()),
        };

        let status = response.status();
        let body = match tokio::time::timeout(self.request_timeout, response.into_body().collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => return Outcome::Transient(e.to_string()),
            Err(_) => return Outcome::Transient("response body timed out".to_string()),
        };

        if status.is_success() {
            Outcome::Body(body)
        } else if status == StatusCode::NOT_FOUND {
            Outcome::NotFound
        } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Outcome::Transient(format!("HTTP {status}"))
        } else {
            Outcome::Rejected(format!("HTTP {status}: {}", String::from_utf8_lossy(&body)))
        }
    }

    /// GET `uri` and decode JSON, retrying transient failures. A 404 maps to
    /// `not_found`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        uri: Uri,
        not_found: impl FnOnce() -> SourceError,
    ) -> Result<T, SourceError> {
        let mut attempt = 0;
        loop {
            let failure = match self.send_once(build_request(&uri)?).await {
                Outcome::Body(body) => {
                    return serde_json::from_slice(&body)
                        .map_err(|e| SourceError::Protocol(format!("{uri}: {e}")));
                }
                Outcome::NotFound => return Err(not_found()),
                Outcome::Rejected(reason) => return Err(SourceError::Protocol(format!("{uri}: {reason}"))),
                Outcome::Transient(reason) => reason,
            };

            if !self.retry.allows(attempt) {
                return Err(SourceError::Unavailable(format!(
                    "{uri}: {failure} (after {} attempts)",
                    attempt + 1
                )));
            }
            let delay = self.retry.backoff(attempt);
            debug!(%uri, attempt, ?delay, error = %failure, "retrying log API request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl LogSource for HttpLogSource {
    async fn list_files(&self, instance: &str) -> Result<Vec<RemoteFile>, SourceError> {
        let uri = self.uri(&format!("/v1/instances/{}/logfiles", encode_component(instance)))?;
        let response: DescribeLogFilesResponse = self
            .get_json(uri, || SourceError::Unavailable(format!("unknown instance {instance}")))
            .await?;

        trace!(instance, files = response.files.len(), "listed log files");
        response
            .files
            .into_iter()
            .map(LogFileDetails::into_remote_file)
            .collect()
    }

    async fn fetch(
        &self,
        instance: &str,
        file: &RemoteFile,
        position: Position,
        max_lines: u64,
    ) -> Result<RawChunk, SourceError> {
        let position = position.scoped_to(file);
        let uri = self.uri(&format!(
            "/v1/instances/{}/logfiles/{}{}",
            encode_component(instance),
            encode_component(&file.name),
            portion_query(&position, max_lines),
        ))?;

        let portion: LogFilePortion = self
            .get_json(uri, || SourceError::RotatedAway(file.name.clone()))
            .await?;

        trace!(
            instance,
            file = %file.name,
            bytes = portion.log_file_data.len(),
            pending = portion.additional_data_pending,
            "fetched log file portion"
        );
        Ok(RawChunk {
            data: portion.log_file_data,
            marker: Marker::new(file.name.clone(), portion.marker),
            end_of_file: !portion.additional_data_pending,
        })
    }
}

/// Building the request is deterministic, so a failure here is not retried.
fn build_request(uri: &Uri) -> Result<Request<Empty<Bytes>>, SourceError> {
    Request::get(uri.clone())
        .header(header::ACCEPT, "application/json")
        .body(Empty::new())
        .map_err(invalid_request)
}

fn invalid_request(e: hyper::http::Error) -> SourceError {
    SourceError::Protocol(format!("invalid request: {e}"))
}

fn portion_query(position: &Position, max_lines: u64) -> String {
    let mut params = Vec::with_capacity(2);
    match position {
        Position::Start => params.push("marker=0".to_string()),
        Position::After(marker) => params.push(format!("marker={}", encode_component(marker.token()))),
        Position::Tail => {}
    }
    if max_lines > 0 {
        params.push(format!("lines={max_lines}"));
    }
    if params.is_empty() {
        String::new()
    } else {
        format!("?{}", params.join("&"))
    }
}

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}
