//! Scripted in-memory [`LogSource`] for tracker and scheduler harnesses.
//!
//! Files are vectors of records, each normally one newline-terminated line;
//! a marker token is the index of the next record to read. Raw records let a
//! test end a file mid-line. Every file change advances a logical clock, so a file created later
//! is always listed as written later.
//!
//! ```rust,ignore
//! let source = FakeSource::new();
//! source.add_file("postgresql.log.1", &["a", "b"]);
//! source.fail_next_fetch(Failure::Unavailable);
//! source.rotate("postgresql.log.2", &["c"]);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rdstail_core::{Marker, Position, RawChunk, RemoteFile};
use rdstail_source::{LogSource, SourceError};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Error to inject on the next matching call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Unavailable,
    RotatedAway,
    Protocol,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Fetch {
        file: String,
        position: Position,
        max_lines: u64,
    },
}

#[derive(Debug, Clone)]
struct FakeFile {
    records: Vec<String>,
    last_written: DateTime<Utc>,
}

#[derive(Debug)]
struct FakeState {
    files: BTreeMap<String, FakeFile>,
    clock: i64,
    /// Page size used when the caller asks for the whole file.
    page_lines: usize,
    supports_tail: bool,
    list_failures: VecDeque<Failure>,
    stale_listings: VecDeque<Vec<RemoteFile>>,
    fetch_failures: VecDeque<Failure>,
    /// Failures keyed by the marker token of the fetch they hit.
    marker_failures: Vec<(String, Failure)>,
    calls: Vec<Call>,
}

impl FakeState {
    fn listing(&self) -> Vec<RemoteFile> {
        self.files
            .iter()
            .map(|(name, file)| {
                let size = file.records.iter().map(|r| r.len() as u64).sum();
                RemoteFile::new(name.clone(), file.last_written, size)
            })
            .collect()
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 60;
        Utc.timestamp_opt(1_704_067_200 + self.clock, 0).unwrap()
    }
}

/// Cheap to clone; all clones share state, so tests keep a handle after
/// moving one into the tracker.
#[derive(Debug, Clone)]
pub struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                files: BTreeMap::new(),
                clock: 0,
                page_lines: usize::MAX,
                supports_tail: true,
                list_failures: VecDeque::new(),
                stale_listings: VecDeque::new(),
                fetch_failures: VecDeque::new(),
                marker_failures: Vec::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Serve at most `n` lines per page when asked for the whole file.
    pub fn with_page_lines(self, n: usize) -> Self {
        self.state.lock().unwrap().page_lines = n.max(1);
        self
    }

    /// Behave like an API without a native "last N lines" mode.
    pub fn without_tail(self) -> Self {
        self.state.lock().unwrap().supports_tail = false;
        self
    }

    pub fn add_file(&self, name: &str, lines: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let last_written = state.tick();
        state.files.insert(
            name.to_string(),
            FakeFile {
                records: lines.iter().map(|l| format!("{l}\n")).collect(),
                last_written,
            },
        );
    }

    /// Alias for [`add_file`](Self::add_file) that reads better in rotation tests.
    pub fn rotate(&self, name: &str, lines: &[&str]) {
        self.add_file(name, lines);
    }

    pub fn append(&self, name: &str, lines: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let last_written = state.tick();
        let file = state.files.get_mut(name).expect("append to unknown file");
        file.records.extend(lines.iter().map(|l| format!("{l}\n")));
        file.last_written = last_written;
    }

    /// Append `text` exactly as given, newline or not.
    pub fn append_raw(&self, name: &str, text: &str) {
        let mut state = self.state.lock().unwrap();
        let last_written = state.tick();
        let file = state.files.get_mut(name).expect("append to unknown file");
        file.records.push(text.to_string());
        file.last_written = last_written;
    }

    pub fn remove(&self, name: &str) {
        self.state.lock().unwrap().files.remove(name);
    }

    pub fn fail_next_list(&self, failure: Failure) {
        self.state.lock().unwrap().list_failures.push_back(failure);
    }

    pub fn fail_next_fetch(&self, failure: Failure) {
        self.state.lock().unwrap().fetch_failures.push_back(failure);
    }

    /// Fail the first fetch that continues from marker `token`.
    pub fn fail_fetch_at(&self, token: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .marker_failures
            .push((token.to_string(), failure));
    }

    /// Serve today's listing once more on the next list call, whatever
    /// changes in between. Models a listing that lags behind rotation.
    pub fn serve_stale_listing(&self) {
        let mut state = self.state.lock().unwrap();
        let listing = state.listing();
        state.stale_listings.push_back(listing);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn fetches(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Fetch { .. })).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

fn injected(failure: Failure, subject: &str) -> SourceError {
    match failure {
        Failure::Unavailable => SourceError::Unavailable(format!("injected failure for {subject}")),
        Failure::RotatedAway => SourceError::RotatedAway(subject.to_string()),
        Failure::Protocol => SourceError::Protocol(format!("injected failure for {subject}")),
    }
}

#[async_trait]
impl LogSource for FakeSource {
    async fn list_files(&self, instance: &str) -> Result<Vec<RemoteFile>, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List);
        if let Some(failure) = state.list_failures.pop_front() {
            return Err(injected(failure, instance));
        }
        if let Some(stale) = state.stale_listings.pop_front() {
            return Ok(stale);
        }
        Ok(state.listing())
    }

    async fn fetch(
        &self,
        _instance: &str,
        file: &RemoteFile,
        position: Position,
        max_lines: u64,
    ) -> Result<RawChunk, SourceError> {
        let mut state = self.state.lock().unwrap();
        let position = position.scoped_to(file);
        state.calls.push(Call::Fetch {
            file: file.name.clone(),
            position: position.clone(),
            max_lines,
        });
        if let Some(failure) = state.fetch_failures.pop_front() {
            return Err(injected(failure, &file.name));
        }
        if let Position::After(marker) = &position {
            if let Some(i) = state.marker_failures.iter().position(|(t, _)| t == marker.token()) {
                let (_, failure) = state.marker_failures.remove(i);
                return Err(injected(failure, &file.name));
            }
        }

        let page_lines = state.page_lines;
        let Some(stored) = state.files.get(&file.name) else {
            return Err(SourceError::RotatedAway(file.name.clone()));
        };
        let len = stored.records.len();
        let limit = if max_lines == 0 { page_lines } else { max_lines as usize };

        let (from, to) = match &position {
            Position::Start => (0, len.min(limit)),
            Position::After(marker) => {
                let from = marker
                    .token()
                    .parse::<usize>()
                    .map_err(|_| SourceError::Protocol(format!("bad marker {}", marker.token())))?
                    .min(len);
                (from, len.min(from.saturating_add(limit)))
            }
            Position::Tail => (len.saturating_sub(if max_lines == 0 { len } else { limit }), len),
        };

        let data = stored.records[from..to].concat();
        Ok(RawChunk {
            data,
            marker: Marker::new(file.name.clone(), to.to_string()),
            end_of_file: to == len,
        })
    }

    fn supports_tail(&self) -> bool {
        self.state.lock().unwrap().supports_tail
    }
}
