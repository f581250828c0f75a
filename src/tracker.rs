//! Marker tracker: which file to read next, and from where.
//!
//! [`MarkerTracker::advance`] is a pure step from one [`Cursor`] to the next:
//! it lists the instance's files, follows rotation, pages through the
//! current file and returns everything it read as ordered [`Step`]s plus the
//! cursor to commit. It never mutates the caller's cursor, so a failed
//! advance leaves the poll state exactly where it was and the next tick
//! re-reads from the same marker.
//!
//! # Rotation
//!
//! When the listing shows a file written strictly later than the one being
//! followed, the old file is first drained to its end, then a
//! [`Step::Rotated`] is emitted and the new file is read from its start. A
//! fetch that fails with [`SourceError::RotatedAway`] forces the same switch
//! after one re-list, and the read is retried once against the new file.
//! Pages read before such a failure are never thrown away: if the switch
//! cannot happen yet, they are returned with the marker that follows them.
//!
//! # Partial lines
//!
//! Only newline-terminated lines leave the tracker. Text after the last
//! newline stays in the cursor ([`Following::partial`]) until the rest of
//! the line arrives, or until the file is left behind by a rotation.

use rdstail_core::config::{PollConfig, SourceConfig};
use rdstail_core::{Marker, Position, RemoteFile, WHOLE_FILE};
use rdstail_source::{LogSource, SourceError};
use tracing::{debug, trace};

/// Where reading starts the first time a file is seen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Byte 0 of the current file.
    FromStart,
    /// Skip existing content except the last `backfill_lines` lines.
    Tail { backfill_lines: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub start: StartPosition,
    /// Lines per page; [`WHOLE_FILE`] leaves it to the API.
    pub page_lines: u64,
    pub max_pages_per_tick: u32,
}

impl TrackerConfig {
    pub fn from_config(source: &SourceConfig, poll: &PollConfig) -> Self {
        let start = if poll.from_start {
            StartPosition::FromStart
        } else {
            StartPosition::Tail {
                backfill_lines: poll.backfill_lines,
            }
        };
        Self {
            start,
            page_lines: source.page_lines,
            max_pages_per_tick: poll.max_pages_per_tick.max(1),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            start: StartPosition::Tail { backfill_lines: 0 },
            page_lines: WHOLE_FILE,
            max_pages_per_tick: 64,
        }
    }
}

/// The file being followed and the marker to continue from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Following {
    pub file: RemoteFile,
    pub marker: Marker,
    /// Bytes after the last newline read so far: the start of a line the
    /// next chunk of `file` completes.
    pub partial: String,
}

/// Pagination state. `None` until the first successful read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub following: Option<Following>,
}

impl Cursor {
    pub fn file(&self) -> Option<&RemoteFile> {
        self.following.as_ref().map(|f| &f.file)
    }
}

/// One ordered unit of tracker output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Lines read from `file`, in file order.
    Lines { file: String, lines: Vec<String> },
    /// Reading switched to `to`. `from` is `None` on first contact.
    Rotated { from: Option<String>, to: RemoteFile },
}

/// Result of one [`MarkerTracker::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub steps: Vec<Step>,
    pub cursor: Cursor,
    /// The current file had no more data pending.
    pub caught_up: bool,
}

impl Advance {
    fn new(steps: Vec<Step>, following: Following, caught_up: bool) -> Self {
        Self {
            steps,
            cursor: Cursor {
                following: Some(following),
            },
            caught_up,
        }
    }

    pub fn line_count(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Lines { lines, .. } => lines.len(),
                Step::Rotated { .. } => 0,
            })
            .sum()
    }
}

/// Outcome of paging through one file. `marker` and `partial` always
/// describe exactly the lines pushed, even when `result` is an error.
struct Read {
    marker: Option<Marker>,
    partial: String,
    end_of_file: bool,
    result: Result<(), SourceError>,
}

impl Read {
    /// Where the next read of `file` resumes. With no page fetched the
    /// file is read again from its start.
    fn resume(&mut self, file: RemoteFile) -> Following {
        let marker = self
            .marker
            .take()
            .unwrap_or_else(|| Marker::new(file.name.clone(), "0"));
        Following {
            file,
            marker,
            partial: std::mem::take(&mut self.partial),
        }
    }
}

/// Decides each cycle which file to read and from where.
pub struct MarkerTracker<S> {
    source: S,
    instance: String,
    config: TrackerConfig,
}

impl<S: LogSource> MarkerTracker<S> {
    pub fn new(source: S, instance: impl Into<String>, config: TrackerConfig) -> Self {
        Self {
            source,
            instance: instance.into(),
            config,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn latest(&self) -> Result<(Vec<RemoteFile>, RemoteFile), SourceError> {
        let files = self.source.list_files(&self.instance).await?;
        let latest = RemoteFile::latest(&files)
            .cloned()
            .ok_or_else(|| SourceError::NoLogFiles(self.instance.clone()))?;
        Ok((files, latest))
    }

    /// Compute the next cursor from `cursor`.
    pub async fn advance(&self, cursor: &Cursor) -> Result<Advance, SourceError> {
        let (files, latest) = self.latest().await?;
        let mut steps = Vec::new();
        let mut budget = self.config.max_pages_per_tick;

        let Some(following) = cursor.following.as_ref() else {
            return self.first_contact(latest, steps, budget).await;
        };

        // Listing metadata for the followed file is newer than what we hold.
        let current = files
            .iter()
            .find(|f| f.name == following.file.name)
            .cloned()
            .unwrap_or_else(|| following.file.clone());
        let position = Position::After(following.marker.clone());
        let partial = following.partial.clone();

        if !latest.supersedes(&current) {
            let mut read = self.read(&current, position, partial, &mut budget, &mut steps).await;
            return match std::mem::replace(&mut read.result, Ok(())) {
                Ok(()) => {
                    let caught_up = read.end_of_file;
                    Ok(Advance::new(steps, read.resume(current), caught_up))
                }
                Err(SourceError::RotatedAway(name)) => {
                    debug!(file = %name, "followed file rotated away; re-listing");
                    self.forced_rotation(read.resume(current), steps, budget).await
                }
                Err(e) => Err(e),
            };
        }

        // Drain what is left of the superseded file before switching.
        let mut drain = self.read(&current, position, partial, &mut budget, &mut steps).await;
        match std::mem::replace(&mut drain.result, Ok(())) {
            Ok(()) if !drain.end_of_file => {
                trace!(file = %current.name, "page budget spent draining superseded file");
                return Ok(Advance::new(steps, drain.resume(current), false));
            }
            Ok(()) => {}
            Err(SourceError::RotatedAway(name)) => {
                debug!(file = %name, "superseded file already gone; skipping drain");
            }
            Err(e) => return Err(e),
        }

        leave(&mut steps, drain.resume(current), &latest);
        self.read_new_file(latest, Position::Start, String::new(), steps, budget, true)
            .await
    }

    /// No file followed yet: apply the start policy to the current file.
    async fn first_contact(
        &self,
        latest: RemoteFile,
        mut steps: Vec<Step>,
        mut budget: u32,
    ) -> Result<Advance, SourceError> {
        steps.push(Step::Rotated {
            from: None,
            to: latest.clone(),
        });
        let (position, partial) = match self.config.start {
            StartPosition::FromStart => (Position::Start, String::new()),
            StartPosition::Tail { backfill_lines } => {
                match self.skip_to_tail(&latest, backfill_lines, &mut budget, &mut steps).await {
                    Ok(start) => start,
                    Err(SourceError::RotatedAway(name)) => {
                        debug!(file = %name, "file rotated away before first read; re-listing");
                        let (_, relisted) = self.latest().await?;
                        if relisted.name == latest.name {
                            return Err(SourceError::RotatedAway(name));
                        }
                        steps.clear();
                        steps.push(Step::Rotated {
                            from: None,
                            to: relisted.clone(),
                        });
                        let (position, partial) = self
                            .skip_to_tail(&relisted, backfill_lines, &mut budget, &mut steps)
                            .await?;
                        return self
                            .read_new_file(relisted, position, partial, steps, budget, false)
                            .await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };
        self.read_new_file(latest, position, partial, steps, budget, true).await
    }

    /// Position just past the existing content of `file`, emitting its last
    /// `backfill_lines` lines. Also returns any unterminated last line.
    async fn skip_to_tail(
        &self,
        file: &RemoteFile,
        backfill_lines: u64,
        budget: &mut u32,
        steps: &mut Vec<Step>,
    ) -> Result<(Position, String), SourceError> {
        if self.source.supports_tail() {
            let chunk = self
                .source
                .fetch(&self.instance, file, Position::Tail, backfill_lines.max(1))
                .await?;
            *budget = budget.saturating_sub(1);
            let mut partial = String::new();
            let lines = chunk.complete_lines(&mut partial);
            if backfill_lines > 0 {
                push_lines(steps, &file.name, lines);
            }
            return Ok((Position::After(chunk.marker), partial));
        }

        // No native tail: page through the whole file and keep the end.
        let mut skipped = Vec::new();
        let mut unlimited = u32::MAX;
        let read = self
            .read(file, Position::Start, String::new(), &mut unlimited, &mut skipped)
            .await;
        read.result?;
        let mut lines: Vec<String> = skipped
            .into_iter()
            .flat_map(|step| match step {
                Step::Lines { lines, .. } => lines,
                Step::Rotated { .. } => Vec::new(),
            })
            .collect();
        let keep = usize::try_from(backfill_lines).unwrap_or(usize::MAX).min(lines.len());
        let backfill = lines.split_off(lines.len() - keep);
        push_lines(steps, &file.name, backfill);

        let position = match read.marker {
            Some(marker) => Position::After(marker),
            None => Position::Start,
        };
        Ok((position, read.partial))
    }

    /// A fetch reported the followed file gone: switch to whatever the
    /// listing now says is current and read it from the start.
    ///
    /// When the switch cannot happen this tick (the listing still shows the
    /// gone file, or listing fails) the lines already in `steps` are still
    /// delivered and the cursor stays on `gone`. With nothing read the
    /// tick fails instead.
    async fn forced_rotation(
        &self,
        gone: Following,
        mut steps: Vec<Step>,
        mut budget: u32,
    ) -> Result<Advance, SourceError> {
        let relisted = match self.latest().await {
            Ok((_, latest)) if latest.name != gone.file.name => latest,
            // Listing has not caught up yet; try again next tick.
            Ok(_) => {
                let error = SourceError::RotatedAway(gone.file.name.clone());
                return keep_progress(steps, gone, error);
            }
            Err(e) => return keep_progress(steps, gone, e),
        };

        leave(&mut steps, gone, &relisted);
        let mut read = self
            .read(&relisted, Position::Start, String::new(), &mut budget, &mut steps)
            .await;
        let result = std::mem::replace(&mut read.result, Ok(()));
        let caught_up = read.end_of_file;
        let resume = read.resume(relisted);
        match result {
            Ok(()) => Ok(Advance::new(steps, resume, caught_up)),
            Err(e) => keep_progress(steps, resume, e),
        }
    }

    /// Read a file we just switched to. With `may_rotate`, a `RotatedAway`
    /// gets one forced rotation; otherwise it is returned.
    async fn read_new_file(
        &self,
        file: RemoteFile,
        position: Position,
        partial: String,
        mut steps: Vec<Step>,
        mut budget: u32,
        may_rotate: bool,
    ) -> Result<Advance, SourceError> {
        let mut read = self.read(&file, position, partial, &mut budget, &mut steps).await;
        let result = std::mem::replace(&mut read.result, Ok(()));
        let caught_up = read.end_of_file;
        let resume = read.resume(file);
        match result {
            Ok(()) => Ok(Advance::new(steps, resume, caught_up)),
            Err(SourceError::RotatedAway(name)) if may_rotate => {
                debug!(file = %name, "new file rotated away before first read; re-listing");
                self.forced_rotation(resume, steps, budget).await
            }
            Err(e) => keep_progress(steps, resume, e),
        }
    }

    /// Page through `file` from `position` until it reports end of file or
    /// the budget runs out. `partial` is the unterminated line carried from
    /// the previous read of the same file. Lines fetched before a failure
    /// are kept in `steps`.
    async fn read(
        &self,
        file: &RemoteFile,
        mut position: Position,
        mut partial: String,
        budget: &mut u32,
        steps: &mut Vec<Step>,
    ) -> Read {
        let mut lines = Vec::new();
        let mut marker = match &position {
            Position::After(m) => Some(m.clone()),
            Position::Start | Position::Tail => None,
        };
        let mut end_of_file = false;

        let result = loop {
            if *budget == 0 {
                break Ok(());
            }
            let chunk = match self
                .source
                .fetch(&self.instance, file, position.clone(), self.config.page_lines)
                .await
            {
                Ok(chunk) => chunk,
                Err(e) => break Err(e),
            };
            *budget -= 1;

            lines.extend(chunk.complete_lines(&mut partial));
            end_of_file = chunk.end_of_file;

            // An empty final page leaves the marker where it was.
            let next = match (&position, chunk.is_empty() && chunk.end_of_file) {
                (Position::After(previous), true) => previous.clone(),
                _ => chunk.marker,
            };
            position = Position::After(next.clone());
            marker = Some(next);

            if end_of_file {
                break Ok(());
            }
        };

        trace!(file = %file.name, lines = lines.len(), end_of_file, "read log file pages");
        push_lines(steps, &file.name, lines);
        Read {
            marker,
            partial,
            end_of_file,
            result,
        }
    }
}

/// Close out `old` and switch to `to`. Nothing more will be appended to a
/// superseded file, so an unterminated last line is complete as it is.
fn leave(steps: &mut Vec<Step>, old: Following, to: &RemoteFile) {
    if !old.partial.is_empty() {
        push_lines(steps, &old.file.name, vec![old.partial]);
    }
    steps.push(Step::Rotated {
        from: Some(old.file.name),
        to: to.clone(),
    });
}

/// A tick that failed after reading some lines still hands them over,
/// resuming next tick from `resume`. A tick that read nothing fails.
fn keep_progress(steps: Vec<Step>, resume: Following, error: SourceError) -> Result<Advance, SourceError> {
    if !steps.iter().any(|step| matches!(step, Step::Lines { .. })) {
        return Err(error);
    }
    debug!(file = %resume.file.name, %error, "keeping lines read before the failure");
    Ok(Advance::new(steps, resume, false))
}

fn push_lines(steps: &mut Vec<Step>, file: &str, lines: Vec<String>) {
    if !lines.is_empty() {
        steps.push(Step::Lines {
            file: file.to_string(),
            lines,
        });
    }
}
