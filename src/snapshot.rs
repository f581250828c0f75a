//! One-shot view of the current log file.
//!
//! Output is the raw text the API returned. No poll state is kept and no
//! reassembly happens.

use crate::error::TailError;
use rdstail_core::{Position, RemoteFile, WHOLE_FILE};
use rdstail_sinks::{ConsoleSink, Sink};
use rdstail_source::{LogSource, SourceError};
use tokio::io::AsyncWrite;
use tracing::{debug, info};

/// What a snapshot printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub file: String,
    pub bytes: usize,
}

/// Print the last `lines` lines of the instance's current file, or all of
/// it when `lines` is 0.
pub async fn snapshot<S, W>(
    source: &S,
    instance: &str,
    lines: u64,
    out: &mut ConsoleSink<W>,
) -> Result<SnapshotSummary, TailError>
where
    S: LogSource + ?Sized,
    W: AsyncWrite + Unpin + Send,
{
    let file = current_file(source, instance).await?;
    let text = match read(source, instance, &file, lines).await {
        Err(SourceError::RotatedAway(name)) => {
            debug!(file = %name, "file rotated during snapshot; re-listing");
            let file = current_file(source, instance).await?;
            let text = read(source, instance, &file, lines).await?;
            return finish(file, text, out).await;
        }
        other => other?,
    };
    finish(file, text, out).await
}

async fn finish<W: AsyncWrite + Unpin + Send>(
    file: RemoteFile,
    text: String,
    out: &mut ConsoleSink<W>,
) -> Result<SnapshotSummary, TailError> {
    out.write_raw(&text).await?;
    out.close().await?;
    info!(file = %file.name, bytes = text.len(), "snapshot written");
    Ok(SnapshotSummary {
        file: file.name,
        bytes: text.len(),
    })
}

async fn current_file<S: LogSource + ?Sized>(source: &S, instance: &str) -> Result<RemoteFile, SourceError> {
    let files = source.list_files(instance).await?;
    RemoteFile::latest(&files)
        .cloned()
        .ok_or_else(|| SourceError::NoLogFiles(instance.to_string()))
}

async fn read<S: LogSource + ?Sized>(
    source: &S,
    instance: &str,
    file: &RemoteFile,
    lines: u64,
) -> Result<String, SourceError> {
    if lines > 0 && source.supports_tail() {
        return Ok(source.fetch(instance, file, Position::Tail, lines).await?.data);
    }

    let whole = read_whole(source, instance, file).await?;
    Ok(if lines == 0 {
        whole
    } else {
        last_lines(&whole, lines).to_string()
    })
}

/// Page through the whole file. A source may hand back a large file in
/// several pieces even when asked for all of it.
async fn read_whole<S: LogSource + ?Sized>(
    source: &S,
    instance: &str,
    file: &RemoteFile,
) -> Result<String, SourceError> {
    let mut text = String::new();
    let mut position = Position::Start;
    loop {
        let chunk = source.fetch(instance, file, position, WHOLE_FILE).await?;
        text.push_str(&chunk.data);
        if chunk.end_of_file || chunk.data.is_empty() {
            return Ok(text);
        }
        position = Position::After(chunk.marker);
    }
}

/// The suffix of `text` holding its last `n` lines, byte for byte. A
/// trailing newline ends the final line rather than starting an empty one.
pub fn last_lines(text: &str, n: u64) -> &str {
    if n == 0 {
        return "";
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    let mut remaining = n;
    for (i, byte) in body.bytes().enumerate().rev() {
        if byte == b'\n' {
            remaining -= 1;
            if remaining == 0 {
                return &text[i + 1..];
            }
        }
    }
    text
}
