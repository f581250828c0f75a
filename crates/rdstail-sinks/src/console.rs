//! Console sink: reassembled text straight to standard output.

use crate::{Sink, SinkError};
use async_trait::async_trait;
use rdstail_core::LogicalEntry;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};

/// Writes each entry's lines verbatim, one newline per line, no framing.
pub struct ConsoleSink<W: AsyncWrite + Unpin + Send = Stdout> {
    out: BufWriter<W>,
}

impl ConsoleSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: BufWriter::new(writer),
        }
    }

    /// Write raw text without touching line breaks.
    pub async fn write_raw(&mut self, text: &str) -> Result<(), SinkError> {
        self.out.write_all(text.as_bytes()).await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for ConsoleSink<W> {
    async fn send(&mut self, entry: &LogicalEntry) -> Result<(), SinkError> {
        for line in &entry.lines {
            self.out.write_all(line.as_bytes()).await?;
            self.out.write_all(b"\n").await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.out.flush().await?;
        Ok(())
    }
}
