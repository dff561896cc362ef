//! JSON Lines snapshot reader

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::trace;

use super::SnapshotSource;
use crate::tracker::Snapshot;
use crate::types::{PulseError, Result};

/// Reads one snapshot per line. Blank lines are skipped; a line that is not a
/// JSON object fails the stream.
pub struct JsonlSnapshotSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: AsyncBufRead + Unpin + Send> JsonlSnapshotSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// Lines consumed so far, blank ones included
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SnapshotSource for JsonlSnapshotSource<R> {
    async fn next_snapshot(&mut self) -> Result<Option<Snapshot>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| PulseError::producer(format!("read failed: {}", e)))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            let value: serde_json::Value = serde_json::from_str(&line).map_err(|e| {
                PulseError::producer(format!("line {}: malformed snapshot: {}", self.line_no, e))
            })?;
            trace!(line = self.line_no, "Snapshot line parsed");
            return Snapshot::from_value(value).map(Some);
        }
    }
}
