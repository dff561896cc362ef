//! Snapshot Producers
//!
//! A producer yields the cumulative state of the analysis pipeline, one full
//! snapshot at a time. The tracker pulls from it through [`SnapshotSource`].
//!
//! ## Sources
//!
//! - [`JsonlSnapshotSource`]: one JSON object per line from any async reader
//! - [`CommandSnapshotSource`]: spawns the pipeline executable and reads its stdout
//! - [`VecSnapshotSource`]: in-memory snapshots, used for replays and tests

mod command;
mod jsonl;

pub use command::CommandSnapshotSource;
pub use jsonl::JsonlSnapshotSource;

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::tracker::Snapshot;
use crate::types::Result;

/// Pull-based snapshot stream
#[async_trait]
pub trait SnapshotSource: Send {
    /// Next snapshot, `Ok(None)` at a clean end of stream.
    async fn next_snapshot(&mut self) -> Result<Option<Snapshot>>;
}

/// Pre-recorded snapshots
#[derive(Debug, Default)]
pub struct VecSnapshotSource {
    snapshots: VecDeque<Snapshot>,
}

impl VecSnapshotSource {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            snapshots: snapshots.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.snapshots.len()
    }
}

#[async_trait]
impl SnapshotSource for VecSnapshotSource {
    async fn next_snapshot(&mut self) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.pop_front())
    }
}
