//! Snapshot Diff Engine
//!
//! Computes what a snapshot adds relative to everything the session has seen:
//! messages past the session's cut point and fields populated for the first
//! time in the session. The "ever populated" set is session-wide, so a field
//! that flickers empty and back is never reported twice.

use std::collections::{BTreeSet, HashSet};

use super::snapshot::{MessageUnit, Snapshot};

/// Newly observed portion of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Message units at or beyond the previous cut point, in order
    pub new_messages: Vec<MessageUnit>,
    /// Field keys populated for the first time in this session
    pub newly_populated: BTreeSet<String>,
    /// Cut point after this delta; never lower than the previous one
    pub message_count: usize,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.new_messages.is_empty() && self.newly_populated.is_empty()
    }

    pub fn populated(&self, key: &str) -> bool {
        self.newly_populated.contains(key)
    }
}

/// Stateless diff engine; session state is handed in by the caller
pub struct SnapshotDiffEngine;

impl SnapshotDiffEngine {
    pub fn diff(
        seen_message_count: usize,
        ever_populated: &HashSet<String>,
        snapshot: &Snapshot,
    ) -> Delta {
        let messages = snapshot.messages();
        let new_messages = messages
            .get(seen_message_count..)
            .unwrap_or(&[])
            .iter()
            .map(MessageUnit::from_value)
            .collect();

        let newly_populated = snapshot
            .populated_keys()
            .into_iter()
            .filter(|key| !ever_populated.contains(key))
            .collect();

        Delta {
            new_messages,
            newly_populated,
            message_count: seen_message_count.max(messages.len()),
        }
    }
}
