//! Session State
//!
//! Everything one analysis session owns. Only the controller's driving loop
//! mutates it; the pure components read it and return values.

use std::collections::HashSet;

use super::diff::{Delta, SnapshotDiffEngine};
use super::metrics::{Metrics, MetricsAccumulator, MetricsUpdate};
use super::projector::{StageTransition, StatusProjector};
use super::report::FinalReport;
use super::snapshot::Snapshot;
use super::stage::{ActiveStages, StageBoard};
use crate::constants::fields;

/// Outcome of folding one snapshot into the session
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    pub delta: Delta,
    pub transitions: Vec<StageTransition>,
    pub metrics: MetricsUpdate,
}

#[derive(Debug)]
pub struct Session {
    active: ActiveStages,
    /// Latest snapshot received
    current: Snapshot,
    board: StageBoard,
    metrics: Metrics,
    seen_message_count: usize,
    ever_populated: HashSet<String>,
    counted_artifacts: HashSet<String>,
    report: FinalReport,
    snapshots: usize,
}

impl Session {
    pub fn new(active: ActiveStages) -> Self {
        let board = StageBoard::new(&active);
        Self {
            active,
            current: Snapshot::default(),
            board,
            metrics: Metrics::default(),
            seen_message_count: 0,
            ever_populated: HashSet::new(),
            counted_artifacts: HashSet::new(),
            report: FinalReport::default(),
            snapshots: 0,
        }
    }

    /// Fold a snapshot into the session and return what it changed.
    pub fn step(&mut self, snapshot: Snapshot) -> StepOutcome {
        let delta = SnapshotDiffEngine::diff(self.seen_message_count, &self.ever_populated, &snapshot);
        let transitions = StatusProjector::project(&delta, &self.board, &self.active);
        let metrics = MetricsAccumulator::apply(self.metrics, &self.counted_artifacts, &delta);

        StatusProjector::apply(&mut self.board, &transitions);
        self.metrics = metrics.metrics;
        self.counted_artifacts
            .extend(metrics.new_artifacts.iter().cloned());
        self.ever_populated
            .extend(delta.newly_populated.iter().cloned());
        self.seen_message_count = delta.message_count;
        self.report.absorb(&snapshot);
        self.current = snapshot;
        self.snapshots += 1;

        StepOutcome {
            delta,
            transitions,
            metrics,
        }
    }

    /// Whether the terminal decision field was ever populated
    pub fn has_decision(&self) -> bool {
        self.ever_populated.contains(fields::TERMINAL_DECISION)
    }

    /// Decision text from the reconciled report
    pub fn decision_text(&self) -> Option<String> {
        self.report.text(fields::TERMINAL_DECISION)
    }

    pub fn active(&self) -> &ActiveStages {
        &self.active
    }

    pub fn board(&self) -> &StageBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut StageBoard {
        &mut self.board
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn report(&self) -> &FinalReport {
        &self.report
    }

    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    pub fn seen_message_count(&self) -> usize {
        self.seen_message_count
    }

    pub fn snapshots(&self) -> usize {
        self.snapshots
    }
}
