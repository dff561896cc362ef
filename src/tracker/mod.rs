//! Progress Tracker
//!
//! Turns the cumulative snapshots of a multi-agent trading pipeline into an
//! ordered stream of incremental events.
//!
//! ## Flow
//!
//! ```text
//! SnapshotSource ──▶ SnapshotDiffEngine ──▶ Delta
//!                                             │
//!                      ┌──────────────────────┼───────────────────┐
//!                      ▼                      ▼                   ▼
//!               StatusProjector      MetricsAccumulator      FinalReport
//!                      │                      │                   │
//!                      └──────────▶ SessionController ◀───────────┘
//!                                     │            │
//!                                 EventSink     Finalizer
//! ```
//!
//! The diff engine, projector and accumulator are pure. All mutable state lives
//! in one [`Session`] owned by the controller's loop.

pub mod controller;
pub mod diff;
pub mod events;
pub mod metrics;
pub mod projector;
pub mod report;
pub mod session;
pub mod sink;
pub mod snapshot;
pub mod stage;

pub use controller::{
    AnalysisRequest, FinalizeRequest, Finalizer, SessionController, SessionOutcome, SessionState,
};
pub use diff::{Delta, SnapshotDiffEngine};
pub use events::{SessionEvent, StageSummary};
pub use metrics::{Metrics, MetricsAccumulator, MetricsUpdate};
pub use projector::{ACTIVATION_RULES, ActivationRule, StageTransition, StatusProjector};
pub use report::{AvailabilityFlags, FinalReport, decision_label, extract_signal};
pub use session::{Session, StepOutcome};
pub use sink::{ChannelSink, EventSink};
pub use snapshot::{MessageUnit, Snapshot};
pub use stage::{ActiveStages, Analyst, StageBoard, StageGroup, StageId, StageRegistry, StageStatus};
