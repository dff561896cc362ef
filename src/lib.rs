//! TradePulse - Progress Tracking for Multi-Agent Trading Analyses
//!
//! Turns the cumulative state snapshots of a multi-agent trading pipeline into
//! an ordered stream of incremental events, and persists each finished
//! analysis for later review.
//!
//! ## Core Features
//!
//! - **Snapshot Diffing**: new messages and newly populated report fields per step
//! - **Stage Lifecycle**: monotonic pending → in_progress → completed per agent
//! - **Usage Metrics**: tool calls, model calls and produced artifacts
//! - **Persistence**: SQLite history with connection pooling and migrations
//!
//! ## Quick Start
//!
//! ```ignore
//! use tradepulse::{AnalysisRequest, AnalysisStore, ChannelSink, Database, SessionController};
//! use tradepulse::producer::CommandSnapshotSource;
//!
//! let db = Arc::new(Database::open(".tradepulse/analysis.db")?);
//! db.initialize()?;
//! let controller = SessionController::new(request.clone(), Arc::new(AnalysisStore::new(db)))?;
//! let mut source = CommandSnapshotSource::spawn(&config.producer, &request)?;
//! let (mut sink, mut events) = ChannelSink::channel(64);
//! let outcome = controller.run(&mut source, &mut sink).await;
//! ```
//!
//! ## Modules
//!
//! - [`tracker`]: diffing, stage projection, metrics and the session controller
//! - [`producer`]: snapshot sources (pipeline subprocess, JSON lines)
//! - [`storage`]: SQLite persistence and legacy import
//! - [`config`]: layered configuration

pub mod cli;
pub mod config;
pub mod constants;
pub mod producer;
pub mod storage;
pub mod tracker;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, ProducerConfig};

// Error Types
pub use types::{PulseError, Result, ResultExt, SessionErrorKind};

// Storage
pub use storage::{AnalysisRecord, AnalysisStore, Database, LegacyImporter, PoolConfig, SharedDatabase};

// =============================================================================
// Tracker Re-exports
// =============================================================================

pub use tracker::{
    AnalysisRequest, ChannelSink, EventSink, Finalizer, Metrics, SessionController, SessionEvent,
    SessionOutcome, SessionState, Snapshot, StageId, StageStatus,
};

pub use producer::{CommandSnapshotSource, JsonlSnapshotSource, SnapshotSource};
