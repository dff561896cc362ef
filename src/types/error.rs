//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Session failures are classified into a small, closed taxonomy so that the
//! transport `error` event can carry a stable machine-readable kind.
//!
//! ## Session Error Kinds
//!
//! - **InvalidConfiguration**: unknown or empty analyst selection (rejected before start)
//! - **ProducerFailure**: the snapshot producer raised an error
//! - **IncompleteAnalysis**: the stream ended without a final decision
//! - **PersistenceFailure**: the finalize call failed
//! - **TransportClosed**: the event consumer went away mid-session
//!
//! All kinds are terminal for a session. Nothing is retried internally.

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Session Error Kinds
// =============================================================================

/// Stable classification of session-terminating failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionErrorKind {
    InvalidConfiguration,
    ProducerFailure,
    IncompleteAnalysis,
    PersistenceFailure,
    TransportClosed,
}

impl std::fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfiguration => write!(f, "INVALID_CONFIGURATION"),
            Self::ProducerFailure => write!(f, "PRODUCER_FAILURE"),
            Self::IncompleteAnalysis => write!(f, "INCOMPLETE_ANALYSIS"),
            Self::PersistenceFailure => write!(f, "PERSISTENCE_FAILURE"),
            Self::TransportClosed => write!(f, "TRANSPORT_CLOSED"),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum PulseError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Producer failure: {0}")]
    ProducerFailure(String),

    #[error("Incomplete analysis: stream ended without '{missing_field}' after {snapshots} snapshots")]
    IncompleteAnalysis {
        missing_field: String,
        snapshots: usize,
    },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Transport closed by consumer")]
    TransportClosed,

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record {id} not found")]
    RecordNotFound { id: i64 },
}

impl From<anyhow::Error> for PulseError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return PulseError::Io(std::io::Error::new(io_err.kind(), io_err.to_string()));
        }

        PulseError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl PulseError {
    /// Create a producer failure from any displayable cause
    pub fn producer(message: impl Into<String>) -> Self {
        Self::ProducerFailure(message.into())
    }

    /// Create a persistence failure from any displayable cause
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceFailure(message.into())
    }

    /// Session-level classification, if this error terminates a session
    pub fn kind(&self) -> Option<SessionErrorKind> {
        match self {
            Self::InvalidConfiguration(_) => Some(SessionErrorKind::InvalidConfiguration),
            Self::ProducerFailure(_) => Some(SessionErrorKind::ProducerFailure),
            Self::IncompleteAnalysis { .. } => Some(SessionErrorKind::IncompleteAnalysis),
            Self::PersistenceFailure(_) => Some(SessionErrorKind::PersistenceFailure),
            Self::TransportClosed => Some(SessionErrorKind::TransportClosed),
            _ => None,
        }
    }

    /// Re-classify an arbitrary error raised by the persistence collaborator.
    pub fn into_persistence(self) -> Self {
        match self {
            Self::PersistenceFailure(_) => self,
            other => Self::PersistenceFailure(other.to_string()),
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| PulseError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| PulseError::Storage(format!("{}: {}", f().into(), e)))
    }
}

/// Log and drop a failed row while iterating query results.
pub fn log_filter_error<T, E: std::fmt::Display>(
    result: std::result::Result<T, E>,
    context: &str,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("Error {}: {}", context, e);
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
