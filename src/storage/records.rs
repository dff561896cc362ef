//! Analysis Record Store
//!
//! Persists finalized sessions and serves them back for history views.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use super::database::SharedDatabase;
use crate::tracker::{FinalizeRequest, Finalizer, Metrics};
use crate::types::{PulseError, Result, ResultExt, log_filter_error};

/// Stored analysis row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub user_id: i64,
    pub ticker: String,
    pub date: String,
    pub decision: String,
    /// Report sections as stored (JSON object text)
    pub full_report: String,
    pub metrics: Metrics,
    pub created_at: String,
}

impl AnalysisRecord {
    /// Parsed report, or `Null` if the stored text is not valid JSON
    pub fn report_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.full_report).unwrap_or(serde_json::Value::Null)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            ticker: row.get(2)?,
            date: row.get(3)?,
            decision: row.get(4)?,
            full_report: row.get(5)?,
            metrics: Metrics {
                tool_calls: row.get::<_, i64>(6)?.max(0) as u64,
                model_calls: row.get::<_, i64>(7)?.max(0) as u64,
                artifacts_produced: row.get::<_, i64>(8)?.max(0) as u64,
            },
            created_at: row.get(9)?,
        })
    }
}

const RECORD_COLUMNS: &str = "id, user_id, ticker, date, decision, full_report, \
                              tool_calls, model_calls, artifacts_produced, created_at";

#[derive(Clone)]
pub struct AnalysisStore {
    db: SharedDatabase,
}

impl AnalysisStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Insert one finalized analysis inside a single transaction.
    pub fn insert(&self, request: &FinalizeRequest) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let id = self.db.transaction(|conn| {
            conn.execute(
                "INSERT INTO analysis_records
                 (user_id, ticker, date, decision, full_report,
                  tool_calls, model_calls, artifacts_produced, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    request.owner,
                    request.ticker,
                    request.date,
                    request.decision,
                    request.full_report,
                    clamp_i64(request.metrics.tool_calls),
                    clamp_i64(request.metrics.model_calls),
                    clamp_i64(request.metrics.artifacts_produced),
                    now,
                ],
            )
            .with_context("Failed to insert analysis record")?;
            Ok(conn.last_insert_rowid())
        })?;

        info!(id, ticker = %request.ticker, owner = request.owner, "Analysis record stored");
        Ok(id)
    }

    /// Most recent records first, optionally restricted to one user
    pub fn list_records(&self, user_id: Option<i64>, limit: usize) -> Result<Vec<AnalysisRecord>> {
        let conn = self.db.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM analysis_records
                 WHERE (?1 IS NULL OR user_id = ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
                RECORD_COLUMNS
            ))
            .with_context("Failed to prepare history query")?;

        let records: Vec<AnalysisRecord> = stmt
            .query_map(params![user_id, clamp_i64(limit as u64)], AnalysisRecord::from_row)
            .with_context("Failed to query history")?
            .filter_map(|r| log_filter_error(r, "reading analysis record"))
            .collect();

        debug!(count = records.len(), ?user_id, "Loaded analysis history");
        Ok(records)
    }

    pub fn get_record(&self, id: i64) -> Result<AnalysisRecord> {
        let conn = self.db.connection()?;
        conn.query_row(
            &format!("SELECT {} FROM analysis_records WHERE id = ?1", RECORD_COLUMNS),
            [id],
            AnalysisRecord::from_row,
        )
        .optional()
        .with_context_fn(|| format!("Failed to load analysis record {}", id))?
        .ok_or(PulseError::RecordNotFound { id })
    }

    pub fn count_records(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .connection()?
            .query_row("SELECT COUNT(*) FROM analysis_records", [], |row| row.get(0))
            .with_context("Failed to count analysis records")?;
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl Finalizer for AnalysisStore {
    async fn finalize(&self, request: FinalizeRequest) -> Result<i64> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.insert(&request))
            .await
            .map_err(|e| PulseError::persistence(format!("finalize task failed: {}", e)))?
            .map_err(PulseError::into_persistence)
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
