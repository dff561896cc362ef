//! Legacy Result Import
//!
//! Loads the JSON result files written by earlier releases into the
//! `analysis_results` table. Unreadable files and files with an invalid
//! timestamp are logged and skipped; the rest are inserted one by one.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::database::SharedDatabase;
use crate::constants::storage::MIGRATED_STATUS;
use crate::types::{PulseError, Result, ResultExt};

/// On-disk shape of a legacy result file
#[derive(Debug, Deserialize)]
struct LegacyResult {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    report: Option<Value>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    user: Option<i64>,
}

/// Why a file was not imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: Vec<SkippedFile>,
}

impl ImportSummary {
    fn skip(&mut self, path: &Path, reason: String) {
        self.skipped.push(SkippedFile {
            path: path.to_path_buf(),
            reason,
        });
    }
}

pub struct LegacyImporter {
    db: SharedDatabase,
}

impl LegacyImporter {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Import every `*.json` file directly inside `dir`, in name order.
    pub fn import_dir(&self, dir: &Path) -> Result<ImportSummary> {
        if !dir.is_dir() {
            return Err(PulseError::Storage(format!(
                "Legacy results directory not found: {}",
                dir.display()
            )));
        }

        let pattern = dir.join("*.json");
        let pattern = pattern.to_string_lossy();
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| PulseError::Storage(format!("Invalid glob pattern {}: {}", pattern, e)))?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .collect();
        paths.sort();

        let mut summary = ImportSummary::default();
        for path in paths {
            match self.import_file(&path) {
                Ok(()) => summary.imported += 1,
                Err(e) => {
                    error!("Skipping {}: {}", path.display(), e);
                    summary.skip(&path, e.to_string());
                }
            }
        }

        info!(
            imported = summary.imported,
            skipped = summary.skipped.len(),
            "Legacy import finished"
        );
        Ok(summary)
    }

    fn import_file(&self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context_fn(|| format!("Failed to read {}", path.display()))?;
        let payload: LegacyResult = serde_json::from_str(&text)
            .with_context_fn(|| format!("Failed to parse {}", path.display()))?;

        let created_at = payload
            .timestamp
            .as_ref()
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .ok_or_else(|| {
                PulseError::Storage(format!(
                    "Invalid timestamp: {}",
                    payload.timestamp.as_ref().map_or("missing".to_string(), Value::to_string)
                ))
            })?;

        let report = payload.report.unwrap_or_else(|| Value::Object(Default::default()));
        let report_json = serde_json::to_string(&report)?;

        self.db
            .connection()?
            .execute(
                "INSERT INTO analysis_results
                 (user_id, query_text, result_summary, full_report_json, status, source_file, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    payload.user,
                    payload.query.unwrap_or_default(),
                    payload.summary.unwrap_or_default(),
                    report_json,
                    MIGRATED_STATUS,
                    path.file_name().map(|n| n.to_string_lossy().into_owned()),
                    created_at.to_rfc3339(),
                ],
            )
            .with_context("Failed to insert legacy result")?;
        Ok(())
    }
}

/// Accept RFC 3339 and the offset-less ISO-8601 forms (assumed UTC)
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
