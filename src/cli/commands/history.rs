//! History Commands
//!
//! Usage:
//!   tradepulse history [--user N] [--limit N] [--format text|json]
//!   tradepulse show ID [--format text|json]

use crate::cli::ui::Output;
use crate::cli::{CommandContext, Format};
use crate::storage::{AnalysisRecord, AnalysisStore};
use crate::types::Result;

/// List stored analyses, most recent first
pub fn list(ctx: &CommandContext, user: Option<i64>, limit: usize, format: &str) -> Result<()> {
    let format = Format::parse(format)?;
    let records = AnalysisStore::new(ctx.db.clone()).list_records(user, limit)?;

    match format {
        Format::Json => println!("{}", records_json(&records)?),
        Format::Text => {
            let output = Output::new();
            if records.is_empty() {
                output.info("No analyses recorded yet");
                return Ok(());
            }
            output.header(&format!("Analysis History ({})", records.len()));
            for record in &records {
                output.record_row(record);
            }
        }
    }
    Ok(())
}

/// Show one stored analysis with its report
pub fn show(ctx: &CommandContext, id: i64, format: &str) -> Result<()> {
    let format = Format::parse(format)?;
    let record = AnalysisStore::new(ctx.db.clone()).get_record(id)?;

    match format {
        Format::Json => println!("{}", record_json(&record)?),
        Format::Text => Output::new().record_detail(&record),
    }
    Ok(())
}

fn records_json(records: &[AnalysisRecord]) -> Result<String> {
    let items: Vec<serde_json::Value> = records.iter().map(record_value).collect();
    Ok(serde_json::to_string_pretty(&items)?)
}

fn record_json(record: &AnalysisRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(&record_value(record))?)
}

/// Record with its report embedded as JSON rather than as a string
fn record_value(record: &AnalysisRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "userId": record.user_id,
        "ticker": record.ticker,
        "date": record.date,
        "decision": record.decision,
        "metrics": record.metrics,
        "createdAt": record.created_at,
        "report": record.report_json(),
    })
}
