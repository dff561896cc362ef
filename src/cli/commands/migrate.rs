//! Migrate Command
//!
//! Import legacy JSON result files into `analysis_results`.

use std::path::PathBuf;

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::constants::storage::LEGACY_RESULTS_DIR;
use crate::storage::{ImportSummary, LegacyImporter};
use crate::types::Result;

pub fn run(ctx: &CommandContext, dir: Option<PathBuf>) -> Result<ImportSummary> {
    let dir = dir.unwrap_or_else(|| PathBuf::from(LEGACY_RESULTS_DIR));
    let summary = LegacyImporter::new(ctx.db.clone()).import_dir(&dir)?;

    let output = Output::new();
    output.success(&format!(
        "Imported {} result file(s) from {}",
        summary.imported,
        dir.display()
    ));
    for skipped in &summary.skipped {
        output.warning(&format!("Skipped {}: {}", skipped.path.display(), skipped.reason));
    }
    Ok(summary)
}
