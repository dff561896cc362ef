use console::{Term, style};

use crate::storage::AnalysisRecord;
use crate::tracker::{SessionOutcome, StageStatus};

/// Styled terminal output.
///
/// `analyze` writes its event stream to stdout, so its human-readable lines
/// go through [`Output::stderr`].
pub struct Output {
    term: Term,
}

impl Output {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    pub fn stderr() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    fn line(&self, text: String) {
        let _ = self.term.write_line(&text);
    }

    pub fn success(&self, message: &str) {
        self.line(format!("{} {}", style("✓").green(), message));
    }

    pub fn error(&self, message: &str) {
        self.line(format!("{} {}", style("✗").red(), message));
    }

    pub fn warning(&self, message: &str) {
        self.line(format!("{} {}", style("⚠").yellow(), message));
    }

    pub fn info(&self, message: &str) {
        self.line(format!("{} {}", style("ℹ").blue(), message));
    }

    pub fn header(&self, message: &str) {
        self.line(String::new());
        self.line(style(message).bold().underlined().to_string());
    }

    pub fn section(&self, message: &str) {
        self.line(String::new());
        self.line(style(message).bold().to_string());
        self.line("─".repeat(40));
    }

    pub fn field(&self, key: &str, value: &str) {
        self.line(format!("  {:<12} {}", style(key).dim(), value));
    }

    /// One history row
    pub fn record_row(&self, record: &AnalysisRecord) {
        self.line(format!(
            "{:>6}  {:<8} {:<10} {:<6} {}",
            style(record.id).cyan(),
            record.ticker,
            record.date,
            decision_style(&record.decision),
            style(&record.created_at).dim()
        ));
    }

    /// Full record with its report sections
    pub fn record_detail(&self, record: &AnalysisRecord) {
        self.header(&format!("Analysis #{}: {} on {}", record.id, record.ticker, record.date));
        self.field("Decision", &decision_style(&record.decision));
        self.field("User", &record.user_id.to_string());
        self.field("Created", &record.created_at);
        self.field("Usage", &record.metrics.to_string());

        if let serde_json::Value::Object(sections) = record.report_json() {
            for (name, value) in sections {
                self.section(&name);
                match value {
                    serde_json::Value::String(text) => self.line(text),
                    other => self.line(other.to_string()),
                }
            }
        }
    }

    /// Closing summary of an analysis run
    pub fn outcome(&self, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Completed {
                record_id,
                decision,
                metrics,
            } => {
                self.success(&format!(
                    "Analysis complete: {} (record #{})",
                    decision_style(decision),
                    record_id
                ));
                self.field("Usage", &metrics.to_string());
            }
            SessionOutcome::Failed { kind, detail } => {
                self.error(&format!("Analysis failed [{}]: {}", kind, detail));
            }
        }
    }

    pub fn stage(&self, agent: &str, status: StageStatus) {
        let marker = match status {
            StageStatus::Pending => style("·").dim(),
            StageStatus::InProgress => style("▶").yellow(),
            StageStatus::Completed => style("✓").green(),
        };
        self.line(format!("{} {}", marker, agent));
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

fn decision_style(decision: &str) -> String {
    match decision {
        "BUY" => style(decision).green().bold().to_string(),
        "SELL" => style(decision).red().bold().to_string(),
        "HOLD" => style(decision).yellow().bold().to_string(),
        other => other.to_string(),
    }
}
