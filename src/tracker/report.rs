//! Final Report Assembly
//!
//! The reconciled report keeps the latest populated value of every top-level
//! field seen during the session (message history excluded), so a section the
//! producer later drops still reaches the persisted record. Debate states are
//! carried whole, judge decisions included.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::snapshot::{Snapshot, is_truthy};
use crate::constants::fields;

/// Accumulated fields keyed by top-level name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalReport {
    sections: BTreeMap<String, Value>,
}

impl FinalReport {
    /// Record every populated field of `snapshot`, replacing older values
    pub fn absorb(&mut self, snapshot: &Snapshot) {
        for (key, value) in snapshot.fields() {
            if key == fields::MESSAGES || !is_truthy(value) {
                continue;
            }
            self.sections.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.sections.get(key)
    }

    /// Section rendered as text (strings verbatim, other JSON serialized)
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn has_section(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.sections)
    }
}

/// Availability summary derived from the final report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityFlags {
    pub macro_news: bool,
    pub analyst_breakdown: bool,
    pub risk_assessment: bool,
    pub bullish_momentum: bool,
    pub inflow_up: bool,
}

impl AvailabilityFlags {
    pub fn from_report(report: &FinalReport) -> Self {
        Self {
            macro_news: report.has_section(fields::NEWS_REPORT),
            analyst_breakdown: report.has_section(fields::FUNDAMENTALS_REPORT),
            risk_assessment: report.has_section(fields::FINAL_TRADE_DECISION),
            bullish_momentum: report.has_section(fields::MARKET_REPORT),
            inflow_up: report.has_section(fields::SENTIMENT_REPORT),
        }
    }
}

static PROPOSAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)FINAL\s+TRANSACTION\s+PROPOSAL\s*:\s*\**\s*(BUY|SELL|HOLD)\b")
        .expect("valid proposal regex")
});

static SIGNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(BUY|SELL|HOLD)\b").expect("valid signal regex"));

/// Extract a BUY/SELL/HOLD signal from decision text.
///
/// An explicit "FINAL TRANSACTION PROPOSAL" wins; otherwise the last
/// standalone signal word is used.
pub fn extract_signal(text: &str) -> Option<&'static str> {
    let word = PROPOSAL_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .or_else(|| {
            SIGNAL_RE
                .captures_iter(text)
                .last()
                .and_then(|c| c.get(1))
        })?;

    match word.as_str().to_uppercase().as_str() {
        "BUY" => Some("BUY"),
        "SELL" => Some("SELL"),
        "HOLD" => Some("HOLD"),
        _ => None,
    }
}

/// Decision value persisted with the record
pub fn decision_label(text: &str) -> String {
    extract_signal(text)
        .map(str::to_string)
        .unwrap_or_else(|| text.trim().to_string())
}
