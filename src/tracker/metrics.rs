//! Usage Metrics Accumulation
//!
//! Running counts of model calls, tool calls and artifacts for one session,
//! updated from each delta only. History is never rescanned.
//!
//! ## Rules
//!
//! - `modelCalls` grows by one per new message unit
//! - `toolCalls` grows by the tool-call count embedded in each new unit
//! - `artifactsProduced` grows by one the first time each report key is populated

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::diff::Delta;
use crate::constants::fields::REPORT_KEYS;

/// Cumulative usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub tool_calls: u64,
    pub model_calls: u64,
    pub artifacts_produced: u64,
}

impl Metrics {
    /// True when no counter is below the one in `earlier`
    pub fn dominates(&self, earlier: &Metrics) -> bool {
        self.tool_calls >= earlier.tool_calls
            && self.model_calls >= earlier.model_calls
            && self.artifacts_produced >= earlier.artifacts_produced
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "model calls: {}, tool calls: {}, artifacts: {}",
            self.model_calls, self.tool_calls, self.artifacts_produced
        )
    }
}

/// Result of applying one delta
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsUpdate {
    /// Totals after the whole delta
    pub metrics: Metrics,
    /// Running totals after each new message unit, in order
    pub per_message: Vec<Metrics>,
    /// Report keys counted as artifacts for the first time
    pub new_artifacts: Vec<String>,
}

pub struct MetricsAccumulator;

impl MetricsAccumulator {
    /// Fold a delta into `prior`.
    ///
    /// Artifacts of the delta are counted first so every per-message total
    /// already reflects them.
    pub fn apply(prior: Metrics, counted_artifacts: &HashSet<String>, delta: &Delta) -> MetricsUpdate {
        let mut metrics = prior;

        let new_artifacts: Vec<String> = REPORT_KEYS
            .iter()
            .filter(|key| delta.populated(key) && !counted_artifacts.contains(**key))
            .map(|key| key.to_string())
            .collect();
        metrics.artifacts_produced = metrics
            .artifacts_produced
            .saturating_add(new_artifacts.len() as u64);

        let per_message = delta
            .new_messages
            .iter()
            .map(|unit| {
                metrics.model_calls = metrics.model_calls.saturating_add(1);
                metrics.tool_calls = metrics.tool_calls.saturating_add(unit.tool_calls);
                metrics
            })
            .collect();

        MetricsUpdate {
            metrics,
            per_message,
            new_artifacts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::snapshot::MessageUnit;

    fn unit(tool_calls: u64) -> MessageUnit {
        MessageUnit {
            content: "msg".to_string(),
            kind: None,
            tool_calls,
        }
    }

    #[test]
    fn test_two_messages_second_with_tools() {
        let delta = Delta {
            new_messages: vec![unit(0), unit(2)],
            ..Delta::default()
        };
        let update = MetricsAccumulator::apply(Metrics::default(), &HashSet::new(), &delta);
        assert_eq!(update.metrics.model_calls, 2);
        assert_eq!(update.metrics.tool_calls, 2);
        assert_eq!(update.per_message.len(), 2);
        assert_eq!(update.per_message[0].tool_calls, 0);
        assert_eq!(update.per_message[1], update.metrics);
    }

    #[test]
    fn test_artifacts_counted_once() {
        let delta = Delta {
            newly_populated: ["market_report".to_string(), "investment_debate_state".to_string()]
                .into_iter()
                .collect(),
            ..Delta::default()
        };
        let first = MetricsAccumulator::apply(Metrics::default(), &HashSet::new(), &delta);
        assert_eq!(first.metrics.artifacts_produced, 1);
        assert_eq!(first.new_artifacts, vec!["market_report".to_string()]);

        let counted: HashSet<String> = first.new_artifacts.iter().cloned().collect();
        let second = MetricsAccumulator::apply(first.metrics, &counted, &delta);
        assert_eq!(second.metrics.artifacts_produced, 1);
        assert!(second.new_artifacts.is_empty());
    }

    #[test]
    fn test_empty_delta_is_identity() {
        let prior = Metrics {
            tool_calls: 3,
            model_calls: 5,
            artifacts_produced: 2,
        };
        let update = MetricsAccumulator::apply(prior, &HashSet::new(), &Delta::default());
        assert_eq!(update.metrics, prior);
        assert!(update.per_message.is_empty());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(Metrics {
            tool_calls: 1,
            model_calls: 2,
            artifacts_produced: 3,
        })
        .unwrap();
        assert_eq!(json["toolCalls"], 1);
        assert_eq!(json["modelCalls"], 2);
        assert_eq!(json["artifactsProduced"], 3);
    }

    #[test]
    fn test_dominates() {
        let a = Metrics::default();
        let b = Metrics {
            model_calls: 1,
            ..a
        };
        assert!(b.dominates(&a));
        assert!(!a.dominates(&b));
    }
}
