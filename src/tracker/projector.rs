//! Status Projector
//!
//! Maps newly populated fields to stage lifecycle transitions through a fixed,
//! ordered table of activation rules. Transitions are returned as values; the
//! caller applies them to its board.
//!
//! Within one delta every `completed` transition is emitted before any
//! `in_progress` transition, each group in rule declaration order. Targets
//! outside the run's active stages are skipped without error.

use serde::Serialize;

use super::diff::Delta;
use super::stage::{ActiveStages, Analyst, StageBoard, StageId, StageStatus};
use crate::constants::fields;

/// One stage lifecycle change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTransition {
    pub stage: StageId,
    pub status: StageStatus,
}

impl StageTransition {
    pub fn new(stage: StageId, status: StageStatus) -> Self {
        Self { stage, status }
    }
}

/// Stages addressed by one side of a rule
#[derive(Debug, Clone, Copy)]
pub enum StageTargets {
    None,
    Fixed(&'static [StageId]),
    /// The next selected analyst after this one, or the research team when
    /// no selected analyst remains
    NextAfter(Analyst),
}

impl StageTargets {
    fn resolve(&self, active: &ActiveStages) -> Vec<StageId> {
        match self {
            Self::None => Vec::new(),
            Self::Fixed(stages) => stages.to_vec(),
            Self::NextAfter(analyst) => match active.next_analyst_after(*analyst) {
                Some(next) => vec![next.stage()],
                None => StageId::RESEARCH_TEAM.to_vec(),
            },
        }
    }
}

/// A populated field completes some stages and starts others
#[derive(Debug, Clone, Copy)]
pub struct ActivationRule {
    pub field: &'static str,
    pub complete: StageTargets,
    pub start: StageTargets,
}

/// Rule table in declaration order
pub const ACTIVATION_RULES: &[ActivationRule] = &[
    ActivationRule {
        field: fields::MARKET_REPORT,
        complete: StageTargets::Fixed(&[StageId::MarketAnalyst]),
        start: StageTargets::NextAfter(Analyst::Market),
    },
    ActivationRule {
        field: fields::SENTIMENT_REPORT,
        complete: StageTargets::Fixed(&[StageId::SocialAnalyst]),
        start: StageTargets::NextAfter(Analyst::Social),
    },
    ActivationRule {
        field: fields::NEWS_REPORT,
        complete: StageTargets::Fixed(&[StageId::NewsAnalyst]),
        start: StageTargets::NextAfter(Analyst::News),
    },
    ActivationRule {
        field: fields::FUNDAMENTALS_REPORT,
        complete: StageTargets::Fixed(&[StageId::FundamentalsAnalyst]),
        start: StageTargets::NextAfter(Analyst::Fundamentals),
    },
    ActivationRule {
        field: fields::BULL_HISTORY,
        complete: StageTargets::None,
        start: StageTargets::Fixed(&[StageId::BullResearcher]),
    },
    ActivationRule {
        field: fields::BEAR_HISTORY,
        complete: StageTargets::None,
        start: StageTargets::Fixed(&[StageId::BearResearcher]),
    },
    ActivationRule {
        field: fields::INVESTMENT_PLAN,
        complete: StageTargets::Fixed(&[StageId::ResearchManager]),
        start: StageTargets::Fixed(&[StageId::Trader]),
    },
    ActivationRule {
        field: fields::RESEARCH_JUDGE_DECISION,
        complete: StageTargets::Fixed(&StageId::RESEARCH_TEAM),
        start: StageTargets::Fixed(&[StageId::RiskyAnalyst]),
    },
    ActivationRule {
        field: fields::TRADER_INVESTMENT_PLAN,
        complete: StageTargets::Fixed(&[StageId::Trader]),
        start: StageTargets::Fixed(&[StageId::RiskyAnalyst]),
    },
    ActivationRule {
        field: fields::RISKY_RESPONSE,
        complete: StageTargets::None,
        start: StageTargets::Fixed(&[StageId::RiskyAnalyst]),
    },
    ActivationRule {
        field: fields::SAFE_RESPONSE,
        complete: StageTargets::None,
        start: StageTargets::Fixed(&[StageId::SafeAnalyst]),
    },
    ActivationRule {
        field: fields::NEUTRAL_RESPONSE,
        complete: StageTargets::None,
        start: StageTargets::Fixed(&[StageId::NeutralAnalyst]),
    },
    ActivationRule {
        field: fields::RISK_JUDGE_DECISION,
        complete: StageTargets::Fixed(&StageId::RISK_TEAM_AND_MANAGER),
        start: StageTargets::None,
    },
    ActivationRule {
        field: fields::FINAL_TRADE_DECISION,
        complete: StageTargets::Fixed(&[StageId::PortfolioManager]),
        start: StageTargets::None,
    },
];

pub struct StatusProjector;

impl StatusProjector {
    /// Transitions triggered by `delta`, given the current board.
    pub fn project(delta: &Delta, board: &StageBoard, active: &ActiveStages) -> Vec<StageTransition> {
        let fired: Vec<&ActivationRule> = ACTIVATION_RULES
            .iter()
            .filter(|rule| delta.populated(rule.field))
            .collect();
        if fired.is_empty() {
            return Vec::new();
        }

        let mut working = board.clone();
        let mut transitions = Vec::new();

        for rule in &fired {
            for stage in rule.complete.resolve(active) {
                if active.contains(stage) && working.advance(stage, StageStatus::Completed) {
                    transitions.push(StageTransition::new(stage, StageStatus::Completed));
                }
            }
        }

        for rule in &fired {
            for stage in rule.start.resolve(active) {
                if active.contains(stage)
                    && working.status(stage) == Some(StageStatus::Pending)
                    && working.advance(stage, StageStatus::InProgress)
                {
                    transitions.push(StageTransition::new(stage, StageStatus::InProgress));
                }
            }
        }

        transitions
    }

    /// Catch-up batch forcing every unfinished active stage to `completed`,
    /// in declaration order
    pub fn complete_remaining(board: &StageBoard) -> Vec<StageTransition> {
        board
            .iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(stage, _)| StageTransition::new(stage, StageStatus::Completed))
            .collect()
    }

    /// Apply returned transitions to a board
    pub fn apply(board: &mut StageBoard, transitions: &[StageTransition]) {
        for transition in transitions {
            board.advance(transition.stage, transition.status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::stage::StageRegistry;

    fn delta(keys: &[&str]) -> Delta {
        Delta {
            newly_populated: keys.iter().map(|k| k.to_string()).collect(),
            ..Delta::default()
        }
    }

    fn pairs(transitions: &[StageTransition]) -> Vec<(&'static str, StageStatus)> {
        transitions.iter().map(|t| (t.stage.name(), t.status)).collect()
    }

    #[test]
    fn test_market_report_hands_off_to_next_selected_analyst() {
        let active = StageRegistry::resolve_csv("market,fundamentals").unwrap();
        let board = StageBoard::new(&active);

        let out = StatusProjector::project(&delta(&["market_report"]), &board, &active);
        assert_eq!(
            pairs(&out),
            vec![
                ("Market Analyst", StageStatus::Completed),
                ("Fundamentals Analyst", StageStatus::InProgress),
            ]
        );
    }

    #[test]
    fn test_unselected_social_analyst_is_not_activated() {
        let active = StageRegistry::resolve_csv("market,news").unwrap();
        let board = StageBoard::new(&active);

        let out = StatusProjector::project(&delta(&["market_report"]), &board, &active);
        assert!(out.iter().all(|t| t.stage != StageId::SocialAnalyst));
        assert_eq!(out[1].stage, StageId::NewsAnalyst);
    }

    #[test]
    fn test_last_analyst_starts_research_team() {
        let active = StageRegistry::resolve_csv("fundamentals").unwrap();
        let board = StageBoard::new(&active);

        let out = StatusProjector::project(&delta(&["fundamentals_report"]), &board, &active);
        assert_eq!(
            pairs(&out),
            vec![
                ("Fundamentals Analyst", StageStatus::Completed),
                ("Bull Researcher", StageStatus::InProgress),
                ("Bear Researcher", StageStatus::InProgress),
                ("Research Manager", StageStatus::InProgress),
                ("Trader", StageStatus::InProgress),
            ]
        );
    }

    #[test]
    fn test_completed_before_in_progress_in_one_delta() {
        let active = StageRegistry::resolve_csv("market").unwrap();
        let board = StageBoard::new(&active);

        // Bull starts (rule 5) but the judge (rule 8) completes the team in
        // the same delta: completion wins and no in_progress is emitted for it.
        let out = StatusProjector::project(
            &delta(&["investment_debate_state.bull_history", "investment_debate_state.judge_decision"]),
            &board,
            &active,
        );
        assert_eq!(
            pairs(&out),
            vec![
                ("Bull Researcher", StageStatus::Completed),
                ("Bear Researcher", StageStatus::Completed),
                ("Research Manager", StageStatus::Completed),
                ("Trader", StageStatus::Completed),
                ("Risky Analyst", StageStatus::InProgress),
            ]
        );
    }

    #[test]
    fn test_risk_judge_completes_risk_team_and_manager() {
        let active = StageRegistry::resolve_csv("market").unwrap();
        let mut board = StageBoard::new(&active);
        board.advance(StageId::RiskyAnalyst, StageStatus::InProgress);

        let out = StatusProjector::project(
            &delta(&["risk_debate_state.judge_decision"]),
            &board,
            &active,
        );
        assert_eq!(
            pairs(&out),
            vec![
                ("Risky Analyst", StageStatus::Completed),
                ("Neutral Analyst", StageStatus::Completed),
                ("Safe Analyst", StageStatus::Completed),
                ("Portfolio Manager", StageStatus::Completed),
            ]
        );
    }

    #[test]
    fn test_no_op_suppression() {
        let active = StageRegistry::resolve_csv("market").unwrap();
        let mut board = StageBoard::new(&active);
        let first = StatusProjector::project(&delta(&["market_report"]), &board, &active);
        StatusProjector::apply(&mut board, &first);

        let again = StatusProjector::project(&delta(&["market_report"]), &board, &active);
        assert!(again.is_empty());
    }

    #[test]
    fn test_in_progress_never_regresses_completed() {
        let active = StageRegistry::resolve_csv("market").unwrap();
        let mut board = StageBoard::new(&active);
        board.advance(StageId::RiskyAnalyst, StageStatus::Completed);

        let out = StatusProjector::project(
            &delta(&["risk_debate_state.current_risky_response"]),
            &board,
            &active,
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_complete_remaining_in_declaration_order() {
        let active = StageRegistry::resolve_csv("news").unwrap();
        let mut board = StageBoard::new(&active);
        board.advance(StageId::NewsAnalyst, StageStatus::Completed);
        board.advance(StageId::Trader, StageStatus::InProgress);

        let out = StatusProjector::complete_remaining(&board);
        assert_eq!(out.len(), active.len() - 1);
        assert_eq!(out[0].stage, StageId::BullResearcher);
        assert_eq!(out.last().map(|t| t.stage), Some(StageId::PortfolioManager));
        assert!(out.iter().all(|t| t.status == StageStatus::Completed));

        StatusProjector::apply(&mut board, &out);
        assert!(board.all_completed());
    }
}
