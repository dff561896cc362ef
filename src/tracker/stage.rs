//! Stage Registry
//!
//! Static catalogue of the pipeline stages, their teams and lifecycle states,
//! plus resolution of a run's analyst selection into the active stage list.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::analysts;
use crate::types::{PulseError, Result};

/// Lifecycle state of a stage.
///
/// Ordered so that `a < b` means `b` is further along; transitions only move up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Team a stage belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageGroup {
    Analyst,
    Research,
    Risk,
    Portfolio,
}

/// Selectable analyst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyst {
    Market,
    Social,
    News,
    Fundamentals,
}

impl Analyst {
    /// All analysts in pipeline order
    pub const ALL: [Analyst; 4] = [
        Analyst::Market,
        Analyst::Social,
        Analyst::News,
        Analyst::Fundamentals,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Market => analysts::MARKET,
            Self::Social => analysts::SOCIAL,
            Self::News => analysts::NEWS,
            Self::Fundamentals => analysts::FUNDAMENTALS,
        }
    }

    pub fn stage(&self) -> StageId {
        match self {
            Self::Market => StageId::MarketAnalyst,
            Self::Social => StageId::SocialAnalyst,
            Self::News => StageId::NewsAnalyst,
            Self::Fundamentals => StageId::FundamentalsAnalyst,
        }
    }
}

impl std::fmt::Display for Analyst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Analyst {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            analysts::MARKET => Ok(Self::Market),
            analysts::SOCIAL => Ok(Self::Social),
            analysts::NEWS => Ok(Self::News),
            analysts::FUNDAMENTALS => Ok(Self::Fundamentals),
            other => Err(PulseError::InvalidConfiguration(format!(
                "Unknown analyst '{}'. Valid values: {}",
                other,
                analysts::ALL.join(", ")
            ))),
        }
    }
}

/// Stage identifier, declared in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageId {
    MarketAnalyst,
    SocialAnalyst,
    NewsAnalyst,
    FundamentalsAnalyst,
    BullResearcher,
    BearResearcher,
    ResearchManager,
    Trader,
    RiskyAnalyst,
    NeutralAnalyst,
    SafeAnalyst,
    PortfolioManager,
}

impl StageId {
    /// Every stage in declaration order
    pub const ALL: [StageId; 12] = [
        StageId::MarketAnalyst,
        StageId::SocialAnalyst,
        StageId::NewsAnalyst,
        StageId::FundamentalsAnalyst,
        StageId::BullResearcher,
        StageId::BearResearcher,
        StageId::ResearchManager,
        StageId::Trader,
        StageId::RiskyAnalyst,
        StageId::NeutralAnalyst,
        StageId::SafeAnalyst,
        StageId::PortfolioManager,
    ];

    /// Research team, completed as one batch by the research judge
    pub const RESEARCH_TEAM: [StageId; 4] = [
        StageId::BullResearcher,
        StageId::BearResearcher,
        StageId::ResearchManager,
        StageId::Trader,
    ];

    /// Risk team plus the portfolio manager, completed by the risk judge
    pub const RISK_TEAM_AND_MANAGER: [StageId; 4] = [
        StageId::RiskyAnalyst,
        StageId::NeutralAnalyst,
        StageId::SafeAnalyst,
        StageId::PortfolioManager,
    ];

    pub const COUNT: usize = 12;

    /// Display name used in transport events
    pub fn name(&self) -> &'static str {
        match self {
            Self::MarketAnalyst => "Market Analyst",
            Self::SocialAnalyst => "Social Analyst",
            Self::NewsAnalyst => "News Analyst",
            Self::FundamentalsAnalyst => "Fundamentals Analyst",
            Self::BullResearcher => "Bull Researcher",
            Self::BearResearcher => "Bear Researcher",
            Self::ResearchManager => "Research Manager",
            Self::Trader => "Trader",
            Self::RiskyAnalyst => "Risky Analyst",
            Self::NeutralAnalyst => "Neutral Analyst",
            Self::SafeAnalyst => "Safe Analyst",
            Self::PortfolioManager => "Portfolio Manager",
        }
    }

    pub fn group(&self) -> StageGroup {
        match self {
            Self::MarketAnalyst
            | Self::SocialAnalyst
            | Self::NewsAnalyst
            | Self::FundamentalsAnalyst => StageGroup::Analyst,
            Self::BullResearcher | Self::BearResearcher | Self::ResearchManager | Self::Trader => {
                StageGroup::Research
            }
            Self::RiskyAnalyst | Self::NeutralAnalyst | Self::SafeAnalyst => StageGroup::Risk,
            Self::PortfolioManager => StageGroup::Portfolio,
        }
    }

    /// The analyst selection key this stage depends on, if it is optional
    pub fn analyst(&self) -> Option<Analyst> {
        match self {
            Self::MarketAnalyst => Some(Analyst::Market),
            Self::SocialAnalyst => Some(Analyst::Social),
            Self::NewsAnalyst => Some(Analyst::News),
            Self::FundamentalsAnalyst => Some(Analyst::Fundamentals),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.name() == name)
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered subset of stages that take part in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStages {
    stages: Vec<StageId>,
    analysts: Vec<Analyst>,
}

impl ActiveStages {
    pub fn stages(&self) -> &[StageId] {
        &self.stages
    }

    pub fn analysts(&self) -> &[Analyst] {
        &self.analysts
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.stages.contains(&stage)
    }

    /// First selected analyst declared after `analyst`, if any
    pub fn next_analyst_after(&self, analyst: Analyst) -> Option<Analyst> {
        self.analysts.iter().copied().find(|a| *a > analyst)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Stage registry
pub struct StageRegistry;

impl StageRegistry {
    /// Resolve an analyst selection into the active stage list.
    ///
    /// Keys are trimmed and case-insensitive; duplicates are ignored. Unknown
    /// keys and an empty selection are rejected.
    pub fn resolve<S: AsRef<str>>(selection: &[S]) -> Result<ActiveStages> {
        let mut analysts = Vec::with_capacity(Analyst::ALL.len());
        for key in selection {
            let analyst: Analyst = key.as_ref().parse()?;
            if !analysts.contains(&analyst) {
                analysts.push(analyst);
            }
        }

        if analysts.is_empty() {
            return Err(PulseError::InvalidConfiguration(
                "At least one analyst must be selected".to_string(),
            ));
        }
        analysts.sort();

        let stages = StageId::ALL
            .into_iter()
            .filter(|stage| match stage.analyst() {
                Some(analyst) => analysts.contains(&analyst),
                None => true,
            })
            .collect();

        Ok(ActiveStages { stages, analysts })
    }

    /// Resolve a comma-separated selection (CLI and config form)
    pub fn resolve_csv(selection: &str) -> Result<ActiveStages> {
        let keys: Vec<&str> = selection
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect();
        Self::resolve(&keys)
    }
}

/// Current lifecycle state of every active stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageBoard {
    states: BTreeMap<StageId, StageStatus>,
}

impl StageBoard {
    /// All active stages start `pending`
    pub fn new(active: &ActiveStages) -> Self {
        Self {
            states: active
                .stages()
                .iter()
                .map(|stage| (*stage, StageStatus::Pending))
                .collect(),
        }
    }

    pub fn status(&self, stage: StageId) -> Option<StageStatus> {
        self.states.get(&stage).copied()
    }

    /// Move a stage forward. Returns true only when the state changed.
    pub fn advance(&mut self, stage: StageId, to: StageStatus) -> bool {
        match self.states.get_mut(&stage) {
            Some(current) if *current < to => {
                *current = to;
                true
            }
            _ => false,
        }
    }

    /// Stages in declaration order with their state
    pub fn iter(&self) -> impl Iterator<Item = (StageId, StageStatus)> + '_ {
        self.states.iter().map(|(stage, status)| (*stage, *status))
    }

    pub fn all_completed(&self) -> bool {
        self.states.values().all(StageStatus::is_terminal)
    }
}
