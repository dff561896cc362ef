//! Global Constants
//!
//! Centralized field names and defaults shared by the tracker, storage and CLI.
//! Field names mirror the keys the analysis pipeline writes into its snapshots.

/// Snapshot field names published by the analysis pipeline
pub mod fields {
    /// Ordered list of message units emitted so far
    pub const MESSAGES: &str = "messages";

    pub const MARKET_REPORT: &str = "market_report";
    pub const SENTIMENT_REPORT: &str = "sentiment_report";
    pub const NEWS_REPORT: &str = "news_report";
    pub const FUNDAMENTALS_REPORT: &str = "fundamentals_report";
    pub const INVESTMENT_PLAN: &str = "investment_plan";
    pub const TRADER_INVESTMENT_PLAN: &str = "trader_investment_plan";
    pub const FINAL_TRADE_DECISION: &str = "final_trade_decision";

    pub const BULL_HISTORY: &str = "investment_debate_state.bull_history";
    pub const BEAR_HISTORY: &str = "investment_debate_state.bear_history";
    pub const RESEARCH_JUDGE_DECISION: &str = "investment_debate_state.judge_decision";

    pub const RISKY_RESPONSE: &str = "risk_debate_state.current_risky_response";
    pub const SAFE_RESPONSE: &str = "risk_debate_state.current_safe_response";
    pub const NEUTRAL_RESPONSE: &str = "risk_debate_state.current_neutral_response";
    pub const RISK_JUDGE_DECISION: &str = "risk_debate_state.judge_decision";

    /// Report sections; the first appearance of each counts as one artifact
    pub const REPORT_KEYS: [&str; 7] = [
        MARKET_REPORT,
        SENTIMENT_REPORT,
        NEWS_REPORT,
        FUNDAMENTALS_REPORT,
        INVESTMENT_PLAN,
        TRADER_INVESTMENT_PLAN,
        FINAL_TRADE_DECISION,
    ];

    /// Field whose presence marks a finished analysis
    pub const TERMINAL_DECISION: &str = FINAL_TRADE_DECISION;
}

/// Analyst selection keys
pub mod analysts {
    pub const MARKET: &str = "market";
    pub const SOCIAL: &str = "social";
    pub const NEWS: &str = "news";
    pub const FUNDAMENTALS: &str = "fundamentals";

    /// Every selectable analyst, in pipeline order
    pub const ALL: [&str; 4] = [MARKET, SOCIAL, NEWS, FUNDAMENTALS];
}

/// Session driving defaults
pub mod session {
    /// Default capacity of the event channel between controller and transport
    pub const DEFAULT_EVENT_BUFFER: usize = 64;

    /// Default number of history rows listed
    pub const DEFAULT_HISTORY_LIMIT: usize = 20;
}

/// Storage defaults
pub mod storage {
    /// Project-local data directory
    pub const PROJECT_DIR: &str = ".tradepulse";

    /// Default SQLite database path
    pub const DEFAULT_DATABASE_PATH: &str = ".tradepulse/analysis.db";

    /// Default directory scanned for legacy JSON result files
    pub const LEGACY_RESULTS_DIR: &str = "./data/results";

    /// Status stamped on imported legacy rows
    pub const MIGRATED_STATUS: &str = "migrated";
}

/// Producer defaults
pub mod producer {
    pub const DEFAULT_COMMAND: &str = "tradingagents-stream";
    pub const DEFAULT_LLM_PROVIDER: &str = "openai";
    pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
    pub const DEFAULT_MAX_DEBATE_ROUNDS: u32 = 1;
}
