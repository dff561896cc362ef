//! Session Controller
//!
//! Drives one analysis session from the first snapshot to a terminal state.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──run──▶ Running ──clean end + decision + finalize ok──▶ Completed
//!                  │
//!                  └──producer error │ no decision │ finalize error │ disconnect──▶ Failed
//! ```
//!
//! Both terminal states are absorbing. Per snapshot the controller emits the
//! status events of the delta first, then one `update` per new message unit.
//! A successful run ends with the catch-up status events and exactly one
//! `complete`; any failure ends with exactly one `error`, except a disconnect
//! which ends silently. The disconnect check also runs once after the last
//! snapshot, so nothing is persisted for a consumer that already left.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::events::{SessionEvent, StageSummary};
use super::metrics::Metrics;
use super::projector::StatusProjector;
use super::report::{AvailabilityFlags, decision_label};
use super::session::{Session, StepOutcome};
use super::sink::EventSink;
use super::stage::{ActiveStages, StageRegistry};
use crate::constants::fields;
use crate::producer::SnapshotSource;
use crate::types::{PulseError, Result, SessionErrorKind};

// =============================================================================
// Request / Outcome
// =============================================================================

/// Parameters of one analysis run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Owning user id
    pub owner: i64,
    pub ticker: String,
    /// Trade date, `YYYY-MM-DD`
    pub date: String,
    /// Analyst keys, e.g. `["market", "news"]`
    pub analysts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Terminal result of [`SessionController::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed {
        record_id: i64,
        decision: String,
        metrics: Metrics,
    },
    Failed {
        kind: SessionErrorKind,
        detail: String,
    },
}

impl SessionOutcome {
    fn failed(err: &PulseError) -> Self {
        Self::Failed {
            kind: err.kind().unwrap_or(SessionErrorKind::ProducerFailure),
            detail: err.to_string(),
        }
    }

    pub fn state(&self) -> SessionState {
        match self {
            Self::Completed { .. } => SessionState::Completed,
            Self::Failed { .. } => SessionState::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

// =============================================================================
// Finalizer
// =============================================================================

/// Payload handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeRequest {
    pub owner: i64,
    pub ticker: String,
    pub date: String,
    pub decision: String,
    /// Reconciled report serialized as a JSON object
    pub full_report: String,
    pub metrics: Metrics,
}

/// Persists a completed analysis and returns its record id.
///
/// Called at most once per session and only after a clean end with a
/// final decision.
#[async_trait]
pub trait Finalizer: Send + Sync {
    async fn finalize(&self, request: FinalizeRequest) -> Result<i64>;
}

// =============================================================================
// Controller
// =============================================================================

pub struct SessionController {
    session_id: String,
    request: AnalysisRequest,
    active: ActiveStages,
    finalizer: Arc<dyn Finalizer>,
    state: SessionState,
}

impl SessionController {
    /// Resolve the analyst selection. An invalid selection is rejected here,
    /// before any event is produced.
    pub fn new(request: AnalysisRequest, finalizer: Arc<dyn Finalizer>) -> Result<Self> {
        let active = StageRegistry::resolve(&request.analysts)?;
        Ok(Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            request,
            active,
            finalizer,
            state: SessionState::Idle,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active(&self) -> &ActiveStages {
        &self.active
    }

    /// Drive the session to a terminal state. A controller runs once; later
    /// calls fail without touching the source or the sink.
    #[instrument(skip_all, fields(session = %self.session_id, ticker = %self.request.ticker, date = %self.request.date))]
    pub async fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> SessionOutcome
    where
        S: SnapshotSource + ?Sized,
        K: EventSink + ?Sized,
    {
        if self.state != SessionState::Idle {
            warn!(state = %self.state, "Session already ran");
            return SessionOutcome::failed(&PulseError::InvalidConfiguration(format!(
                "session {} already ran",
                self.session_id
            )));
        }

        self.state = SessionState::Running;
        info!(
            stages = self.active.len(),
            owner = self.request.owner,
            "Analysis session started"
        );

        let mut session = Session::new(self.active.clone());
        let outcome = self.drive(&mut session, source, sink).await;

        self.state = outcome.state();
        match &outcome {
            SessionOutcome::Completed {
                record_id,
                decision,
                metrics,
            } => info!(record_id, %decision, %metrics, "Analysis session completed"),
            SessionOutcome::Failed { kind, detail } => {
                warn!(%kind, snapshots = session.snapshots(), "Analysis session failed: {}", detail)
            }
        }
        outcome
    }

    async fn drive<S, K>(&self, session: &mut Session, source: &mut S, sink: &mut K) -> SessionOutcome
    where
        S: SnapshotSource + ?Sized,
        K: EventSink + ?Sized,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = sink.closed() => return SessionOutcome::failed(&PulseError::TransportClosed),
                next = source.next_snapshot() => next,
            };

            match next {
                Ok(Some(snapshot)) => {
                    let step = session.step(snapshot);
                    debug!(
                        snapshot = session.snapshots(),
                        new_messages = step.delta.new_messages.len(),
                        newly_populated = step.delta.newly_populated.len(),
                        transitions = step.transitions.len(),
                        "Snapshot folded"
                    );
                    if let Err(e) = Self::emit_step(&step, sink).await {
                        return SessionOutcome::failed(&e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let err = match e {
                        PulseError::ProducerFailure(_) => e,
                        other => PulseError::producer(other.to_string()),
                    };
                    return Self::fail(err, sink).await;
                }
            }
        }

        // Nothing may be persisted for a consumer that left after the last snapshot
        if Self::consumer_gone(sink).await {
            return SessionOutcome::failed(&PulseError::TransportClosed);
        }

        if !session.has_decision() {
            let err = PulseError::IncompleteAnalysis {
                missing_field: fields::TERMINAL_DECISION.to_string(),
                snapshots: session.snapshots(),
            };
            return Self::fail(err, sink).await;
        }

        self.complete(session, sink).await
    }

    async fn consumer_gone<K: EventSink + ?Sized>(sink: &K) -> bool {
        tokio::select! {
            biased;
            _ = sink.closed() => true,
            _ = std::future::ready(()) => false,
        }
    }

    async fn emit_step<K: EventSink + ?Sized>(step: &StepOutcome, sink: &mut K) -> Result<()> {
        for transition in &step.transitions {
            sink.send(SessionEvent::status(transition)).await?;
        }
        for (unit, metrics) in step.delta.new_messages.iter().zip(&step.metrics.per_message) {
            sink.send(SessionEvent::Update {
                message: unit.content.clone(),
                message_type: unit.kind.clone(),
                tool_calls: unit.tool_calls,
                metrics: *metrics,
            })
            .await?;
        }
        Ok(())
    }

    async fn complete<K: EventSink + ?Sized>(&self, session: &mut Session, sink: &mut K) -> SessionOutcome {
        let catch_up = StatusProjector::complete_remaining(session.board());
        let decision = decision_label(&session.decision_text().unwrap_or_default());
        let metrics = session.metrics();

        let full_report = match session.report().to_json() {
            Ok(json) => json,
            Err(e) => return Self::fail(PulseError::persistence(e.to_string()), sink).await,
        };

        let request = FinalizeRequest {
            owner: self.request.owner,
            ticker: self.request.ticker.clone(),
            date: self.request.date.clone(),
            decision: decision.clone(),
            full_report,
            metrics,
        };

        let record_id = match self.finalizer.finalize(request).await {
            Ok(id) => id,
            Err(e) => return Self::fail(e.into_persistence(), sink).await,
        };

        StatusProjector::apply(session.board_mut(), &catch_up);
        let stages = session
            .board()
            .iter()
            .map(|(stage, status)| StageSummary {
                agent: stage.name().to_string(),
                status,
            })
            .collect();

        let mut events: Vec<SessionEvent> = catch_up.iter().map(SessionEvent::status).collect();
        events.push(SessionEvent::Complete {
            record_id,
            decision: decision.clone(),
            report: session.report().clone(),
            availability: AvailabilityFlags::from_report(session.report()),
            metrics,
            stages,
        });

        for event in events {
            if let Err(e) = sink.send(event).await {
                // The record is already persisted
                warn!(record_id, "Consumer gone after finalize: {}", e);
                break;
            }
        }

        SessionOutcome::Completed {
            record_id,
            decision,
            metrics,
        }
    }

    /// Emit the single `error` event of a failed session
    async fn fail<K: EventSink + ?Sized>(err: PulseError, sink: &mut K) -> SessionOutcome {
        if let Err(send_err) = sink.send(SessionEvent::error(&err)).await {
            debug!("Error event not delivered: {}", send_err);
        }
        SessionOutcome::failed(&err)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::VecSnapshotSource;
    use crate::tracker::sink::ChannelSink;
    use crate::tracker::snapshot::Snapshot;
    use crate::tracker::stage::StageStatus;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct RecordingFinalizer {
        calls: Mutex<Vec<FinalizeRequest>>,
        fail: bool,
    }

    impl RecordingFinalizer {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<FinalizeRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Finalizer for RecordingFinalizer {
        async fn finalize(&self, request: FinalizeRequest) -> Result<i64> {
            self.calls.lock().unwrap().push(request);
            if self.fail {
                Err(PulseError::Storage("disk full".to_string()))
            } else {
                Ok(42)
            }
        }
    }

    /// Yields scripted results, then ends
    struct ScriptedSource {
        items: VecDeque<Result<Option<Snapshot>>>,
        pulls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn next_snapshot(&mut self) -> Result<Option<Snapshot>> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            self.items.pop_front().unwrap_or(Ok(None))
        }
    }

    /// Never yields
    struct StalledSource;

    #[async_trait]
    impl SnapshotSource for StalledSource {
        async fn next_snapshot(&mut self) -> Result<Option<Snapshot>> {
            std::future::pending().await
        }
    }

    /// Accepts `limit` events, then reports the consumer gone
    struct LimitedSink {
        events: Vec<SessionEvent>,
        limit: usize,
    }

    #[async_trait]
    impl EventSink for LimitedSink {
        async fn send(&mut self, event: SessionEvent) -> Result<()> {
            if self.events.len() >= self.limit {
                return Err(PulseError::TransportClosed);
            }
            self.events.push(event);
            Ok(())
        }
    }

    /// Marks the consumer gone once the stream is exhausted
    struct HangUpAtEnd {
        inner: VecSnapshotSource,
        hung_up: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SnapshotSource for HangUpAtEnd {
        async fn next_snapshot(&mut self) -> Result<Option<Snapshot>> {
            let next = self.inner.next_snapshot().await?;
            if next.is_none() {
                self.hung_up.store(true, Ordering::SeqCst);
            }
            Ok(next)
        }
    }

    /// Accepts events until the shared flag is set
    struct HangUpSink {
        events: Vec<SessionEvent>,
        hung_up: Arc<AtomicBool>,
    }

    #[async_trait]
    impl EventSink for HangUpSink {
        async fn send(&mut self, event: SessionEvent) -> Result<()> {
            if self.hung_up.load(Ordering::SeqCst) {
                return Err(PulseError::TransportClosed);
            }
            self.events.push(event);
            Ok(())
        }

        async fn closed(&self) {
            if !self.hung_up.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
        }
    }

    fn request(analysts: &[&str]) -> AnalysisRequest {
        AnalysisRequest {
            owner: 7,
            ticker: "NVDA".to_string(),
            date: "2025-01-15".to_string(),
            analysts: analysts.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn snapshots(values: Vec<Value>) -> VecSnapshotSource {
        VecSnapshotSource::new(
            values
                .into_iter()
                .map(|v| Snapshot::from_value(v).unwrap())
                .collect(),
        )
    }

    async fn run_collect(
        analysts: &[&str],
        source: &mut dyn SnapshotSource,
        finalizer: Arc<RecordingFinalizer>,
    ) -> (SessionOutcome, Vec<SessionEvent>) {
        let mut controller = SessionController::new(request(analysts), finalizer).unwrap();
        let (mut sink, mut rx) = ChannelSink::channel(256);
        let outcome = controller.run(source, &mut sink).await;
        drop(sink);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (outcome, events)
    }

    fn full_run() -> Vec<Value> {
        vec![
            json!({
                "messages": [{"content": "Pulling price history", "type": "ai"}],
                "market_report": "Uptrend intact"
            }),
            json!({
                "messages": [
                    {"content": "Pulling price history", "type": "ai"},
                    {"content": "Reading filings", "tool_calls": [{"name": "get_filings"}]}
                ],
                "market_report": "Uptrend intact",
                "fundamentals_report": "Margins expanding"
            }),
            json!({
                "messages": [],
                "investment_debate_state": {"bull_history": "Bull case", "bear_history": "Bear case"},
                "investment_plan": "Accumulate"
            }),
            json!({
                "investment_debate_state": {"judge_decision": "Go long"},
                "trader_investment_plan": "Buy 100 shares"
            }),
            json!({
                "risk_debate_state": {"current_risky_response": "Size up"},
                "final_trade_decision": "FINAL TRANSACTION PROPOSAL: **BUY**"
            }),
        ]
    }

    fn status_pairs(events: &[SessionEvent]) -> Vec<(String, StageStatus)> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Status { agent, status } => Some((agent.clone(), *status)),
                _ => None,
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    #[test]
    fn test_invalid_selection_rejected_before_start() {
        let finalizer: Arc<dyn Finalizer> = Arc::new(RecordingFinalizer::default());
        let err = SessionController::new(request(&["market", "macro"]), finalizer.clone())
            .err()
            .unwrap();
        assert_eq!(err.kind(), Some(SessionErrorKind::InvalidConfiguration));

        let err = SessionController::new(request(&[]), finalizer).err().unwrap();
        assert_eq!(err.kind(), Some(SessionErrorKind::InvalidConfiguration));
    }

    #[test]
    fn test_new_controller_is_idle() {
        let controller =
            SessionController::new(request(&["news"]), Arc::new(RecordingFinalizer::default()))
                .unwrap();
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(!controller.state().is_terminal());
    }

    #[tokio::test]
    async fn test_state_follows_run_and_second_run_is_rejected() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut controller = SessionController::new(request(&["news"]), finalizer.clone()).unwrap();
        let (mut sink, mut rx) = ChannelSink::channel(64);

        let mut source = snapshots(vec![json!({"final_trade_decision": "HOLD"})]);
        let outcome = controller.run(&mut source, &mut sink).await;
        assert!(outcome.is_completed());
        assert_eq!(controller.state(), SessionState::Completed);
        assert!(controller.state().is_terminal());

        let mut again = snapshots(vec![json!({"final_trade_decision": "SELL"})]);
        let second = controller.run(&mut again, &mut sink).await;
        assert!(matches!(
            second,
            SessionOutcome::Failed {
                kind: SessionErrorKind::InvalidConfiguration,
                ..
            }
        ));
        assert_eq!(again.remaining(), 1);
        assert_eq!(controller.state(), SessionState::Completed);
        assert_eq!(finalizer.calls().len(), 1);

        drop(sink);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_failed_run_leaves_controller_failed() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut controller = SessionController::new(request(&["market"]), finalizer).unwrap();
        let (mut sink, _rx) = ChannelSink::channel(64);
        let mut source = snapshots(vec![json!({"market_report": "m"})]);

        controller.run(&mut source, &mut sink).await;
        assert_eq!(controller.state(), SessionState::Failed);
    }

    // -------------------------------------------------------------------------
    // Happy path
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_market_fundamentals_first_snapshot() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut source = snapshots(vec![full_run().remove(0)]);
        let (_, events) = run_collect(&["market", "fundamentals"], &mut source, finalizer).await;

        let pairs = status_pairs(&events);
        assert_eq!(
            pairs[..2],
            [
                ("Market Analyst".to_string(), StageStatus::Completed),
                ("Fundamentals Analyst".to_string(), StageStatus::InProgress),
            ]
        );
        assert!(
            pairs
                .iter()
                .all(|(agent, _)| agent != "Social Analyst" && agent != "News Analyst")
        );
    }

    #[tokio::test]
    async fn test_full_run_completes_and_persists_once() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut source = snapshots(full_run());
        let (outcome, events) =
            run_collect(&["market", "fundamentals"], &mut source, finalizer.clone()).await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.state(), SessionState::Completed);

        let calls = finalizer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].owner, 7);
        assert_eq!(calls[0].ticker, "NVDA");
        assert_eq!(calls[0].decision, "BUY");
        assert_eq!(calls[0].metrics.model_calls, 2);
        assert_eq!(calls[0].metrics.tool_calls, 1);
        assert_eq!(calls[0].metrics.artifacts_produced, 5);
        let report: Value = serde_json::from_str(&calls[0].full_report).unwrap();
        assert_eq!(report["investment_plan"], "Accumulate");
        assert_eq!(report["investment_debate_state"]["judge_decision"], "Go long");
        assert_eq!(report["risk_debate_state"]["current_risky_response"], "Size up");
        assert!(report.get("messages").is_none());

        let completes: Vec<&SessionEvent> = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Complete { .. }))
            .collect();
        assert_eq!(completes.len(), 1);
        assert!(matches!(events.last(), Some(SessionEvent::Complete { .. })));
        assert!(events.iter().all(|e| !matches!(e, SessionEvent::Error { .. })));

        match events.last() {
            Some(SessionEvent::Complete {
                record_id,
                decision,
                availability,
                stages,
                ..
            }) => {
                assert_eq!(*record_id, 42);
                assert_eq!(decision, "BUY");
                assert!(availability.bullish_momentum);
                assert!(availability.analyst_breakdown);
                assert!(availability.risk_assessment);
                assert!(!availability.macro_news);
                assert!(!availability.inflow_up);
                assert_eq!(stages.len(), 10);
                assert!(stages.iter().all(|s| s.status == StageStatus::Completed));
            }
            other => panic!("expected complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_market_fundamentals_scenario_full_sequence() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut source = snapshots(vec![
            json!({"market_report": "m"}),
            json!({"market_report": "m", "fundamentals_report": "f"}),
            json!({
                "market_report": "m",
                "fundamentals_report": "f",
                "investment_debate_state": {"judge_decision": "Go long"}
            }),
            json!({
                "market_report": "m",
                "fundamentals_report": "f",
                "investment_debate_state": {"judge_decision": "Go long"},
                "risk_debate_state": {"judge_decision": "Approved"}
            }),
            json!({
                "market_report": "m",
                "fundamentals_report": "f",
                "investment_debate_state": {"judge_decision": "Go long"},
                "risk_debate_state": {"judge_decision": "Approved"},
                "final_trade_decision": "FINAL TRANSACTION PROPOSAL: **BUY**"
            }),
        ]);
        let (outcome, events) =
            run_collect(&["market", "fundamentals"], &mut source, finalizer.clone()).await;

        use StageStatus::{Completed as Done, InProgress as Started};
        let expected: Vec<(String, StageStatus)> = [
            ("Market Analyst", Done),
            ("Fundamentals Analyst", Started),
            ("Fundamentals Analyst", Done),
            ("Bull Researcher", Started),
            ("Bear Researcher", Started),
            ("Research Manager", Started),
            ("Trader", Started),
            ("Bull Researcher", Done),
            ("Bear Researcher", Done),
            ("Research Manager", Done),
            ("Trader", Done),
            ("Risky Analyst", Started),
            ("Risky Analyst", Done),
            ("Neutral Analyst", Done),
            ("Safe Analyst", Done),
            ("Portfolio Manager", Done),
        ]
        .into_iter()
        .map(|(agent, status)| (agent.to_string(), status))
        .collect();
        assert_eq!(status_pairs(&events), expected);

        let expected_metrics = Metrics {
            tool_calls: 0,
            model_calls: 0,
            artifacts_produced: 3,
        };
        match events.last() {
            Some(SessionEvent::Complete { metrics, stages, .. }) => {
                assert_eq!(*metrics, expected_metrics);
                assert_eq!(stages.len(), 10);
                assert!(stages.iter().all(|s| s.status == StageStatus::Completed));
            }
            other => panic!("expected complete, got {:?}", other),
        }
        assert!(outcome.is_completed());

        let calls = finalizer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].metrics, expected_metrics);
        let report: Value = serde_json::from_str(&calls[0].full_report).unwrap();
        assert_eq!(report["investment_debate_state"]["judge_decision"], "Go long");
        assert_eq!(report["risk_debate_state"]["judge_decision"], "Approved");
    }

    #[tokio::test]
    async fn test_update_events_carry_running_totals() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut source = snapshots(vec![json!({
            "messages": [
                {"content": "first"},
                {"content": "second", "tool_calls": [{}, {}]}
            ]
        })]);
        let (outcome, events) = run_collect(&["market"], &mut source, finalizer).await;

        let updates: Vec<(String, u64, Metrics)> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Update {
                    message,
                    tool_calls,
                    metrics,
                    ..
                } => Some((message.clone(), *tool_calls, *metrics)),
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].0, "first");
        assert_eq!(updates[0].2.model_calls, 1);
        assert_eq!(updates[0].2.tool_calls, 0);
        assert_eq!(updates[1].1, 2);
        assert_eq!(updates[1].2.model_calls, 2);
        assert_eq!(updates[1].2.tool_calls, 2);

        // No decision in the stream
        assert!(!outcome.is_completed());
    }

    #[tokio::test]
    async fn test_catch_up_status_precedes_complete() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut source = snapshots(vec![json!({
            "market_report": "m",
            "final_trade_decision": "HOLD"
        })]);
        let (outcome, events) = run_collect(&["market"], &mut source, finalizer).await;
        assert!(outcome.is_completed());

        let complete_at = events
            .iter()
            .position(|e| matches!(e, SessionEvent::Complete { .. }))
            .unwrap();
        let caught_up: Vec<(String, StageStatus)> = status_pairs(&events[..complete_at]);
        for agent in ["Bull Researcher", "Safe Analyst", "Neutral Analyst", "Risky Analyst"] {
            assert!(caught_up.contains(&(agent.to_string(), StageStatus::Completed)));
        }
    }

    #[tokio::test]
    async fn test_repeated_snapshot_emits_nothing_new() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let first = json!({
            "messages": [{"content": "a"}],
            "market_report": "m",
            "final_trade_decision": "HOLD"
        });
        let mut once = snapshots(vec![first.clone()]);
        let mut twice = snapshots(vec![first.clone(), first]);

        let (_, a) = run_collect(&["market"], &mut once, finalizer.clone()).await;
        let (_, b) = run_collect(&["market"], &mut twice, finalizer).await;
        assert_eq!(a, b);
    }

    // -------------------------------------------------------------------------
    // Failures
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_stream_without_decision_is_incomplete() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut source = snapshots(vec![json!({"market_report": "m"})]);
        let (outcome, events) = run_collect(&["market"], &mut source, finalizer.clone()).await;

        assert_eq!(outcome.state(), SessionState::Failed);
        assert!(matches!(
            outcome,
            SessionOutcome::Failed {
                kind: SessionErrorKind::IncompleteAnalysis,
                ..
            }
        ));
        assert!(finalizer.calls().is_empty());
        let errors: Vec<&SessionEvent> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].tag(), "error");
    }

    #[tokio::test]
    async fn test_producer_failure_keeps_prior_events() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let pulls = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource {
            items: VecDeque::from(vec![
                Ok(Some(Snapshot::from_value(json!({"market_report": "m"})).unwrap())),
                Err(PulseError::Io(std::io::Error::other("pipe broke"))),
            ]),
            pulls: pulls.clone(),
        };
        let (outcome, events) = run_collect(&["market"], &mut source, finalizer.clone()).await;

        assert!(matches!(
            outcome,
            SessionOutcome::Failed {
                kind: SessionErrorKind::ProducerFailure,
                ..
            }
        ));
        assert!(finalizer.calls().is_empty());
        assert_eq!(pulls.load(Ordering::SeqCst), 2);
        assert_eq!(events[0].tag(), "status");
        match events.last() {
            Some(SessionEvent::Error { kind, detail }) => {
                assert_eq!(*kind, SessionErrorKind::ProducerFailure);
                assert!(detail.contains("pipe broke"));
            }
            other => panic!("expected error, got {:?}", other),
        }
        assert!(events.iter().all(|e| !matches!(e, SessionEvent::Complete { .. })));
    }

    #[tokio::test]
    async fn test_finalize_failure_emits_single_error() {
        let finalizer = Arc::new(RecordingFinalizer::failing());
        let mut source = snapshots(vec![json!({"final_trade_decision": "SELL"})]);
        let (outcome, events) = run_collect(&["news"], &mut source, finalizer.clone()).await;

        assert!(matches!(
            outcome,
            SessionOutcome::Failed {
                kind: SessionErrorKind::PersistenceFailure,
                ..
            }
        ));
        assert_eq!(finalizer.calls().len(), 1);
        let terminal: Vec<&SessionEvent> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        assert_eq!(terminal[0].tag(), "error");
        // No catch-up events after a failed finalize
        let last_status = events
            .iter()
            .rev()
            .find(|e| e.tag() == "status");
        assert!(matches!(
            last_status,
            Some(SessionEvent::Status { agent, .. }) if agent == "Portfolio Manager"
        ));
    }

    // -------------------------------------------------------------------------
    // Disconnect
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_disconnect_stops_pulling() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let pulls = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource {
            items: full_run()
                .into_iter()
                .map(|v| Ok(Some(Snapshot::from_value(v).unwrap())))
                .collect(),
            pulls: pulls.clone(),
        };
        let mut sink = LimitedSink {
            events: Vec::new(),
            limit: 1,
        };

        let mut controller =
            SessionController::new(request(&["market", "fundamentals"]), finalizer.clone()).unwrap();
        let outcome = controller.run(&mut source, &mut sink).await;

        assert!(matches!(
            outcome,
            SessionOutcome::Failed {
                kind: SessionErrorKind::TransportClosed,
                ..
            }
        ));
        assert_eq!(pulls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.events.len(), 1);
        assert!(finalizer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting_for_producer() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut controller = SessionController::new(request(&["market"]), finalizer.clone()).unwrap();
        let (mut sink, rx) = ChannelSink::channel(8);

        let handle = tokio::spawn(async move {
            let mut source = StalledSource;
            controller.run(&mut source, &mut sink).await
        });
        drop(rx);

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("session should stop after disconnect")
            .unwrap();
        assert_eq!(outcome.state(), SessionState::Failed);
        assert!(finalizer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_after_last_snapshot_skips_finalize() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let hung_up = Arc::new(AtomicBool::new(false));
        let mut source = HangUpAtEnd {
            inner: snapshots(vec![json!({"final_trade_decision": "BUY"})]),
            hung_up: hung_up.clone(),
        };
        let mut sink = HangUpSink {
            events: Vec::new(),
            hung_up,
        };

        let mut controller = SessionController::new(request(&["news"]), finalizer.clone()).unwrap();
        let outcome = controller.run(&mut source, &mut sink).await;

        assert!(matches!(
            outcome,
            SessionOutcome::Failed {
                kind: SessionErrorKind::TransportClosed,
                ..
            }
        ));
        assert!(finalizer.calls().is_empty());
        assert!(sink.events.iter().all(|e| !e.is_terminal()));
    }

    #[tokio::test]
    async fn test_sink_gone_after_finalize_still_completes() {
        let finalizer = Arc::new(RecordingFinalizer::default());
        let mut source = snapshots(vec![json!({"final_trade_decision": "HOLD"})]);
        // Room for the Portfolio Manager status only
        let mut sink = LimitedSink {
            events: Vec::new(),
            limit: 1,
        };
        let mut controller = SessionController::new(request(&["news"]), finalizer.clone()).unwrap();
        let outcome = controller.run(&mut source, &mut sink).await;

        assert!(outcome.is_completed());
        assert_eq!(finalizer.calls().len(), 1);
    }
}
