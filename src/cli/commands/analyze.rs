//! Analyze Command
//!
//! Runs one analysis session and streams its events to stdout as JSON lines.
//!
//! Snapshots come from the configured pipeline executable, or from a
//! recorded JSONL file when `--snapshots` is given.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::producer::{CommandSnapshotSource, JsonlSnapshotSource, SnapshotSource};
use crate::storage::AnalysisStore;
use crate::tracker::{
    AnalysisRequest, ChannelSink, SessionController, SessionEvent, SessionOutcome,
};
use crate::types::{PulseError, Result};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub ticker: String,
    pub date: String,
    /// Comma-separated analyst keys; config defaults when absent
    pub analysts: Option<String>,
    pub user: i64,
    /// Replay a recorded snapshot stream instead of spawning the pipeline
    pub snapshots: Option<PathBuf>,
    /// Echo stage transitions to stderr
    pub show_progress: bool,
}

pub async fn run(ctx: &CommandContext, options: AnalyzeOptions) -> Result<SessionOutcome> {
    run_with_writer(ctx, options, tokio::io::stdout()).await
}

async fn run_with_writer<W>(
    ctx: &CommandContext,
    options: AnalyzeOptions,
    writer: W,
) -> Result<SessionOutcome>
where
    W: AsyncWrite + Unpin + Send,
{
    let request = build_request(ctx, &options)?;
    let finalizer = Arc::new(AnalysisStore::new(ctx.db.clone()));
    let mut controller = SessionController::new(request.clone(), finalizer)?;
    debug!(session = controller.session_id(), "Session created");

    let mut source = open_source(ctx, &options, &request).await?;
    let (sink, rx) = ChannelSink::channel(ctx.config.session.event_buffer);

    let session = async move {
        let mut sink = sink;
        // sink drops here, which ends the printer
        controller.run(source.as_mut(), &mut sink).await
    };
    let printer = print_events(rx, writer, options.show_progress);

    let (outcome, printed) = futures::join!(session, printer);
    if let Err(e) = printed {
        warn!("Event output stopped early: {}", e);
    }
    Ok(outcome)
}

fn build_request(ctx: &CommandContext, options: &AnalyzeOptions) -> Result<AnalysisRequest> {
    let ticker = options.ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(PulseError::InvalidConfiguration(
            "ticker must not be empty".to_string(),
        ));
    }

    NaiveDate::parse_from_str(&options.date, "%Y-%m-%d").map_err(|_| {
        PulseError::InvalidConfiguration(format!(
            "Invalid date '{}'. Expected YYYY-MM-DD",
            options.date
        ))
    })?;

    let analysts = match &options.analysts {
        Some(csv) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => ctx.config.session.default_analysts.clone(),
    };

    Ok(AnalysisRequest {
        owner: options.user,
        ticker,
        date: options.date.clone(),
        analysts,
    })
}

async fn open_source(
    ctx: &CommandContext,
    options: &AnalyzeOptions,
    request: &AnalysisRequest,
) -> Result<Box<dyn SnapshotSource>> {
    match &options.snapshots {
        Some(path) => {
            let file = tokio::fs::File::open(path).await.map_err(|e| {
                PulseError::producer(format!("cannot open {}: {}", path.display(), e))
            })?;
            debug!(path = %path.display(), "Replaying recorded snapshots");
            Ok(Box::new(JsonlSnapshotSource::new(BufReader::new(file))))
        }
        None => Ok(Box::new(CommandSnapshotSource::spawn(
            &ctx.config.producer,
            request,
        )?)),
    }
}

/// Write each event as one JSON line. Returning early drops the receiver,
/// which the controller sees as a disconnect.
async fn print_events<W>(
    mut rx: mpsc::Receiver<SessionEvent>,
    mut writer: W,
    show_progress: bool,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let progress = show_progress.then(Output::stderr);

    while let Some(event) = rx.recv().await {
        if let (Some(out), SessionEvent::Status { agent, status }) = (&progress, &event) {
            out.stage(agent, *status);
        }

        let mut line = event.to_json()?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
