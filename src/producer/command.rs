//! Pipeline Subprocess Source
//!
//! Runs the configured pipeline executable and reads snapshots from its
//! stdout as JSON lines. Credentials reach the child through its own
//! environment only; the parent process environment is never touched.

use std::process::Stdio;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{JsonlSnapshotSource, SnapshotSource};
use crate::config::ProducerConfig;
use crate::tracker::{AnalysisRequest, Snapshot};
use crate::types::{PulseError, Result};

const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
const FINNHUB_KEY_ENV: &str = "FINNHUB_API_KEY";

/// Credentials held only for the lifetime of the spawn
struct ProducerSecrets {
    openai_api_key: Option<SecretString>,
    finnhub_api_key: Option<SecretString>,
}

impl ProducerSecrets {
    fn from_config(config: &ProducerConfig) -> Self {
        Self {
            openai_api_key: config.openai_api_key.clone().map(SecretString::from),
            finnhub_api_key: config.finnhub_api_key.clone().map(SecretString::from),
        }
    }

    fn apply(&self, cmd: &mut Command) {
        if let Some(key) = &self.openai_api_key {
            cmd.env(OPENAI_KEY_ENV, key.expose_secret());
        }
        if let Some(key) = &self.finnhub_api_key {
            cmd.env(FINNHUB_KEY_ENV, key.expose_secret());
        }
    }
}

pub struct CommandSnapshotSource {
    program: String,
    child: Child,
    stdout: JsonlSnapshotSource<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl CommandSnapshotSource {
    /// Spawn the pipeline for `request`.
    pub fn spawn(config: &ProducerConfig, request: &AnalysisRequest) -> Result<Self> {
        let settings = serde_json::to_string(&config.pipeline_settings())?;

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .arg("--ticker")
            .arg(&request.ticker)
            .arg("--date")
            .arg(&request.date)
            .arg("--analysts")
            .arg(request.analysts.join(","))
            .arg("--config")
            .arg(&settings)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        ProducerSecrets::from_config(config).apply(&mut cmd);

        debug!(command = %config.command, %settings, "Spawning pipeline");
        let mut child = cmd.spawn().map_err(|e| {
            PulseError::producer(format!(
                "Failed to spawn pipeline '{}': {}. Is it installed?",
                config.command, e
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PulseError::producer("pipeline stdout not captured"))?;
        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = String::new();
                if let Err(e) = pipe.read_to_string(&mut buf).await {
                    warn!("Failed to read pipeline stderr: {}", e);
                }
                buf
            })
        });

        info!(command = %config.command, ticker = %request.ticker, "Pipeline started");
        Ok(Self {
            program: config.command.clone(),
            child,
            stdout: JsonlSnapshotSource::new(BufReader::new(stdout)),
            stderr,
            finished: false,
        })
    }

    /// Wait for the child after stdout closed and check its exit status
    async fn reap(&mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| PulseError::producer(format!("wait on '{}' failed: {}", self.program, e)))?;

        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            debug!(program = %self.program, "Pipeline exited cleanly");
            return Ok(());
        }

        let detail = if stderr.trim().is_empty() {
            format!("'{}' exited with {}", self.program, status)
        } else {
            format!("'{}' exited with {}: {}", self.program, status, stderr.trim())
        };
        Err(PulseError::producer(detail))
    }
}

#[async_trait]
impl SnapshotSource for CommandSnapshotSource {
    async fn next_snapshot(&mut self) -> Result<Option<Snapshot>> {
        if self.finished {
            return Ok(None);
        }
        match self.stdout.next_snapshot().await? {
            Some(snapshot) => Ok(Some(snapshot)),
            None => {
                self.finished = true;
                self.reap().await.map(|_| None)
            }
        }
    }
}
