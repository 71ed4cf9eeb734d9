//! Asks the running engine to adopt freshly published documents.
//!
//! Activation walks a small phase machine: probe liveness first, then try an
//! ordered list of reload strategies until one succeeds or the list runs
//! out. Every probe and reload carries its own timeout; a hung command fails
//! that strategy only, and retries are bounded by the strategy list itself.
//! An engine that is not running is not an error: the published documents
//! stand and the next engine start adopts them.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// One way of asking the engine to reload, tried in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadStrategy {
    pub name: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
}

impl ReloadStrategy {
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineControlError {
    #[error("command '{command}' could not be started: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command '{command}' exceeded its {}ms timeout", timeout.as_millis())]
    TimedOut { command: String, timeout: Duration },
    #[error("command '{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("control channel misconfigured: {0}")]
    Misconfigured(String),
}

/// Command/response channel to the engine. Implementations are mockable so
/// every activation path is testable without a switch process.
#[async_trait]
pub trait EngineControl: Send + Sync {
    /// Liveness probe. `Err` means the probe itself could not run, which is
    /// reported as "engine unreachable" rather than a reload failure.
    async fn is_running(&self) -> Result<bool, EngineControlError>;
    /// Execute one reload strategy against the engine.
    async fn reload(&self, strategy: &ReloadStrategy) -> Result<(), EngineControlError>;
}

/// Control channel that shells out to the engine's CLI, each invocation
/// bounded by a timeout.
#[derive(Debug, Clone)]
pub struct CommandEngineControl {
    probe: Vec<String>,
    timeout: Duration,
}

impl CommandEngineControl {
    pub fn new(probe: Vec<String>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    async fn run_command(&self, command: &[String]) -> Result<(), EngineControlError> {
        let display = command.join(" ");
        let (program, args) = command.split_first().ok_or_else(|| {
            EngineControlError::Misconfigured("empty command line".to_string())
        })?;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(program).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| EngineControlError::TimedOut {
            command: display.clone(),
            timeout: self.timeout,
        })?
        .map_err(|source| EngineControlError::Spawn {
            command: display.clone(),
            source,
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EngineControlError::CommandFailed {
                command: display,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl EngineControl for CommandEngineControl {
    async fn is_running(&self) -> Result<bool, EngineControlError> {
        match self.run_command(&self.probe).await {
            Ok(()) => Ok(true),
            // A clean non-zero exit is the engine saying "not running".
            Err(EngineControlError::CommandFailed { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn reload(&self, strategy: &ReloadStrategy) -> Result<(), EngineControlError> {
        self.run_command(&strategy.command).await
    }
}

/// Phases the controller moves through during one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPhase {
    Unknown,
    CheckingLiveness,
    NotRunning,
    Running,
    Reloaded,
    ReloadFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: String,
    pub error: String,
}

/// Terminal result of one activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ActivationOutcome {
    /// The engine adopted the new documents.
    Reloaded { strategy: String },
    /// Documents are in place but the engine is down or unreachable; the
    /// next engine start picks them up.
    PendingActivation { reason: String },
    /// The engine is up but every reload strategy failed.
    Failed { attempts: Vec<StrategyAttempt> },
}

impl fmt::Display for ActivationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reloaded { strategy } => write!(f, "reloaded via '{strategy}'"),
            Self::PendingActivation { reason } => write!(f, "pending activation: {reason}"),
            Self::Failed { attempts } => {
                write!(f, "all {} reload strategies failed", attempts.len())
            }
        }
    }
}

pub struct ReloadController {
    engine: Arc<dyn EngineControl>,
    strategies: Vec<ReloadStrategy>,
}

impl ReloadController {
    pub fn new(engine: Arc<dyn EngineControl>, strategies: Vec<ReloadStrategy>) -> Self {
        Self { engine, strategies }
    }

    /// Probe the engine and, if it is running, walk the strategy list.
    pub async fn activate(&self) -> ActivationOutcome {
        let mut phase = ReloadPhase::Unknown;
        debug!(?phase, "starting activation");

        phase = ReloadPhase::CheckingLiveness;
        debug!(?phase, "probing engine liveness");
        let running = match self.engine.is_running().await {
            Ok(running) => running,
            Err(err) => {
                warn!(error = %err, "engine liveness probe failed");
                return ActivationOutcome::PendingActivation {
                    reason: format!("liveness probe failed: {err}"),
                };
            }
        };

        if !running {
            phase = ReloadPhase::NotRunning;
            debug!(?phase, "engine not running; documents await next start");
            return ActivationOutcome::PendingActivation {
                reason: "engine is not running; documents will be adopted at next start"
                    .to_string(),
            };
        }

        phase = ReloadPhase::Running;
        let mut attempts = Vec::new();
        for strategy in &self.strategies {
            debug!(?phase, strategy = %strategy.name, "attempting reload");
            match self.engine.reload(strategy).await {
                Ok(()) => {
                    info!(strategy = %strategy.name, "engine reloaded");
                    return ActivationOutcome::Reloaded {
                        strategy: strategy.name.clone(),
                    };
                }
                Err(err) => {
                    warn!(strategy = %strategy.name, error = %err, "reload strategy failed");
                    attempts.push(StrategyAttempt {
                        strategy: strategy.name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        debug!(phase = ?ReloadPhase::ReloadFailed, "strategy list exhausted");
        ActivationOutcome::Failed { attempts }
    }
}
