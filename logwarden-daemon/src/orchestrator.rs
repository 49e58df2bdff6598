//! Role orchestration -- assembly, lifecycle and shutdown.
//!
//! The [`Orchestrator`] owns the validated configuration and a shutdown
//! token. It runs one role per process:
//!
//! # Server
//!
//! 1. Open the event store and build the shared `AppContext`
//! 2. Start the alert engine (if `alert.enabled`)
//! 3. Serve the HTTP API until shutdown
//! 4. Stop the engine, then close the connection pool
//!
//! # Agent
//!
//! Build the agent from `[agent]` and run collection cycles until shutdown,
//! or run exactly one cycle with `--once`.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use logwarden_agent::{AgentBuilder, AgentSettings};
use logwarden_core::config::LogwardenConfig;
use logwarden_core::pipeline::Pipeline;
use logwarden_server::alert::dispatcher_from_config;
use logwarden_server::{AlertEngine, AppContext, api};

use crate::health::{self, ComponentHealth, DaemonHealth};
use crate::metrics_server;

/// Interval between periodic health log lines.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Component to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Agent { once: bool },
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Agent { .. } => "agent",
        }
    }
}

/// The daemon orchestrator.
pub struct Orchestrator {
    config: LogwardenConfig,
    shutdown: CancellationToken,
    start_time: Instant,
}

impl Orchestrator {
    /// Load `logwarden.toml`, apply environment overrides and validate.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogwardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: LogwardenConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        Ok(Self {
            config,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Token cancelled when shutdown begins. Cancelling it stops the daemon.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &LogwardenConfig {
        &self.config
    }

    /// Run the role until SIGTERM/SIGINT (or until one cycle finishes for
    /// `agent --once`). Writes and removes the PID file when configured.
    pub async fn run(&self, role: Role) -> Result<()> {
        if self.config.metrics.enabled {
            metrics_server::install_metrics_recorder(&self.config.metrics)?;
            record_daemon_metrics(role);
        }

        let pid_path = (!self.config.general.pid_file.is_empty())
            .then(|| Path::new(&self.config.general.pid_file).to_path_buf());
        if let Some(path) = &pid_path {
            write_pid_file(path)?;
        }

        let signal_task = spawn_signal_watcher(self.shutdown.clone());
        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown.clone()));

        let result = self.run_role(role).await;

        self.shutdown.cancel();
        signal_task.abort();
        if let Some(task) = uptime_task {
            let _ = task.await;
        }
        if let Some(path) = &pid_path {
            remove_pid_file(path);
        }

        if let Err(e) = &result {
            tracing::error!(role = role.name(), error = %e, "daemon exited with error");
        } else {
            tracing::info!(role = role.name(), "daemon shut down");
        }
        result
    }

    /// Run the role until the shutdown token is cancelled.
    pub async fn run_role(&self, role: Role) -> Result<()> {
        match role {
            Role::Server => self.run_server().await,
            Role::Agent { once } => self.run_agent(once).await,
        }
    }

    async fn run_server(&self) -> Result<()> {
        let ctx = AppContext::open(self.config.clone()).await?;
        let listener = api::bind(&self.config.server.bind).await?;

        let mut engine = if self.config.alert.enabled {
            let dispatcher = dispatcher_from_config(&self.config.alert)?;
            let mut engine = AlertEngine::builder(ctx.event_store())
                .dispatcher(dispatcher)
                .interval(Duration::from_secs(self.config.alert.check_interval_secs))
                .recent_limit(self.config.alert.recent_events_limit)
                .build();
            engine.start().await?;
            Some(engine)
        } else {
            tracing::info!("alert engine disabled");
            None
        };

        let token = self.shutdown.clone();
        let mut serve = tokio::spawn(api::serve(listener, Arc::clone(&ctx), async move {
            token.cancelled().await;
        }));

        let mut ticker = tokio::time::interval(HEALTH_LOG_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let serve_result = loop {
            tokio::select! {
                result = &mut serve => break result,
                _ = ticker.tick() => {
                    let mut components = Vec::new();
                    if let Some(engine) = &engine {
                        components.push(ComponentHealth::new("alert-engine", engine.health_check().await));
                    }
                    log_health(&self.health(components));
                }
            }
        };

        // Serving stopped (shutdown or failure); stop the engine either way.
        self.shutdown.cancel();
        if let Some(engine) = engine.as_mut() {
            if let Err(e) = engine.stop().await {
                tracing::error!(error = %e, "failed to stop alert engine");
            }
        }
        ctx.shutdown().await;

        serve_result
            .map_err(|e| anyhow::anyhow!("http server task failed: {}", e))?
            .map_err(Into::into)
    }

    async fn run_agent(&self, once: bool) -> Result<()> {
        let settings = AgentSettings::from_core(&self.config.agent)?;
        let mut agent = AgentBuilder::new(settings).build().await?;

        if once {
            let report = agent.run_cycle().await?;
            tracing::info!(
                lines = report.lines_read,
                events = report.events,
                delivered = report.delivered,
                committed = report.committed,
                "single agent cycle complete"
            );
            return Ok(());
        }

        agent.start().await?;
        let mut ticker = tokio::time::interval(HEALTH_LOG_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let status = agent.health_check().await;
                    log_health(&self.health(vec![ComponentHealth::new("agent", status)]));
                }
            }
        }
        agent.stop().await?;
        Ok(())
    }

    /// Aggregate component statuses into a daemon report.
    pub fn health(&self, components: Vec<ComponentHealth>) -> DaemonHealth {
        health::report(components, self.start_time.elapsed().as_secs())
    }
}

fn log_health(report: &DaemonHealth) {
    if report.status.is_healthy() {
        tracing::debug!(uptime_secs = report.uptime_secs, "daemon healthy");
    } else {
        tracing::warn!(
            status = %report.status,
            uptime_secs = report.uptime_secs,
            "daemon health degraded"
        );
    }
}

/// Cancel `token` on the first SIGTERM or SIGINT.
fn spawn_signal_watcher(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            signal = wait_for_shutdown_signal() => match signal {
                Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            },
            _ = token.cancelled() => return,
        }
        token.cancel();
    })
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("CTRL_C")
}

/// Write the current process PID to a file.
///
/// # Security
///
/// - Uses `create_new(true)` to atomically create the file (no TOCTOU race)
/// - Verifies the created file is a regular file
/// - Creates the parent directory with mode 0o700 and the file with 0o600
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new().mode(0o700).recursive(true).create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_string());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Logs a warning on failure.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to remove PID file"
        );
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Record build info for the running role.
fn record_daemon_metrics(role: Role) {
    use logwarden_core::metrics as m;

    metrics::gauge!(
        m::DAEMON_BUILD_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
        "role" => role.name()
    )
    .set(1.0);

    tracing::debug!(
        role = role.name(),
        version = env!("CARGO_PKG_VERSION"),
        "daemon metrics recorded"
    );
}

/// Periodically update the uptime gauge until `token` is cancelled.
fn spawn_uptime_updater(
    start_time: Instant,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use logwarden_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = token.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
