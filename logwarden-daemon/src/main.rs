use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use logwarden_core::config::LogwardenConfig;
use logwarden_daemon::cli::DaemonCli;
use logwarden_daemon::logging::init_tracing;
use logwarden_daemon::orchestrator::{Orchestrator, Role};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DaemonCli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("logwarden-daemon: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: DaemonCli) -> Result<()> {
    let config = load_config(&cli).await?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    let Some(role) = cli.role.clone() else {
        return Err(anyhow::anyhow!(
            "no role given: use `logwarden-daemon server` or `logwarden-daemon agent`"
        ));
    };
    let role = Role::from(role);

    init_tracing(&config.general, &role)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        role = role.name(),
        config = %cli.config.display(),
        "logwarden-daemon starting"
    );

    let orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run(role).await
}

/// Load the config file, then apply environment and CLI overrides (CLI wins).
async fn load_config(cli: &DaemonCli) -> Result<LogwardenConfig> {
    let mut config = LogwardenConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    config.apply_env_overrides();

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(pid_file) = &cli.pid_file {
        config.general.pid_file = pid_file.clone();
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}
