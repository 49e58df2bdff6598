//! Tracing setup for the daemon.
//!
//! The filter is built from `general.log_level` plus a small set of
//! per-role directives that keep dependency chatter (sqlx statement logs,
//! hyper connection events, reqwest pool churn) at `warn` unless
//! `RUST_LOG` says otherwise.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logwarden_core::config::GeneralConfig;

use crate::orchestrator::Role;

/// Dependency targets capped at `warn` for the server role.
const SERVER_QUIET_TARGETS: &[&str] = &["sqlx", "hyper", "hyper_util", "tower"];

/// Dependency targets capped at `warn` for the agent role.
const AGENT_QUIET_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util", "rustls"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: &str, role: &Role) -> String {
    let quiet = match role {
        Role::Server => SERVER_QUIET_TARGETS,
        Role::Agent { .. } => AGENT_QUIET_TARGETS,
    };
    let mut directives = vec![level.to_owned()];
    directives.extend(quiet.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Install the global subscriber. Call once, before the role starts.
pub fn init_tracing(config: &GeneralConfig, role: &Role) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.log_level, role))
            .with_context(|| format!("invalid log level '{}'", config.log_level))?,
    };
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
            .context("failed to install json tracing subscriber")?,
        "pretty" => registry
            .with(fmt::layer().pretty())
            .try_init()
            .context("failed to install pretty tracing subscriber")?,
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    }
    Ok(())
}
