//! CLI argument definitions for logwarden-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Logwarden security log daemon.
///
/// Runs either the central ingestion server (HTTP API plus alert engine)
/// or the per-host agent that tails logs and ships events.
#[derive(Parser, Debug)]
#[command(name = "logwarden-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logwarden.toml configuration file.
    #[arg(short, long, default_value = "/etc/logwarden/logwarden.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Which component to run.
    #[command(subcommand)]
    pub role: Option<RoleCommand>,
}

/// Component selection.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum RoleCommand {
    /// Run the ingestion server and alert engine.
    Server,
    /// Run the host agent.
    Agent {
        /// Run a single collection cycle and exit.
        #[arg(long)]
        once: bool,
    },
}
