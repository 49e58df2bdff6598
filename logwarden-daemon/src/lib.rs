//! Logwarden daemon library.
//!
//! Exposes internal modules for integration testing.
//! In production, `logwarden-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;

use cli::RoleCommand;
use orchestrator::Role;

impl From<RoleCommand> for Role {
    fn from(command: RoleCommand) -> Self {
        match command {
            RoleCommand::Server => Role::Server,
            RoleCommand::Agent { once } => Role::Agent { once },
        }
    }
}
