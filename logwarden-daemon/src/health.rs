//! Aggregated health reporting.
//!
//! The overall daemon status is the worst status among its components.
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use logwarden_core::pipeline::HealthStatus;

/// Aggregated health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Worst status of all components.
    pub status: HealthStatus,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// Per-component reports.
    pub components: Vec<ComponentHealth>,
}

/// Health status for one component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    /// Component name (e.g. "agent", "alert-engine").
    pub name: String,
    /// Whether the component is enabled in configuration.
    pub enabled: bool,
    pub status: HealthStatus,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            status,
        }
    }
}

/// Returns the worst status among enabled components.
pub fn aggregate_status(components: &[ComponentHealth]) -> HealthStatus {
    let mut worst = HealthStatus::Healthy;
    let mut reasons = Vec::new();

    for component in components.iter().filter(|c| c.enabled) {
        match &component.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                if !worst.is_unhealthy() {
                    reasons.push(format!("{}: {}", component.name, reason));
                    worst = HealthStatus::Degraded(String::new());
                }
            }
            HealthStatus::Unhealthy(reason) => {
                reasons.push(format!("{}: {}", component.name, reason));
                worst = HealthStatus::Unhealthy(String::new());
            }
        }
    }

    match worst {
        HealthStatus::Healthy => HealthStatus::Healthy,
        HealthStatus::Degraded(_) => HealthStatus::Degraded(reasons.join("; ")),
        HealthStatus::Unhealthy(_) => HealthStatus::Unhealthy(reasons.join("; ")),
    }
}

/// Build a report from component statuses.
pub fn report(components: Vec<ComponentHealth>, uptime_secs: u64) -> DaemonHealth {
    DaemonHealth {
        status: aggregate_status(&components),
        uptime_secs,
        components,
    }
}
