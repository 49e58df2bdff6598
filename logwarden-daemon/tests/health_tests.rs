//! Health aggregation tests.

use logwarden_core::pipeline::HealthStatus;
use logwarden_daemon::health::{ComponentHealth, aggregate_status, report};

#[test]
fn test_aggregate_status_all_healthy() {
    // Given: All components are healthy
    let components = vec![
        ComponentHealth::new("agent", HealthStatus::Healthy),
        ComponentHealth::new("alert-engine", HealthStatus::Healthy),
    ];

    // When / Then
    assert!(aggregate_status(&components).is_healthy());
}

#[test]
fn test_aggregate_status_one_degraded() {
    // Given: One component is degraded
    let components = vec![
        ComponentHealth::new("agent", HealthStatus::Degraded("3 consecutive delivery failures".to_string())),
        ComponentHealth::new("alert-engine", HealthStatus::Healthy),
    ];

    // When
    let status = aggregate_status(&components);

    // Then: Degraded with the component name in the reason
    match status {
        HealthStatus::Degraded(reason) => {
            assert!(reason.contains("agent"), "reason should name component: {}", reason);
            assert!(reason.contains("delivery failures"));
        }
        other => panic!("expected Degraded, got {:?}", other),
    }
}

#[test]
fn test_aggregate_status_unhealthy_wins() {
    let components = vec![
        ComponentHealth::new("agent", HealthStatus::Degraded("slow".to_string())),
        ComponentHealth::new("alert-engine", HealthStatus::Unhealthy("stopped".to_string())),
    ];

    let status = aggregate_status(&components);
    assert!(status.is_unhealthy());
    assert!(status.to_string().contains("alert-engine: stopped"));
}

#[test]
fn test_disabled_components_are_ignored() {
    let mut disabled = ComponentHealth::new("alert-engine", HealthStatus::Unhealthy("not started".to_string()));
    disabled.enabled = false;

    assert!(aggregate_status(&[disabled]).is_healthy());
}

#[test]
fn test_empty_component_list_is_healthy() {
    assert!(aggregate_status(&[]).is_healthy());
}

#[test]
fn test_report_serializes() {
    let health = report(
        vec![ComponentHealth::new("agent", HealthStatus::Healthy)],
        42,
    );
    let json = serde_json::to_value(&health).expect("should serialize");
    assert_eq!(json["uptime_secs"], 42);
    assert_eq!(json["status"]["status"], "healthy");
    assert_eq!(json["components"][0]["name"], "agent");
}
