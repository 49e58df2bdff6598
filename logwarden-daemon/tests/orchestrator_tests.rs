//! End-to-end tests: the server role serves the API while the agent role
//! ships events from a log file to it.

use std::time::Duration;

use serde_json::Value;

use logwarden_core::config::LogwardenConfig;
use logwarden_daemon::orchestrator::{Orchestrator, Role};

const API_KEY: &str = "e2e-key";

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("should bind ephemeral port")
        .local_addr()
        .expect("should have local addr")
        .port()
}

fn server_config(port: u16, dir: &std::path::Path) -> LogwardenConfig {
    let mut config = LogwardenConfig::default();
    config.server.bind = format!("127.0.0.1:{port}");
    config.server.database_path = dir.join("events.db").display().to_string();
    config.server.api_key = API_KEY.to_owned();
    config.alert.check_interval_secs = 1;
    config
}

async fn wait_until_healthy(base: &str) {
    for _ in 0..100 {
        if let Ok(resp) = reqwest::get(format!("{base}/health")).await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server at {base} did not become healthy");
}

async fn get_json(base: &str, path: &str) -> Value {
    reqwest::Client::new()
        .get(format!("{base}{path}"))
        .header("api-key", API_KEY)
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("response should be JSON")
}

#[tokio::test]
async fn test_server_role_stops_on_shutdown_token() {
    // Given: A server orchestrator on a free port
    let dir = tempfile::tempdir().expect("should create temp dir");
    let port = free_port();
    let orchestrator =
        Orchestrator::build_from_config(server_config(port, dir.path())).expect("should build");
    let token = orchestrator.shutdown_token();
    let task = tokio::spawn(async move { orchestrator.run_role(Role::Server).await });

    let base = format!("http://127.0.0.1:{port}");
    wait_until_healthy(&base).await;

    // When: Shutdown is requested
    token.cancel();

    // Then: The role returns cleanly
    let result = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("server should stop promptly")
        .expect("task should not panic");
    assert!(result.is_ok(), "server role failed: {:?}", result.err());
}

#[tokio::test]
async fn test_agent_once_delivers_to_server() {
    // Given: A running server
    let dir = tempfile::tempdir().expect("should create temp dir");
    let port = free_port();
    let server =
        Orchestrator::build_from_config(server_config(port, dir.path())).expect("should build");
    let token = server.shutdown_token();
    let server_task = tokio::spawn(async move { server.run_role(Role::Server).await });
    let base = format!("http://127.0.0.1:{port}");
    wait_until_healthy(&base).await;

    // And: A log file with two failed logins and one unrelated line
    let log_path = dir.path().join("auth.log");
    std::fs::write(
        &log_path,
        "Mar 10 12:00:01 web-01 sshd[811]: Failed password for root from 203.0.113.7 port 52144 ssh2\n\
         Mar 10 12:00:05 web-01 sshd[812]: Failed password for admin from 203.0.113.8 port 52150 ssh2\n\
         Mar 10 12:00:09 web-01 CRON[900]: pam_unix(cron:session): session opened for user backup\n",
    )
    .expect("should write log file");

    let mut agent_config = LogwardenConfig::default();
    agent_config.agent.server_url = base.clone();
    agent_config.agent.api_key = API_KEY.to_owned();
    agent_config.agent.source_host = "web-01".to_owned();
    agent_config.agent.log_files = vec![log_path.display().to_string()];
    agent_config.agent.state_file = dir.path().join("agent.state").display().to_string();
    let agent = Orchestrator::build_from_config(agent_config).expect("should build agent");

    // When: One agent cycle runs
    agent
        .run_role(Role::Agent { once: true })
        .await
        .expect("agent cycle should succeed");

    // Then: Both failed logins are stored and the host is active
    let events = get_json(&base, "/events?event_type=LOGIN_FAIL").await;
    assert_eq!(events["total_count"], 2);

    let hosts = get_json(&base, "/hosts").await;
    assert_eq!(hosts["total_active"], 1);
    assert_eq!(hosts["active_hosts"][0]["hostname"], "web-01");

    // And: A second cycle re-reads nothing new
    agent
        .run_role(Role::Agent { once: true })
        .await
        .expect("second cycle should succeed");
    let again = get_json(&base, "/events").await;
    assert_eq!(again["total_count"], events["total_count"]);

    token.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(10), server_task).await;
}
