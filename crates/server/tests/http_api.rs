//! HTTP API 통합 테스트
//!
//! 실제 리스너에 서버를 띄우고 reqwest로 요청합니다.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::sync::oneshot;

use logwarden_core::config::LogwardenConfig;
use logwarden_core::event::OsType;
use logwarden_server::alert::{AlertMessage, ManualClock};
use logwarden_server::store::AlertKind;
use logwarden_server::{AlertEngine, AppContext, DispatchError, Dispatcher, EventStore, SqliteStore, api};

const API_KEY: &str = "test-key";

struct TestServer {
    base: String,
    ctx: Arc<AppContext>,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(LogwardenConfig::default()).await
    }

    async fn start_with(mut config: LogwardenConfig) -> Self {
        config.server.api_key = API_KEY.to_owned();
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let ctx = AppContext::with_store(config, store);

        let listener = api::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let serve_ctx = ctx.clone();
        let handle = tokio::spawn(async move {
            api::serve(listener, serve_ctx, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            ctx,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .header("api-key", API_KEY)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .header("api-key", API_KEY)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap();
        self.ctx.shutdown().await;
    }
}

fn event_json(id: &str, severity: i64, timestamp: &str) -> Value {
    json!({
        "event_id": id,
        "timestamp": timestamp,
        "source_host": "web-01",
        "os_type": "LINUX",
        "event_type": "LOGIN_FAIL",
        "severity": severity,
        "source_ip": "203.0.113.7",
        "user": "root",
        "raw_message": "sshd[811]: Failed password for root from 203.0.113.7 port 52144 ssh2",
    })
}

/// `count`건의 서로 다른 로그인 실패 이벤트 배치
fn large_batch(count: usize) -> Value {
    let timestamp = now_string();
    let events: Vec<Value> = (0..count)
        .map(|i| event_json(&format!("web-01-bulk-{i:06}"), 3, &timestamp))
        .collect();
    json!({ "events": events })
}

fn now_string() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<AlertMessage>>,
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, message: &AlertMessage) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[tokio::test]
async fn root_and_health_need_no_key() {
    let server = TestServer::start().await;

    let root: Value = reqwest::get(server.url("/")).await.unwrap().json().await.unwrap();
    assert_eq!(root["service"], "logwarden");
    assert_eq!(root["status"], "running");

    let resp = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: Value = resp.json().await.unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"], "connected");

    server.stop().await;
}

#[tokio::test]
async fn missing_key_is_401_and_wrong_key_is_403() {
    let server = TestServer::start().await;

    let missing = server.client.get(server.url("/events")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = server
        .client
        .get(server.url("/events"))
        .header("api-key", "nope")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
    let body: Value = wrong.json().await.unwrap();
    assert!(body["detail"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn resent_batch_is_not_stored_twice() {
    // Given: 응답을 받지 못한 에이전트가 같은 배치를 다시 보냄
    let server = TestServer::start().await;
    let batch = json!({ "events": [event_json("web-01-failed-pwd-1", 3, &now_string())] });

    // When
    let (s1, first) = server.post("/ingest", batch.clone()).await;
    let (s2, second) = server.post("/ingest", batch).await;

    // Then
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(first["events_processed"], 1);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(second["success"], true);
    assert_eq!(second["events_processed"], 0);
    assert!(second["message"].as_str().unwrap().contains("1 duplicates skipped"));

    let (_, events) = server.get("/events").await;
    assert_eq!(events["total_count"], 1);
    assert_eq!(events["count"], 1);

    server.stop().await;
}

#[tokio::test]
async fn schema_violation_rejects_whole_request() {
    let server = TestServer::start().await;
    let batch = json!({ "events": [
        event_json("ok-1", 3, &now_string()),
        event_json("bad-1", 7, &now_string()),
    ]});

    let (status, body) = server.post("/ingest", batch).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap().contains("severity"));

    let mut unknown_type = event_json("bad-2", 3, &now_string());
    unknown_type["event_type"] = json!("ALIEN_INVASION");
    let (status, _) = server.post("/ingest", json!({ "events": [unknown_type] })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = server.post("/ingest", json!({ "rows": [] })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, events) = server.get("/events").await;
    assert_eq!(events["total_count"], 0);

    server.stop().await;
}

#[tokio::test]
async fn event_filters_and_pagination() {
    let server = TestServer::start().await;
    let mut dns = event_json("dns-1", 1, "2025-03-09T08:00:00Z");
    dns["event_type"] = json!("DNS_BLOCK");
    dns["user"] = json!("pihole");
    dns["raw_message"] = json!("Blocked DNS query: ads.example.com");
    let batch = json!({ "events": [
        event_json("a", 3, "2025-03-10T08:00:00Z"),
        event_json("b", 5, "2025-03-10T09:00:00Z"),
        dns,
    ]});
    server.post("/ingest", batch).await;

    let (_, by_sev) = server.get("/events?severity_min=4").await;
    assert_eq!(by_sev["total_count"], 1);
    assert_eq!(by_sev["events"][0]["event_id"], "b");

    let (_, by_text) = server.get("/events?raw_message=ADS.EXAMPLE").await;
    assert_eq!(by_text["total_count"], 1);

    let (_, by_date) = server
        .get("/events?start_date=2025-03-10&end_date=2025-03-10")
        .await;
    assert_eq!(by_date["total_count"], 2);

    let (_, page) = server.get("/events?limit=1&offset=1").await;
    assert_eq!(page["total_count"], 3);
    assert_eq!(page["count"], 1);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["events"][0]["event_id"], "a");

    let (status, _) = server.get("/events?os_type=AMIGA").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn heartbeat_requires_identity_headers() {
    let server = TestServer::start().await;

    let missing = server
        .client
        .post(server.url("/heartbeat"))
        .header("api-key", API_KEY)
        .header("source-host", "quiet-01")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let bad_os = server
        .client
        .post(server.url("/heartbeat"))
        .header("api-key", API_KEY)
        .header("source-host", "quiet-01")
        .header("os-type", "PLAN9")
        .send()
        .await
        .unwrap();
    assert_eq!(bad_os.status(), StatusCode::BAD_REQUEST);

    let ok = server
        .client
        .post(server.url("/heartbeat"))
        .header("api-key", API_KEY)
        .header("source-host", "quiet-01")
        .header("os-type", "LINUX")
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let (_, hosts) = server.get("/hosts").await;
    assert_eq!(hosts["total_active"], 1);
    assert_eq!(hosts["active_hosts"][0]["hostname"], "quiet-01");
    assert_eq!(hosts["active_hosts"][0]["total_events"], 0);

    let (_, events) = server.get("/events").await;
    assert_eq!(events["total_count"], 0);

    server.stop().await;
}

#[tokio::test]
async fn hosts_split_by_threshold() {
    let server = TestServer::start().await;
    let now = Utc::now();
    server
        .ctx
        .store
        .record_heartbeat("web-01", OsType::Linux, now - Duration::minutes(5))
        .await
        .unwrap();
    server
        .ctx
        .store
        .record_heartbeat("db-01", OsType::Linux, now - Duration::minutes(20))
        .await
        .unwrap();

    let (_, hosts) = server.get("/hosts?inactive_threshold=15").await;
    assert_eq!(hosts["threshold_minutes"], 15);
    assert_eq!(hosts["total_active"], 1);
    assert_eq!(hosts["total_inactive"], 1);
    assert_eq!(hosts["inactive_hosts"][0]["hostname"], "db-01");

    let (_, wide) = server.get("/hosts?inactive_threshold=30").await;
    assert_eq!(wide["total_inactive"], 0);

    let (status, _) = server.get("/hosts?inactive_threshold=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn delete_host_removes_rows() {
    let server = TestServer::start().await;
    server
        .post("/ingest", json!({ "events": [event_json("x", 3, &now_string())] }))
        .await;

    let resp = server
        .client
        .delete(server.url("/hosts/web-01"))
        .header("api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let again = server
        .client
        .delete(server.url("/hosts/web-01"))
        .header("api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let (_, hosts) = server.get("/hosts").await;
    assert_eq!(hosts["total_active"], 0);

    server.stop().await;
}

#[tokio::test]
async fn alert_config_updates_are_validated() {
    let server = TestServer::start().await;

    let (_, defaults) = server.get("/alert-config").await;
    assert_eq!(defaults["severity_threshold"], 4);
    assert_eq!(defaults["inactive_threshold_minutes"], 15);
    assert_eq!(defaults["enabled"], true);
    assert_eq!(defaults["quiet_hours"], "");
    assert_eq!(defaults["check_interval_seconds"], 60);

    let (s, _) = server
        .post("/alert-config/severity-threshold", json!({ "value": 5 }))
        .await;
    assert_eq!(s, StatusCode::OK);
    let (s, _) = server
        .post("/alert-config/inactive-threshold", json!({ "value": 45 }))
        .await;
    assert_eq!(s, StatusCode::OK);
    let (s, _) = server
        .post("/alert-config/quiet-hours", json!({ "value": "22:00-06:00" }))
        .await;
    assert_eq!(s, StatusCode::OK);
    let (s, _) = server
        .post("/alert-config/enable", json!({ "value": false }))
        .await;
    assert_eq!(s, StatusCode::OK);

    let (s, _) = server
        .post("/alert-config/severity-threshold", json!({ "value": 9 }))
        .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    let (s, _) = server
        .post("/alert-config/inactive-threshold", json!({ "value": 0 }))
        .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    let (s, _) = server
        .post("/alert-config/quiet-hours", json!({ "value": "late" }))
        .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    let (s, _) = server
        .post("/alert-config/enable", json!({ "value": "yes please" }))
        .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);

    let (_, current) = server.get("/alert-config").await;
    assert_eq!(current["severity_threshold"], 5);
    assert_eq!(current["inactive_threshold_minutes"], 45);
    assert_eq!(current["quiet_hours"], "22:00-06:00");
    assert_eq!(current["enabled"], false);

    server.stop().await;
}

#[tokio::test]
async fn summary_counts_last_day() {
    let server = TestServer::start().await;
    let batch = json!({ "events": [
        event_json("s1", 3, &now_string()),
        event_json("s2", 5, &now_string()),
        event_json("old", 5, "2020-01-01T00:00:00Z"),
    ]});
    server.post("/ingest", batch).await;

    let (status, summary) = server.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_events_24h"], 2);
    assert_eq!(summary["critical_events_24h"], 1);
    assert_eq!(summary["events_by_os"]["LINUX"], 2);
    assert_eq!(summary["top_source_ips"][0]["ip"], "203.0.113.7");
    assert_eq!(summary["top_source_ips"][0]["count"], 2);

    server.stop().await;
}

#[tokio::test]
async fn ingested_critical_event_alerts_once_after_quiet_hours() {
    // Given: 11:00-13:00 조용한 시간, 시계는 12:00
    let server = TestServer::start().await;
    server
        .post("/alert-config/quiet-hours", json!({ "value": "11:00-13:00" }))
        .await;
    server
        .post(
            "/ingest",
            json!({ "events": [event_json("crit-1", 5, &now_string())] }),
        )
        .await;

    let noon = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(noon));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let engine = AlertEngine::builder(server.ctx.event_store())
        .dispatcher(dispatcher.clone())
        .clock(clock.clone())
        .build();

    // When: 구간 안
    let during = engine.run_cycle().await.unwrap();

    // Then: 보류, 기록 없음
    assert_eq!(during.suppressed, 1);
    assert!(
        !server
            .ctx
            .store
            .alert_exists("crit-1", AlertKind::Critical)
            .await
            .unwrap()
    );

    // When: 구간이 끝난 뒤 두 번 폴링
    clock.set(noon + Duration::hours(2));
    let after = engine.run_cycle().await.unwrap();
    let again = engine.run_cycle().await.unwrap();

    // Then: 정확히 한 번
    assert_eq!(after.dispatched, 1);
    assert_eq!(again.dispatched, 0);
    let sent = dispatcher.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].condition_id, "crit-1");

    server.stop().await;
}

#[tokio::test]
async fn ingest_accepts_batch_larger_than_two_megabytes() {
    // Given: 기본 본문 상한(16MB) 서버와 2MB를 넘는 배치
    let server = TestServer::start().await;
    let body = large_batch(9000);
    assert!(serde_json::to_vec(&body).unwrap().len() > 2 * 1024 * 1024);

    // When
    let (status, resp) = server.post("/ingest", body).await;

    // Then
    assert_eq!(status, StatusCode::OK, "{resp}");
    assert_eq!(resp["events_processed"], 9000);
    server.stop().await;
}

#[tokio::test]
async fn ingest_over_body_limit_is_payload_too_large() {
    // Given: 본문 상한 64KB
    let mut config = LogwardenConfig::default();
    config.server.max_body_bytes = 64 * 1024;
    let server = TestServer::start_with(config).await;

    // When
    let (status, resp) = server.post("/ingest", large_batch(250)).await;

    // Then: 스키마 위반(422)이 아니라 413이며 아무것도 저장되지 않음
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(resp["detail"].as_str().unwrap().contains("too large"));
    let (_, events) = server.get("/events").await;
    assert_eq!(events["total_count"], 0);
    server.stop().await;
}
