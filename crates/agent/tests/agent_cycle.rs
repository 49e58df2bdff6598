//! 에이전트 주기 통합 테스트
//!
//! axum 목 서버를 띄워 실제 HTTP 전송, 커서 커밋, 로테이션, 하트비트를 검증합니다.

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use logwarden_agent::{AgentBuilder, AgentSettings, OffsetStore};
use logwarden_core::event::{Event, EventType, Severity};

/// 이미 처리된 120바이트 구간
const COMMITTED_PREFIX: &str = concat!(
    "Mar 10 11:00:00 web-01 CRON[2211]: (root) CMD (run-parts /etc/cron.hourly)\n",
    "Mar 10 11:00:01 web-01 kernel: eth0 link up.\n",
);

/// 새로 추가되는 220바이트 구간 (로그인 실패 2건과 빈 줄 1개)
const NEW_LINES: &str = concat!(
    "Mar 10 11:58:01 web-01 sshd[1042]: Failed password for root from 198.51.100.7 port 52311 ssh2\n",
    "\n",
    "Mar 10 11:58:09 web-01 sshd[10433]: Failed password for invalid user oracle from 198.51.100.7 port 52312 ssh2 [preauth] ptys\n",
);

#[derive(Deserialize)]
struct IngestBody {
    events: Vec<Event>,
}

#[derive(Default)]
struct MockServer {
    batches: Mutex<Vec<Vec<Event>>>,
    heartbeats: Mutex<Vec<(String, String)>>,
    ingest_fails: AtomicBool,
    heartbeat_fails: AtomicBool,
    api_key_misses: AtomicU32,
    /// 0이 아니면 이보다 큰 배치를 413으로 거부
    max_batch: AtomicUsize,
}

async fn ingest(
    State(server): State<Arc<MockServer>>,
    headers: HeaderMap,
    Json(body): Json<IngestBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if headers.get("api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        server.api_key_misses.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "missing api key" })));
    }
    if server.ingest_fails.load(Ordering::Relaxed) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "detail": "database unavailable" })),
        );
    }
    let count = body.events.len();
    let max_batch = server.max_batch.load(Ordering::Relaxed);
    if max_batch > 0 && count > max_batch {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({ "detail": "request body too large" })),
        );
    }
    server.batches.lock().await.push(body.events);
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": format!("Processed {count} events"),
            "events_processed": count,
        })),
    )
}

async fn heartbeat(State(server): State<Arc<MockServer>>, headers: HeaderMap) -> StatusCode {
    if server.heartbeat_fails.load(Ordering::Relaxed) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    };
    server
        .heartbeats
        .lock()
        .await
        .push((header("source-host"), header("os-type")));
    StatusCode::OK
}

async fn spawn_server() -> (SocketAddr, Arc<MockServer>) {
    let server = Arc::new(MockServer::default());
    let app = Router::new()
        .route("/ingest", post(ingest))
        .route("/heartbeat", post(heartbeat))
        .with_state(Arc::clone(&server));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, server)
}

fn settings(addr: SocketAddr, log_path: &Path, state_path: &Path) -> AgentSettings {
    AgentSettings {
        server_url: format!("http://{addr}"),
        api_key: "test-key".to_owned(),
        source_host: "web-01".to_owned(),
        log_files: vec![log_path.to_path_buf()],
        state_file: state_path.to_path_buf(),
        request_timeout: Duration::from_secs(5),
        heartbeat_timeout: Duration::from_secs(5),
        ..AgentSettings::default()
    }
}

fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

fn source_key(path: &Path) -> String {
    path.display().to_string()
}

async fn committed_offset(state_path: &Path, log_path: &PathBuf) -> u64 {
    OffsetStore::load(state_path, std::slice::from_ref(log_path))
        .await
        .get(&source_key(log_path))
}

#[tokio::test]
async fn growing_source_delivers_failed_logins_and_commits_cursor() {
    // Given: 120바이트까지 커밋된 소스에 220바이트가 추가됨
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    append(&log_path, COMMITTED_PREFIX);
    assert_eq!(std::fs::metadata(&log_path).unwrap().len(), 120);
    std::fs::write(
        &state_path,
        json!({ source_key(&log_path): 120 }).to_string(),
    )
    .unwrap();
    append(&log_path, NEW_LINES);
    assert_eq!(std::fs::metadata(&log_path).unwrap().len(), 340);

    let (addr, server) = spawn_server().await;
    let agent = AgentBuilder::new(settings(addr, &log_path, &state_path))
        .build()
        .await
        .unwrap();

    // When
    let report = agent.run_cycle().await.unwrap();

    // Then: 빈 줄은 버려지고 로그인 실패 2건이 심각도 3으로 전송됨
    assert_eq!(report.lines_read, 3);
    assert_eq!(report.events, 2);
    assert!(report.delivered);
    assert!(report.committed);

    let batches = server.batches.lock().await;
    assert_eq!(batches.len(), 1);
    let events = &batches[0];
    assert!(events.iter().all(|e| e.event_type == EventType::LoginFail));
    assert!(events.iter().all(|e| e.severity == Severity::MEDIUM));
    assert_eq!(events[0].user, "root");
    assert_eq!(events[1].user, "oracle");
    assert!(events.iter().all(|e| e.source_ip == "198.51.100.7"));

    assert_eq!(committed_offset(&state_path, &log_path).await, 340);
}

#[tokio::test]
async fn rotated_source_is_read_from_start() {
    // Given: 커서가 340인 상태에서 파일이 80바이트로 교체됨
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    std::fs::write(
        &state_path,
        json!({ source_key(&log_path): 340 }).to_string(),
    )
    .unwrap();
    let rotated =
        "Mar 10 12:00:00 web-01 sshd[7]: Invalid user guest from 203.0.113.4 port 4000\n";
    append(&log_path, rotated);
    let rotated_len = std::fs::metadata(&log_path).unwrap().len();
    assert!(rotated_len < 340);

    let (addr, server) = spawn_server().await;
    let agent = AgentBuilder::new(settings(addr, &log_path, &state_path))
        .build()
        .await
        .unwrap();

    // When
    let report = agent.run_cycle().await.unwrap();

    // Then: 처음부터 다시 읽고 커서는 새 파일 끝으로 이동
    assert_eq!(report.lines_read, 1);
    assert_eq!(report.events, 1);
    assert_eq!(server.batches.lock().await[0][0].user, "guest");
    assert_eq!(committed_offset(&state_path, &log_path).await, rotated_len);
}

#[tokio::test]
async fn cursor_is_not_committed_until_server_acknowledges() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    append(&log_path, NEW_LINES);

    let (addr, server) = spawn_server().await;
    server.ingest_fails.store(true, Ordering::Relaxed);
    let agent = AgentBuilder::new(settings(addr, &log_path, &state_path))
        .build()
        .await
        .unwrap();

    // When: 서버가 503을 반환
    let failed = agent.run_cycle().await.unwrap();

    // Then: 커서는 그대로
    assert!(!failed.delivered);
    assert!(!failed.committed);
    assert_eq!(committed_offset(&state_path, &log_path).await, 0);
    assert_eq!(agent.consecutive_failures(), 1);

    // When: 서버가 복구됨
    server.ingest_fails.store(false, Ordering::Relaxed);
    let recovered = agent.run_cycle().await.unwrap();

    // Then: 같은 구간을 다시 보내고 커서가 커밋됨
    assert!(recovered.delivered);
    assert_eq!(recovered.events, 2);
    let size = std::fs::metadata(&log_path).unwrap().len();
    assert_eq!(committed_offset(&state_path, &log_path).await, size);
    assert_eq!(agent.consecutive_failures(), 0);
}

#[tokio::test]
async fn quiet_cycle_sends_heartbeat_with_identity() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    append(&log_path, COMMITTED_PREFIX);

    let (addr, server) = spawn_server().await;
    let agent = AgentBuilder::new(settings(addr, &log_path, &state_path))
        .build()
        .await
        .unwrap();

    let report = agent.run_cycle().await.unwrap();

    assert_eq!(report.events, 0);
    assert!(report.heartbeat_sent);
    assert!(server.batches.lock().await.is_empty());
    let heartbeats = server.heartbeats.lock().await;
    assert_eq!(
        heartbeats.as_slice(),
        &[("web-01".to_owned(), "LINUX".to_owned())]
    );
    assert_eq!(committed_offset(&state_path, &log_path).await, 120);
}

#[tokio::test]
async fn failed_heartbeat_does_not_block_commit() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    append(&log_path, COMMITTED_PREFIX);

    let (addr, server) = spawn_server().await;
    server.heartbeat_fails.store(true, Ordering::Relaxed);
    let agent = AgentBuilder::new(settings(addr, &log_path, &state_path))
        .build()
        .await
        .unwrap();

    let report = agent.run_cycle().await.unwrap();

    assert!(!report.heartbeat_sent);
    assert!(report.committed);
    assert_eq!(committed_offset(&state_path, &log_path).await, 120);
}

#[tokio::test]
async fn legacy_single_cursor_state_is_migrated_to_first_source() {
    // Given: 구형식 상태 파일
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    append(&log_path, COMMITTED_PREFIX);
    append(&log_path, NEW_LINES);
    std::fs::write(&state_path, r#"{"last_position": 120}"#).unwrap();

    let (addr, server) = spawn_server().await;
    let agent = AgentBuilder::new(settings(addr, &log_path, &state_path))
        .build()
        .await
        .unwrap();

    // When
    let report = agent.run_cycle().await.unwrap();

    // Then: 120 이후만 읽고 새 형식으로 저장됨
    assert_eq!(report.events, 2);
    assert_eq!(server.batches.lock().await[0].len(), 2);
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(saved[source_key(&log_path)], 340);
    assert!(saved.get("last_position").is_none());
}

#[tokio::test]
async fn wrong_api_key_is_delivery_failure() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    append(&log_path, NEW_LINES);

    let (addr, server) = spawn_server().await;
    let mut settings = settings(addr, &log_path, &state_path);
    settings.api_key = "wrong".to_owned();
    let agent = AgentBuilder::new(settings).build().await.unwrap();

    let report = agent.run_cycle().await.unwrap();

    assert!(!report.delivered);
    assert_eq!(server.api_key_misses.load(Ordering::Relaxed), 1);
    assert!(!state_path.exists());
}

fn backlog(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            format!(
                "Mar 10 10:{:02}:{:02} web-01 sshd[{}]: Failed password for root from 203.0.113.9 port {} ssh2\n",
                i / 60,
                i % 60,
                3000 + i,
                40000 + i
            )
        })
        .collect()
}

#[tokio::test]
async fn backlog_is_split_into_bounded_batches_before_commit() {
    // Given: 25건이 밀린 소스, 요청당 10건까지만 받는 서버
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    append(&log_path, &backlog(25));
    let size = std::fs::metadata(&log_path).unwrap().len();

    let (addr, server) = spawn_server().await;
    server.max_batch.store(10, Ordering::Relaxed);
    let mut settings = settings(addr, &log_path, &state_path);
    settings.max_batch_events = 10;
    let agent = AgentBuilder::new(settings).build().await.unwrap();

    // When
    let report = agent.run_cycle().await.unwrap();

    // Then: 10 + 10 + 5로 나뉘어 모두 확인된 뒤 커밋됨
    assert_eq!(report.events, 25);
    assert_eq!(report.batches, 3);
    assert_eq!(report.events_processed, 25);
    assert!(report.committed);
    let sizes: Vec<usize> = server.batches.lock().await.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(committed_offset(&state_path, &log_path).await, size);
}

#[tokio::test]
async fn rejected_batch_leaves_cursor_uncommitted() {
    // Given: 배치 상한이 서버 한도보다 큼
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("auth.log");
    let state_path = dir.path().join("state.json");
    append(&log_path, &backlog(25));

    let (addr, server) = spawn_server().await;
    server.max_batch.store(10, Ordering::Relaxed);
    let mut settings = settings(addr, &log_path, &state_path);
    settings.max_batch_events = 20;
    let agent = AgentBuilder::new(settings).build().await.unwrap();

    // When
    let report = agent.run_cycle().await.unwrap();

    // Then: 413은 전송 실패이며 커서는 그대로
    assert!(!report.delivered);
    assert!(!report.committed);
    assert!(server.batches.lock().await.is_empty());
    assert_eq!(committed_offset(&state_path, &log_path).await, 0);
}
