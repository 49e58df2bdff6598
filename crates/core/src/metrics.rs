//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logwarden_`
//! - 컴포넌트명: `agent_`, `ingest_`, `alert_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logwarden_core::metrics::AGENT_LINES_READ_TOTAL).increment(12);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// OS 유형 레이블 키 (WINDOWS, LINUX, ...)
pub const LABEL_OS_TYPE: &str = "os_type";

/// 알림 종류 레이블 키 (critical, host_down)
pub const LABEL_ALERT_KIND: &str = "kind";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Agent 메트릭 ──────────────────────────────────────────────────

/// Agent: 소스에서 읽은 라인 수 (counter)
pub const AGENT_LINES_READ_TOTAL: &str = "logwarden_agent_lines_read_total";

/// Agent: 분류되어 이벤트가 된 라인 수 (counter, label: os_type)
pub const AGENT_EVENTS_CLASSIFIED_TOTAL: &str = "logwarden_agent_events_classified_total";

/// Agent: 세션 중복 캐시에 걸러진 라인 수 (counter)
pub const AGENT_DEDUP_HITS_TOTAL: &str = "logwarden_agent_dedup_hits_total";

/// Agent: 배치 전송 결과 (counter, label: result)
pub const AGENT_DELIVERIES_TOTAL: &str = "logwarden_agent_deliveries_total";

/// Agent: 하트비트 전송 결과 (counter, label: result)
pub const AGENT_HEARTBEATS_TOTAL: &str = "logwarden_agent_heartbeats_total";

/// Agent: 한 수집 주기 소요 시간 (histogram, 초)
pub const AGENT_CYCLE_DURATION_SECONDS: &str = "logwarden_agent_cycle_duration_seconds";

// ─── Ingestion 메트릭 ──────────────────────────────────────────────

/// Ingest: 새로 저장된 이벤트 수 (counter)
pub const INGEST_EVENTS_STORED_TOTAL: &str = "logwarden_ingest_events_stored_total";

/// Ingest: 중복으로 거부된 이벤트 수 (counter)
pub const INGEST_DUPLICATES_TOTAL: &str = "logwarden_ingest_duplicates_total";

/// Ingest: 스키마 검증 실패로 거부된 요청 수 (counter)
pub const INGEST_REJECTED_REQUESTS_TOTAL: &str = "logwarden_ingest_rejected_requests_total";

/// Ingest: 수신한 하트비트 수 (counter)
pub const INGEST_HEARTBEATS_TOTAL: &str = "logwarden_ingest_heartbeats_total";

// ─── Alert 메트릭 ──────────────────────────────────────────────────

/// Alert: 디스패치 성공 수 (counter, label: kind)
pub const ALERT_DISPATCHED_TOTAL: &str = "logwarden_alert_dispatched_total";

/// Alert: 조용한 시간대로 보류된 수 (counter, label: kind)
pub const ALERT_SUPPRESSED_TOTAL: &str = "logwarden_alert_suppressed_total";

/// Alert: 디스패치 실패 수 (counter, label: kind)
pub const ALERT_DISPATCH_FAILURES_TOTAL: &str = "logwarden_alert_dispatch_failures_total";

/// Alert: 활성 호스트 수 (gauge)
pub const ALERT_ACTIVE_HOSTS: &str = "logwarden_alert_active_hosts";

/// Alert: 비활성 호스트 수 (gauge)
pub const ALERT_INACTIVE_HOSTS: &str = "logwarden_alert_inactive_hosts";

// ─── Daemon 메트릭 ─────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logwarden_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version, role)
pub const DAEMON_BUILD_INFO: &str = "logwarden_daemon_build_info";

// ─── 히스토그램 버킷 ───────────────────────────────────────────────

/// 수집 주기 소요 시간 버킷 (초)
///
/// 1ms ~ 30s 범위 (네트워크 타임아웃 포함)
pub const CYCLE_DURATION_BUCKETS: [f64; 9] = [0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Agent
    describe_counter!(
        AGENT_LINES_READ_TOTAL,
        "Total number of raw lines read from all monitored sources"
    );
    describe_counter!(
        AGENT_EVENTS_CLASSIFIED_TOTAL,
        "Total number of lines classified into security events"
    );
    describe_counter!(
        AGENT_DEDUP_HITS_TOTAL,
        "Total number of lines skipped by the session dedup cache"
    );
    describe_counter!(
        AGENT_DELIVERIES_TOTAL,
        "Event batch deliveries to the ingestion service by result"
    );
    describe_counter!(
        AGENT_HEARTBEATS_TOTAL,
        "Heartbeats sent to the ingestion service by result"
    );
    describe_histogram!(
        AGENT_CYCLE_DURATION_SECONDS,
        "Time to complete one read/classify/deliver cycle in seconds"
    );

    // Ingestion
    describe_counter!(
        INGEST_EVENTS_STORED_TOTAL,
        "Total number of events newly persisted"
    );
    describe_counter!(
        INGEST_DUPLICATES_TOTAL,
        "Total number of events rejected as duplicates"
    );
    describe_counter!(
        INGEST_REJECTED_REQUESTS_TOTAL,
        "Total number of ingest requests rejected by schema validation"
    );
    describe_counter!(
        INGEST_HEARTBEATS_TOTAL,
        "Total number of explicit heartbeats received"
    );

    // Alert
    describe_counter!(
        ALERT_DISPATCHED_TOTAL,
        "Total number of alerts dispatched by kind"
    );
    describe_counter!(
        ALERT_SUPPRESSED_TOTAL,
        "Total number of alerts deferred by quiet hours"
    );
    describe_counter!(
        ALERT_DISPATCH_FAILURES_TOTAL,
        "Total number of failed alert dispatch attempts"
    );
    describe_gauge!(ALERT_ACTIVE_HOSTS, "Hosts seen within the inactivity threshold");
    describe_gauge!(
        ALERT_INACTIVE_HOSTS,
        "Hosts not seen within the inactivity threshold"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Logwarden daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Logwarden build information (always 1)"
    );
}
