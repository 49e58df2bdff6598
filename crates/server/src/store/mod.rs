//! 영속 저장소 -- 이벤트, 하트비트, 알림 이력, 런타임 설정
//!
//! [`EventStore`] trait이 저장소 계약이며, HTTP 핸들러와 알림 엔진은
//! 이 trait만 사용합니다. 기본 구현은 sqlx 기반 [`SqliteStore`]입니다.
//!
//! # 멱등성
//! `events.event_id`에 UNIQUE 제약이 있고 삽입은 행 단위 `INSERT OR IGNORE`입니다.
//! 같은 ID가 동시에 들어와도 저장 계층에서 정확히 한 행만 남습니다.

mod schema;
mod sqlite;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use logwarden_core::event::{Event, EventType, OsType, Severity};

use crate::error::StorageError;

pub use sqlite::SqliteStore;

/// 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    /// 심각도 임계값 이상 이벤트
    Critical,
    /// 호스트 비활성
    HostDown,
}

impl AlertKind {
    /// 저장 및 메트릭 라벨 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::HostDown => "host_down",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 이벤트 조회 조건
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub os_type: Option<OsType>,
    pub severity: Option<Severity>,
    pub severity_min: Option<Severity>,
    pub event_type: Option<EventType>,
    pub source_ip: Option<String>,
    /// 대소문자 무시 부분 일치
    pub user: Option<String>,
    pub source_host: Option<String>,
    /// 대소문자 무시 부분 일치
    pub raw_message: Option<String>,
    /// `YYYY-MM-DD` 이후 (포함)
    pub start_date: Option<NaiveDate>,
    /// `YYYY-MM-DD` 이전 (포함)
    pub end_date: Option<NaiveDate>,
    pub limit: u32,
    pub offset: u32,
}

/// 조회 결과 한 페이지
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPage {
    /// 페이지 적용 전 전체 건수
    pub total_count: u64,
    /// 최신순 이벤트
    pub events: Vec<Event>,
}

/// 배치 삽입 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// 새로 저장된 행 수
    pub stored: u64,
    /// 중복으로 무시된 행 수
    pub duplicates: u64,
    /// 새 행이 하나 이상 저장된 (호스트, OS) 조합
    pub stored_hosts: Vec<(String, OsType)>,
}

/// 호스트 생존 원천 데이터
///
/// 하트비트 행이 있으면 그 `last_seen`을, 없으면 이벤트 최대 타임스탬프를 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessRow {
    pub hostname: String,
    pub os_type: String,
    pub last_seen: DateTime<Utc>,
    pub total_events: u64,
}

/// 출발지 IP별 건수
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
}

/// 기간 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_events_24h: u64,
    /// 심각도 4 이상
    pub critical_events_24h: u64,
    pub events_by_os: BTreeMap<String, u64>,
    pub events_by_type: BTreeMap<String, u64>,
    /// "unknown" 제외 상위 10개
    pub top_source_ips: Vec<IpCount>,
    /// 가장 많이 차단된 DNS 메시지
    pub most_blocked_domain: Option<String>,
}

/// 저장소 계약
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 이벤트 배치를 행 단위로 삽입합니다. 중복 ID는 배치를 중단하지 않고 건너뜁니다.
    async fn insert_events(&self, events: &[Event]) -> Result<InsertOutcome, StorageError>;

    /// 조건에 맞는 이벤트를 최신순으로 조회합니다.
    async fn query_events(&self, filter: &EventFilter) -> Result<EventPage, StorageError>;

    /// 가장 최근에 수신된 이벤트 `limit`건
    async fn recent_events(&self, limit: u32) -> Result<Vec<Event>, StorageError>;

    /// 호스트의 `last_seen`을 갱신합니다 (없으면 생성).
    async fn record_heartbeat(
        &self,
        source_host: &str,
        os_type: OsType,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// 하트비트와 이벤트를 합친 호스트별 생존 데이터
    async fn host_liveness_rows(&self) -> Result<Vec<LivenessRow>, StorageError>;

    /// 호스트의 하트비트와 이벤트를 삭제합니다. 삭제된 행 수를 반환합니다.
    async fn delete_host(&self, source_host: &str) -> Result<u64, StorageError>;

    /// 알림 기록 존재 여부
    async fn alert_exists(&self, condition_id: &str, kind: AlertKind) -> Result<bool, StorageError>;

    /// 알림 기록을 남깁니다. 새로 기록되면 `true`.
    async fn record_alert(
        &self,
        condition_id: &str,
        kind: AlertKind,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// 런타임 설정 값
    async fn get_config(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// 런타임 설정 값을 저장합니다.
    async fn set_config(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// `since` 이후 이벤트 요약
    async fn summary(&self, since: DateTime<Utc>) -> Result<Summary, StorageError>;

    /// 연결 확인
    async fn ping(&self) -> Result<(), StorageError>;
}
