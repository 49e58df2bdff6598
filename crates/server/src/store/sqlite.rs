//! sqlx 기반 SQLite 저장소
//!
//! 파일 데이터베이스는 WAL 저널과 `busy_timeout`으로 여러 연결의 동시 쓰기를 직렬화합니다.
//! `:memory:`는 연결마다 별도 데이터베이스가 되므로 연결 1개로 고정합니다.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

use logwarden_core::event::{
    Event, EventType, LEGACY_UNKNOWN_IP, OsType, Severity, UNKNOWN_IP, format_timestamp,
    parse_timestamp,
};

use super::schema::initialize_schema;
use super::{
    AlertKind, EventFilter, EventPage, EventStore, InsertOutcome, IpCount, LivenessRow, Summary,
};
use crate::error::StorageError;

/// 인메모리 데이터베이스 경로
pub const MEMORY_PATH: &str = ":memory:";

/// 상위 출발지 IP 개수
const TOP_SOURCE_IPS: i64 = 10;

/// "critical" 요약 기준 심각도
const CRITICAL_SUMMARY_SEVERITY: i64 = 4;

const EVENT_COLUMNS: &str =
    "event_id, timestamp, source_host, os_type, event_type, severity, source_ip, user, raw_message";

/// SQLite 저장소
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 데이터베이스를 열고 스키마를 초기화합니다.
    ///
    /// `path`가 `:memory:`이면 인메모리 데이터베이스를 사용합니다 (테스트용).
    pub async fn open(path: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = if path == MEMORY_PATH {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StorageError::connection("invalid SQLite URL", e))?;
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
                .map_err(|e| StorageError::connection("failed to open in-memory database", e))?
        } else {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        StorageError::connection(
                            format!("failed to create database directory {}", parent.display()),
                            e,
                        )
                    })?;
                }
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(5));
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(max_connections.max(1))
                .acquire_timeout(Duration::from_secs(30))
                .idle_timeout(Duration::from_secs(600))
                .connect_with(options)
                .await
                .map_err(|e| StorageError::connection("failed to create SQLite pool", e))?
        };

        initialize_schema(&pool).await?;
        info!(path, max_connections, "event store opened");
        Ok(Self { pool })
    }

    /// 인메모리 저장소 (테스트용)
    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::open(MEMORY_PATH, 1).await
    }

    /// 풀을 닫습니다. 진행 중인 쿼리는 완료를 기다립니다.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("event store closed");
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a EventFilter) {
    if let Some(os_type) = filter.os_type {
        qb.push(" AND os_type = ").push_bind(os_type.as_str());
    }
    if let Some(severity) = filter.severity {
        qb.push(" AND severity = ").push_bind(i64::from(severity.value()));
    }
    if let Some(severity_min) = filter.severity_min {
        qb.push(" AND severity >= ").push_bind(i64::from(severity_min.value()));
    }
    if let Some(event_type) = filter.event_type {
        qb.push(" AND event_type = ").push_bind(event_type.as_str());
    }
    if let Some(source_ip) = &filter.source_ip {
        qb.push(" AND source_ip = ").push_bind(source_ip.as_str());
    }
    if let Some(user) = &filter.user {
        qb.push(" AND instr(lower(user), lower(")
            .push_bind(user.as_str())
            .push(")) > 0");
    }
    if let Some(source_host) = &filter.source_host {
        qb.push(" AND source_host = ").push_bind(source_host.as_str());
    }
    if let Some(raw_message) = &filter.raw_message {
        qb.push(" AND instr(lower(raw_message), lower(")
            .push_bind(raw_message.as_str())
            .push(")) > 0");
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND substr(timestamp, 1, 10) >= ")
            .push_bind(start.format("%Y-%m-%d").to_string());
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND substr(timestamp, 1, 10) <= ")
            .push_bind(end.format("%Y-%m-%d").to_string());
    }
}

fn row_to_event(row: &SqliteRow) -> Result<Event, StorageError> {
    let text = |column: &str| -> Result<String, StorageError> {
        row.try_get::<String, _>(column)
            .map_err(|e| StorageError::query(format!("failed to decode column {column}"), e))
    };
    let invalid = |e: logwarden_core::error::EventError| StorageError::InvalidData(e.to_string());

    let severity: i64 = row
        .try_get("severity")
        .map_err(|e| StorageError::query("failed to decode column severity", e))?;

    Ok(Event {
        event_id: text("event_id")?,
        timestamp: parse_timestamp(&text("timestamp")?).map_err(invalid)?,
        source_host: text("source_host")?,
        os_type: text("os_type")?.parse::<OsType>().map_err(invalid)?,
        event_type: text("event_type")?.parse::<EventType>().map_err(invalid)?,
        severity: Severity::new(severity).map_err(invalid)?,
        source_ip: text("source_ip")?,
        user: text("user")?,
        raw_message: text("raw_message")?,
    })
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn insert_events(&self, events: &[Event]) -> Result<InsertOutcome, StorageError> {
        let received_at = format_timestamp(&Utc::now());
        let mut outcome = InsertOutcome::default();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::connection("failed to begin transaction", e))?;

        for event in events {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO events (
                    event_id, timestamp, source_host, os_type, event_type,
                    severity, source_ip, user, raw_message, received_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&event.event_id)
            .bind(event.timestamp_string())
            .bind(&event.source_host)
            .bind(event.os_type.as_str())
            .bind(event.event_type.as_str())
            .bind(i64::from(event.severity.value()))
            .bind(&event.source_ip)
            .bind(&event.user)
            .bind(&event.raw_message)
            .bind(&received_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::query("failed to insert event", e))?;

            if result.rows_affected() == 0 {
                debug!(event_id = %event.event_id, "duplicate event ignored");
                outcome.duplicates += 1;
                continue;
            }
            outcome.stored += 1;
            let host = (event.source_host.clone(), event.os_type);
            if !outcome.stored_hosts.contains(&host) {
                outcome.stored_hosts.push(host);
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::query("failed to commit event batch", e))?;
        Ok(outcome)
    }

    async fn query_events(&self, filter: &EventFilter) -> Result<EventPage, StorageError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM events WHERE 1=1");
        push_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::query("failed to count events", e))?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE 1=1"));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset));
        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::query("failed to query events", e))?;

        let events = rows.iter().map(row_to_event).collect::<Result<Vec<_>, _>>()?;
        Ok(EventPage {
            total_count: to_count(total),
            events,
        })
    }

    async fn recent_events(&self, limit: u32) -> Result<Vec<Event>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to load recent events", e))?;
        rows.iter().map(row_to_event).collect()
    }

    async fn record_heartbeat(
        &self,
        source_host: &str,
        os_type: OsType,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO heartbeats (source_host, os_type, last_seen) VALUES (?, ?, ?)
            ON CONFLICT(source_host) DO UPDATE SET
                os_type = excluded.os_type,
                last_seen = MAX(heartbeats.last_seen, excluded.last_seen)
            "#,
        )
        .bind(source_host)
        .bind(os_type.as_str())
        .bind(format_timestamp(&at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to record heartbeat", e))?;
        Ok(())
    }

    async fn host_liveness_rows(&self) -> Result<Vec<LivenessRow>, StorageError> {
        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT h.source_host AS hostname, h.os_type AS os_type, h.last_seen AS last_seen,
                   (SELECT COUNT(*) FROM events e WHERE e.source_host = h.source_host) AS total_events
            FROM heartbeats h
            UNION ALL
            SELECT e.source_host, MIN(e.os_type), MAX(e.timestamp), COUNT(*)
            FROM events e
            WHERE e.source_host NOT IN (SELECT source_host FROM heartbeats)
            GROUP BY e.source_host
            ORDER BY last_seen DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to load host liveness", e))?;

        rows.into_iter()
            .map(|(hostname, os_type, last_seen, total_events)| {
                let last_seen = parse_timestamp(&last_seen)
                    .map_err(|e| StorageError::InvalidData(e.to_string()))?;
                Ok(LivenessRow {
                    hostname,
                    os_type,
                    last_seen,
                    total_events: to_count(total_events),
                })
            })
            .collect()
    }

    async fn delete_host(&self, source_host: &str) -> Result<u64, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::connection("failed to begin transaction", e))?;
        let events = sqlx::query("DELETE FROM events WHERE source_host = ?")
            .bind(source_host)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::query("failed to delete host events", e))?
            .rows_affected();
        let heartbeats = sqlx::query("DELETE FROM heartbeats WHERE source_host = ?")
            .bind(source_host)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::query("failed to delete host heartbeat", e))?
            .rows_affected();
        tx.commit()
            .await
            .map_err(|e| StorageError::query("failed to commit host deletion", e))?;
        Ok(events + heartbeats)
    }

    async fn alert_exists(&self, condition_id: &str, kind: AlertKind) -> Result<bool, StorageError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM alert_history WHERE condition_id = ? AND alert_kind = ?)",
        )
        .bind(condition_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to check alert history", e))
    }

    async fn record_alert(
        &self,
        condition_id: &str,
        kind: AlertKind,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO alert_history (condition_id, alert_kind, sent_at) VALUES (?, ?, ?)",
        )
        .bind(condition_id)
        .bind(kind.as_str())
        .bind(format_timestamp(&at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to record alert", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM runtime_config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::query("failed to read runtime config", e))
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO runtime_config (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(format_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to write runtime config", e))?;
        Ok(())
    }

    async fn summary(&self, since: DateTime<Utc>) -> Result<Summary, StorageError> {
        let since = format_timestamp(&since);

        let (total, critical): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN severity >= ? THEN 1 ELSE 0 END), 0)
            FROM events WHERE timestamp >= ?
            "#,
        )
        .bind(CRITICAL_SUMMARY_SEVERITY)
        .bind(&since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to count recent events", e))?;

        let by_os: Vec<(String, i64)> = sqlx::query_as(
            "SELECT os_type, COUNT(*) FROM events WHERE timestamp >= ? GROUP BY os_type",
        )
        .bind(&since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to group events by os", e))?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT event_type, COUNT(*) FROM events WHERE timestamp >= ? GROUP BY event_type",
        )
        .bind(&since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to group events by type", e))?;

        let top_ips: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT source_ip, COUNT(*) AS hits FROM events
            WHERE timestamp >= ? AND source_ip NOT IN (?, ?)
            GROUP BY source_ip ORDER BY hits DESC, source_ip ASC LIMIT ?
            "#,
        )
        .bind(&since)
        .bind(UNKNOWN_IP)
        .bind(LEGACY_UNKNOWN_IP)
        .bind(TOP_SOURCE_IPS)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to rank source ips", e))?;

        let most_blocked: Option<String> = sqlx::query_scalar(
            r#"
            SELECT raw_message FROM events
            WHERE timestamp >= ? AND event_type = ?
            GROUP BY raw_message ORDER BY COUNT(*) DESC, raw_message ASC LIMIT 1
            "#,
        )
        .bind(&since)
        .bind(EventType::DnsBlock.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::query("failed to rank blocked domains", e))?;

        Ok(Summary {
            total_events_24h: to_count(total),
            critical_events_24h: to_count(critical),
            events_by_os: by_os.into_iter().map(|(k, v)| (k, to_count(v))).collect(),
            events_by_type: by_type.into_iter().map(|(k, v)| (k, to_count(v))).collect(),
            top_source_ips: top_ips
                .into_iter()
                .map(|(ip, count)| IpCount {
                    ip,
                    count: to_count(count),
                })
                .collect(),
            most_blocked_domain: most_blocked,
        })
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::connection("database connection failed", e))?;
        Ok(())
    }
}
