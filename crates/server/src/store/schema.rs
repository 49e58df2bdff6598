//! SQLite 스키마
//!
//! 타임스탬프는 모두 고정 폭 `YYYY-MM-DDTHH:MM:SS.ffffffZ` 문자열로 저장하므로
//! 문자열 비교가 시간 순서와 같습니다.

use sqlx::SqlitePool;

use crate::error::StorageError;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "events table",
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL UNIQUE,
            timestamp TEXT NOT NULL,
            source_host TEXT NOT NULL,
            os_type TEXT NOT NULL,
            event_type TEXT NOT NULL,
            severity INTEGER NOT NULL CHECK (severity BETWEEN 1 AND 5),
            source_ip TEXT NOT NULL,
            user TEXT NOT NULL,
            raw_message TEXT NOT NULL,
            received_at TEXT NOT NULL
        )
        "#,
    ),
    (
        "timestamp index",
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp DESC)",
    ),
    (
        "source_host index",
        "CREATE INDEX IF NOT EXISTS idx_events_source_host ON events(source_host)",
    ),
    (
        "severity index",
        "CREATE INDEX IF NOT EXISTS idx_events_severity ON events(severity)",
    ),
    (
        "heartbeats table",
        r#"
        CREATE TABLE IF NOT EXISTS heartbeats (
            source_host TEXT PRIMARY KEY,
            os_type TEXT NOT NULL,
            last_seen TEXT NOT NULL
        )
        "#,
    ),
    (
        "alert_history table",
        r#"
        CREATE TABLE IF NOT EXISTS alert_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            condition_id TEXT NOT NULL,
            alert_kind TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            UNIQUE (condition_id, alert_kind)
        )
        "#,
    ),
    (
        "runtime_config table",
        r#"
        CREATE TABLE IF NOT EXISTS runtime_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ),
];

/// 테이블과 인덱스를 생성합니다. 여러 번 호출해도 안전합니다.
pub(crate) async fn initialize_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    for (name, sql) in STATEMENTS {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| StorageError::migration(format!("failed to create {name}"), e))?;
    }
    Ok(())
}
