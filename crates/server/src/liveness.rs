//! 호스트 생존 추적
//!
//! 호스트는 `now - last_seen < threshold`이면 활성입니다. 정확히 임계값에 걸린
//! 호스트도 활성으로 봅니다 (`now - last_seen == threshold` → active).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use logwarden_core::event::format_timestamp;

use crate::error::StorageError;
use crate::store::{EventStore, LivenessRow};

/// 기본 비활성 임계값 (분)
pub const DEFAULT_INACTIVE_THRESHOLD_MINUTES: u32 = 15;

/// 호스트 한 개의 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub hostname: String,
    pub os_type: String,
    /// 고정 폭 UTC 타임스탬프
    pub last_seen: String,
    pub total_events: u64,
    pub minutes_since_seen: i64,
}

/// 활성/비활성 분류 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostReport {
    pub active: Vec<HostStatus>,
    pub inactive: Vec<HostStatus>,
    pub threshold_minutes: u32,
}

/// 임계값 경계에서 활성인지 판단합니다.
pub fn is_active(last_seen: DateTime<Utc>, now: DateTime<Utc>, threshold_minutes: u32) -> bool {
    now.signed_duration_since(last_seen) <= Duration::minutes(i64::from(threshold_minutes))
}

/// 생존 데이터를 활성/비활성으로 분류합니다. 입력 순서(최근순)를 유지합니다.
pub fn classify_hosts(rows: Vec<LivenessRow>, now: DateTime<Utc>, threshold_minutes: u32) -> HostReport {
    let mut report = HostReport {
        threshold_minutes,
        ..HostReport::default()
    };
    for row in rows {
        let active = is_active(row.last_seen, now, threshold_minutes);
        let status = HostStatus {
            minutes_since_seen: now.signed_duration_since(row.last_seen).num_minutes(),
            last_seen: format_timestamp(&row.last_seen),
            hostname: row.hostname,
            os_type: row.os_type,
            total_events: row.total_events,
        };
        if active {
            report.active.push(status);
        } else {
            report.inactive.push(status);
        }
    }
    report
}

/// 저장소에서 읽어 분류합니다.
pub async fn host_report(
    store: &dyn EventStore,
    now: DateTime<Utc>,
    threshold_minutes: u32,
) -> Result<HostReport, StorageError> {
    let rows = store.host_liveness_rows().await?;
    Ok(classify_hosts(rows, now, threshold_minutes))
}
