//! 런타임 설정 -- 재시작 없이 바뀌는 알림 설정
//!
//! 값은 `runtime_config` 테이블에 문자열로 저장되며, 알림 엔진은 매 주기
//! [`RuntimeConfigStore::snapshot`]으로 다시 읽습니다. 메모리 캐시는 두지 않습니다.
//! 저장된 값이 파싱되지 않으면 기본값을 쓰고 경고를 남깁니다.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use logwarden_core::event::Severity;

use crate::alert::quiet_hours::QuietHours;
use crate::error::{ServerError, StorageError};
use crate::liveness::DEFAULT_INACTIVE_THRESHOLD_MINUTES;
use crate::store::EventStore;

/// 알림 심각도 임계값 키
pub const KEY_SEVERITY_THRESHOLD: &str = "ALERT_SEVERITY_THRESHOLD";
/// 비활성 임계값(분) 키
pub const KEY_INACTIVE_THRESHOLD: &str = "ALERT_INACTIVE_THRESHOLD";
/// 조용한 시간 키
pub const KEY_QUIET_HOURS: &str = "ALERT_QUIET_HOURS";
/// 알림 활성화 키
pub const KEY_ALERTS_ENABLED: &str = "ALERTS_ENABLED";

/// 기본 알림 심각도 임계값
pub const DEFAULT_SEVERITY_THRESHOLD: Severity = Severity::HIGH;

/// 비활성 임계값 상한 (하루)
pub const MAX_INACTIVE_THRESHOLD_MINUTES: u32 = 1440;

/// 한 시점의 런타임 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSnapshot {
    pub severity_threshold: Severity,
    pub inactive_threshold_minutes: u32,
    pub quiet_hours: Option<QuietHours>,
    pub alerts_enabled: bool,
}

impl Default for RuntimeSnapshot {
    fn default() -> Self {
        Self {
            severity_threshold: DEFAULT_SEVERITY_THRESHOLD,
            inactive_threshold_minutes: DEFAULT_INACTIVE_THRESHOLD_MINUTES,
            quiet_hours: None,
            alerts_enabled: true,
        }
    }
}

/// `GET /alert-config` 응답용 표현
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeView {
    pub severity_threshold: u8,
    pub inactive_threshold_minutes: u32,
    pub enabled: bool,
    /// 설정되지 않았으면 빈 문자열
    pub quiet_hours: String,
}

impl From<&RuntimeSnapshot> for RuntimeView {
    fn from(snapshot: &RuntimeSnapshot) -> Self {
        Self {
            severity_threshold: snapshot.severity_threshold.value(),
            inactive_threshold_minutes: snapshot.inactive_threshold_minutes,
            enabled: snapshot.alerts_enabled,
            quiet_hours: snapshot
                .quiet_hours
                .map(|q| q.to_string())
                .unwrap_or_default(),
        }
    }
}

/// 런타임 설정 저장소
#[derive(Clone)]
pub struct RuntimeConfigStore {
    store: Arc<dyn EventStore>,
}

impl RuntimeConfigStore {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// 현재 값을 모두 읽습니다.
    pub async fn snapshot(&self) -> Result<RuntimeSnapshot, StorageError> {
        let defaults = RuntimeSnapshot::default();

        let severity_threshold = match self.store.get_config(KEY_SEVERITY_THRESHOLD).await? {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|v| Severity::new(v).ok())
                .unwrap_or_else(|| {
                    warn_fallback(KEY_SEVERITY_THRESHOLD, &raw);
                    defaults.severity_threshold
                }),
            None => defaults.severity_threshold,
        };

        let inactive_threshold_minutes = match self.store.get_config(KEY_INACTIVE_THRESHOLD).await? {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|v| (1..=MAX_INACTIVE_THRESHOLD_MINUTES).contains(v))
                .unwrap_or_else(|| {
                    warn_fallback(KEY_INACTIVE_THRESHOLD, &raw);
                    defaults.inactive_threshold_minutes
                }),
            None => defaults.inactive_threshold_minutes,
        };

        let quiet_hours = match self.store.get_config(KEY_QUIET_HOURS).await? {
            Some(raw) => QuietHours::parse_optional(&raw).unwrap_or_else(|_| {
                warn_fallback(KEY_QUIET_HOURS, &raw);
                None
            }),
            None => None,
        };

        let alerts_enabled = match self.store.get_config(KEY_ALERTS_ENABLED).await? {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn_fallback(KEY_ALERTS_ENABLED, &raw);
                defaults.alerts_enabled
            }),
            None => defaults.alerts_enabled,
        };

        Ok(RuntimeSnapshot {
            severity_threshold,
            inactive_threshold_minutes,
            quiet_hours,
            alerts_enabled,
        })
    }

    /// 심각도 임계값 (1..=5)
    pub async fn set_severity_threshold(&self, value: i64) -> Result<(), ServerError> {
        let severity = Severity::new(value)
            .map_err(|_| ServerError::BadRequest("severity threshold must be between 1 and 5".to_owned()))?;
        self.put(KEY_SEVERITY_THRESHOLD, &severity.value().to_string())
            .await
    }

    /// 비활성 임계값 (1..=1440분)
    pub async fn set_inactive_threshold(&self, value: i64) -> Result<(), ServerError> {
        if !(1..=i64::from(MAX_INACTIVE_THRESHOLD_MINUTES)).contains(&value) {
            return Err(ServerError::BadRequest(format!(
                "inactive threshold must be between 1 and {MAX_INACTIVE_THRESHOLD_MINUTES} minutes"
            )));
        }
        self.put(KEY_INACTIVE_THRESHOLD, &value.to_string()).await
    }

    /// 조용한 시간. 빈 문자열이면 해제합니다.
    pub async fn set_quiet_hours(&self, value: &str) -> Result<(), ServerError> {
        let parsed =
            QuietHours::parse_optional(value).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        let normalized = parsed.map(|q| q.to_string()).unwrap_or_default();
        self.put(KEY_QUIET_HOURS, &normalized).await
    }

    /// 알림 활성화 여부
    pub async fn set_enabled(&self, enabled: bool) -> Result<(), ServerError> {
        self.put(KEY_ALERTS_ENABLED, if enabled { "true" } else { "false" })
            .await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), ServerError> {
        self.store.set_config(key, value).await?;
        info!(key, value, "runtime config updated");
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn warn_fallback(key: &str, raw: &str) {
    warn!(key, value = raw, "unparseable runtime config value, using default");
}
