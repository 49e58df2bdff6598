//! 이벤트 스키마 -- 모든 호스트의 로그를 정규화한 단일 보안 이벤트
//!
//! [`Event`]는 에이전트가 생성하고 수집 서버가 저장하는 불변 레코드입니다.
//! 열거형 필드(`os_type`, `event_type`)는 닫힌 집합이며,
//! 외부 입력은 [`EventSubmission::into_event`]에서 한 번만 검증됩니다.
//!
//! # 타임스탬프 형식
//! 저장/전송 시 `YYYY-MM-DDTHH:MM:SS.ffffffZ` 고정 폭 형식을 사용합니다.
//! 고정 폭이므로 문자열 정렬 순서와 시간 순서가 같습니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// IP를 추출할 수 없을 때 사용하는 센티널 값
pub const UNKNOWN_IP: &str = "unknown";

/// 구버전 에이전트가 사용하던 센티널 값 (수집 시 [`UNKNOWN_IP`]로 정규화)
pub const LEGACY_UNKNOWN_IP: &str = "N/A";

/// 사용자를 알 수 없을 때의 기본값
pub const UNKNOWN_USER: &str = "unknown";

// --- OS 유형 ---

/// 이벤트를 생성한 소스의 플랫폼 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OsType {
    /// Windows 보안 이벤트 로그
    Windows,
    /// Linux auth/syslog
    Linux,
    /// Pi-hole DNS 필터
    Pihole,
    /// macOS system/auth 로그
    Macos,
    /// 방화벽 (iptables, pfSense 등)
    Firewall,
}

impl OsType {
    /// 정의된 모든 OS 유형
    pub const ALL: [OsType; 5] = [
        Self::Windows,
        Self::Linux,
        Self::Pihole,
        Self::Macos,
        Self::Firewall,
    ];

    /// 와이어 표현 (대문자)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "WINDOWS",
            Self::Linux => "LINUX",
            Self::Pihole => "PIHOLE",
            Self::Macos => "MACOS",
            Self::Firewall => "FIREWALL",
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsType {
    type Err = EventError;

    /// 대소문자를 구분하지 않습니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|os| os.as_str() == upper)
            .ok_or_else(|| EventError::UnknownOsType {
                value: s.to_owned(),
            })
    }
}

// --- 이벤트 유형 ---

/// 정규화된 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    LoginFail,
    LoginSuccess,
    SudoEscalation,
    DnsBlock,
    CriticalError,
    AccountCreate,
    AccountDelete,
    GroupAdd,
    ServiceInstall,
    LogTampering,
    ConnectionBlocked,
    PortScan,
    ProcessExec,
    WebAttack,
    SystemAlert,
}

impl EventType {
    /// 정의된 모든 이벤트 유형
    pub const ALL: [EventType; 15] = [
        Self::LoginFail,
        Self::LoginSuccess,
        Self::SudoEscalation,
        Self::DnsBlock,
        Self::CriticalError,
        Self::AccountCreate,
        Self::AccountDelete,
        Self::GroupAdd,
        Self::ServiceInstall,
        Self::LogTampering,
        Self::ConnectionBlocked,
        Self::PortScan,
        Self::ProcessExec,
        Self::WebAttack,
        Self::SystemAlert,
    ];

    /// 와이어 표현 (SCREAMING_SNAKE_CASE)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginFail => "LOGIN_FAIL",
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::SudoEscalation => "SUDO_ESCALATION",
            Self::DnsBlock => "DNS_BLOCK",
            Self::CriticalError => "CRITICAL_ERROR",
            Self::AccountCreate => "ACCOUNT_CREATE",
            Self::AccountDelete => "ACCOUNT_DELETE",
            Self::GroupAdd => "GROUP_ADD",
            Self::ServiceInstall => "SERVICE_INSTALL",
            Self::LogTampering => "LOG_TAMPERING",
            Self::ConnectionBlocked => "CONNECTION_BLOCKED",
            Self::PortScan => "PORT_SCAN",
            Self::ProcessExec => "PROCESS_EXEC",
            Self::WebAttack => "WEB_ATTACK",
            Self::SystemAlert => "SYSTEM_ALERT",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| EventError::UnknownEventType {
                value: s.to_owned(),
            })
    }
}

// --- 심각도 ---

/// 심각도 (1..=5, 5 = 치명적)
///
/// 생성자에서 범위를 검증하므로 범위를 벗어난 값은 존재할 수 없습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Severity(u8);

impl Severity {
    /// 정보성
    pub const INFO: Severity = Severity(1);
    /// 낮음
    pub const LOW: Severity = Severity(2);
    /// 중간
    pub const MEDIUM: Severity = Severity(3);
    /// 높음
    pub const HIGH: Severity = Severity(4);
    /// 치명적
    pub const CRITICAL: Severity = Severity(5);

    /// 범위를 검증하여 심각도를 생성합니다.
    pub fn new(value: i64) -> Result<Self, EventError> {
        match value {
            1..=5 => Ok(Self(value as u8)),
            _ => Err(EventError::InvalidSeverity { value }),
        }
    }

    /// 정수 값
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Severity {
    type Error = EventError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- 이벤트 ---

/// 정규화된 보안 이벤트
///
/// `event_id`는 호스트, 카테고리, 원본 라인으로부터 결정적으로 계산되므로
/// 같은 라인을 재전송해도 서버에는 한 행만 저장됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 전역 고유 ID
    pub event_id: String,
    /// 발생 시각 (UTC)
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    /// 이벤트를 보고한 호스트
    pub source_host: String,
    /// 소스 플랫폼
    pub os_type: OsType,
    /// 이벤트 종류
    pub event_type: EventType,
    /// 심각도
    pub severity: Severity,
    /// 출발지 IP 또는 [`UNKNOWN_IP`]
    pub source_ip: String,
    /// 관련 사용자/행위자
    pub user: String,
    /// 원본 로그 메시지
    pub raw_message: String,
}

impl Event {
    /// 문자열 필드의 불변 조건을 검증합니다.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.event_id.trim().is_empty() {
            return Err(EventError::MissingField { field: "event_id" });
        }
        if self.source_host.trim().is_empty() {
            return Err(EventError::MissingField {
                field: "source_host",
            });
        }
        Ok(())
    }

    /// 저장용 고정 폭 타임스탬프 문자열
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} sev={} host={} ip={} user={}",
            self.event_id,
            self.os_type,
            self.event_type,
            self.severity,
            self.source_host,
            self.source_ip,
            self.user,
        )
    }
}

/// 수집 API로 들어오는 검증 전 이벤트
///
/// 구버전 에이전트 및 수동 생성 이벤트와의 호환을 위해
/// `event_id`, `source_ip`, `user`는 생략할 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSubmission {
    #[serde(default)]
    pub event_id: Option<String>,
    pub timestamp: String,
    pub source_host: String,
    pub os_type: String,
    pub event_type: String,
    pub severity: i64,
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub raw_message: String,
}

impl EventSubmission {
    /// 스키마를 검증하여 [`Event`]로 변환합니다.
    ///
    /// - `event_id`가 없거나 비어 있으면 UUID v4를 부여합니다.
    /// - `source_ip`가 없거나 `"N/A"`이면 [`UNKNOWN_IP`]로 정규화합니다.
    pub fn into_event(self) -> Result<Event, EventError> {
        let event_id = match self.event_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let source_ip = match self.source_ip {
            Some(ip) if !ip.trim().is_empty() && ip != LEGACY_UNKNOWN_IP => ip,
            _ => UNKNOWN_IP.to_owned(),
        };

        let user = match self.user {
            Some(user) if !user.trim().is_empty() => user,
            _ => UNKNOWN_USER.to_owned(),
        };

        let event = Event {
            event_id,
            timestamp: parse_timestamp(&self.timestamp)?,
            source_host: self.source_host,
            os_type: self.os_type.parse()?,
            event_type: self.event_type.parse()?,
            severity: Severity::new(self.severity)?,
            source_ip,
            user,
            raw_message: self.raw_message,
        };
        event.validate()?;
        Ok(event)
    }
}

impl From<Event> for EventSubmission {
    fn from(event: Event) -> Self {
        Self {
            timestamp: event.timestamp_string(),
            event_id: Some(event.event_id),
            source_host: event.source_host,
            os_type: event.os_type.as_str().to_owned(),
            event_type: event.event_type.as_str().to_owned(),
            severity: i64::from(event.severity.value()),
            source_ip: Some(event.source_ip),
            user: Some(event.user),
            raw_message: event.raw_message,
        }
    }
}

// --- 타임스탬프 ---

/// 고정 폭 UTC 타임스탬프 문자열로 변환합니다.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// RFC 3339 또는 타임존 없는 ISO-8601 문자열을 파싱합니다.
///
/// 타임존이 없으면 UTC로 간주합니다.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, EventError> {
    let trimmed = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    let naive = trimmed.trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
        .ok_or_else(|| EventError::InvalidTimestamp {
            value: value.to_owned(),
        })
}

mod timestamp_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
