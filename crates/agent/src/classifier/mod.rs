//! 라인 분류기 -- 원시 로그 라인을 정규화된 보안 이벤트로 변환합니다.
//!
//! [`LineClassifier`]는 플랫폼별 탐지기 목록을 순서대로 평가하여
//! 처음 매칭된 탐지기로 [`Event`]를 만듭니다. 탐지기는 구체적인 것부터
//! 일반적인 것 순으로 정렬되며, 대부분의 플랫폼은 실패 어휘를 잡는
//! 낮은 심각도의 일반 탐지기로 끝납니다.
//!
//! # 순수성
//! `classify(line, observed_at)`은 입력에만 의존합니다. 같은 라인을 다시 분류하면
//! 같은 이벤트 (같은 ID)가 나오므로, 재전송된 라인은 서버에서 중복으로 흡수됩니다.
//!
//! # 이벤트 ID
//! `{host}-{category}-{sha256(trimmed line) 앞 32자리 hex}`
//!
//! 매칭되지 않는 라인은 에러가 아니라 `None`입니다.

pub mod firewall;
pub mod linux;
pub mod macos;
pub mod pihole;
pub mod timestamp;
pub mod windows;

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use tracing::debug;

use logwarden_core::event::{Event, EventType, OsType, Severity, UNKNOWN_IP, UNKNOWN_USER};

use crate::error::AgentError;

/// 분류 대상 최소 라인 길이 기본값 (공백 제거 후 문자 수)
pub const DEFAULT_MIN_LINE_LENGTH: usize = 10;

/// 이벤트 ID에 사용하는 다이제스트 hex 길이
const ID_DIGEST_HEX_LEN: usize = 32;

/// 탐지기가 라인에서 추출한 필드
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// 행위자
    pub user: String,
    /// 출발지 IP (없으면 `"unknown"`)
    pub source_ip: String,
    /// 원시 라인 대신 저장할 요약 메시지
    pub message: Option<String>,
}

impl Extracted {
    /// 사용자와 IP로 추출 결과를 생성합니다.
    pub fn new(user: impl Into<String>, source_ip: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            source_ip: source_ip.into(),
            message: None,
        }
    }

    /// IP 없이 사용자만 있는 추출 결과
    pub fn user_only(user: impl Into<String>) -> Self {
        Self::new(user, UNKNOWN_IP)
    }

    /// 요약 메시지를 설정합니다.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// 필드 추출 함수: (캡처, 정리된 라인) -> 추출 결과. `None`이면 다음 탐지기로 넘어갑니다.
pub type ExtractFn = fn(&Captures<'_>, &str) -> Option<Extracted>;

/// 라인 사전 조건: 소문자로 변환된 라인을 받습니다.
pub type GuardFn = fn(&str) -> bool;

/// 단일 카테고리 탐지기
pub struct Detector {
    /// 이벤트 ID에 들어가는 카테고리 태그
    category: &'static str,
    /// 컴파일된 패턴
    pattern: Regex,
    /// 이벤트 유형
    event_type: EventType,
    /// 심각도
    severity: Severity,
    /// 패턴 평가 전 사전 조건
    guard: Option<GuardFn>,
    /// 필드 추출
    extract: ExtractFn,
}

impl Detector {
    /// 탐지기를 생성합니다. 패턴은 대소문자를 구분하지 않습니다.
    pub fn new(
        category: &'static str,
        pattern: &str,
        event_type: EventType,
        severity: Severity,
        extract: ExtractFn,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            category,
            pattern: Regex::new(&format!("(?i){pattern}"))?,
            event_type,
            severity,
            guard: None,
            extract,
        })
    }

    /// 사전 조건을 설정합니다.
    pub fn with_guard(mut self, guard: GuardFn) -> Self {
        self.guard = Some(guard);
        self
    }

    /// 카테고리 태그
    pub fn category(&self) -> &'static str {
        self.category
    }

    /// 이벤트 유형
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// 심각도
    pub fn severity(&self) -> Severity {
        self.severity
    }

    fn evaluate(&self, line: &str, lowercase: &str) -> Option<Extracted> {
        if let Some(guard) = self.guard {
            if !guard(lowercase) {
                return None;
            }
        }
        let caps = self.pattern.captures(line)?;
        (self.extract)(&caps, line)
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("category", &self.category)
            .field("pattern", &self.pattern.as_str())
            .field("event_type", &self.event_type)
            .field("severity", &self.severity)
            .finish()
    }
}

/// 라인 분류기
///
/// `(source_host, os_type)` 쌍으로 한 번 생성하며, 모든 정규식은 생성 시 컴파일됩니다.
#[derive(Debug)]
pub struct LineClassifier {
    source_host: String,
    os_type: OsType,
    min_line_length: usize,
    detectors: Vec<Detector>,
}

impl LineClassifier {
    /// 플랫폼에 맞는 탐지기 목록으로 분류기를 생성합니다.
    pub fn new(source_host: impl Into<String>, os_type: OsType) -> Result<Self, AgentError> {
        let detectors = detectors_for(os_type)?;
        Ok(Self {
            source_host: source_host.into(),
            os_type,
            min_line_length: DEFAULT_MIN_LINE_LENGTH,
            detectors,
        })
    }

    /// 최소 라인 길이를 설정합니다.
    pub fn with_min_line_length(mut self, min_line_length: usize) -> Self {
        self.min_line_length = min_line_length;
        self
    }

    /// 분류 대상 플랫폼
    pub fn os_type(&self) -> OsType {
        self.os_type
    }

    /// 보고 호스트명
    pub fn source_host(&self) -> &str {
        &self.source_host
    }

    /// 평가 순서대로 정렬된 탐지기 목록
    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// 라인을 분류합니다.
    ///
    /// `observed_at`은 연도가 없는 syslog 타임스탬프의 연도 추론과,
    /// 타임스탬프가 없는 라인의 대체 시각으로 사용됩니다.
    pub fn classify(&self, line: &str, observed_at: DateTime<Utc>) -> Option<Event> {
        let trimmed = line.trim();
        if trimmed.chars().count() < self.min_line_length {
            return None;
        }

        let lowercase = trimmed.to_lowercase();
        let (detector, extracted) = self
            .detectors
            .iter()
            .find_map(|d| d.evaluate(trimmed, &lowercase).map(|x| (d, x)))?;

        debug!(
            category = detector.category,
            event_type = %detector.event_type,
            "line classified"
        );

        Some(Event {
            event_id: event_id(&self.source_host, detector.category, trimmed),
            timestamp: timestamp::parse_line_timestamp(trimmed, observed_at),
            source_host: self.source_host.clone(),
            os_type: self.os_type,
            event_type: detector.event_type,
            severity: detector.severity,
            source_ip: non_empty_or(extracted.source_ip, UNKNOWN_IP),
            user: non_empty_or(extracted.user, UNKNOWN_USER),
            raw_message: extracted.message.unwrap_or_else(|| trimmed.to_owned()),
        })
    }
}

/// 플랫폼별 탐지기 목록을 생성합니다.
pub fn detectors_for(os_type: OsType) -> Result<Vec<Detector>, regex::Error> {
    match os_type {
        OsType::Linux => linux::detectors(),
        OsType::Macos => macos::detectors(),
        OsType::Firewall => firewall::detectors(),
        OsType::Pihole => pihole::detectors(),
        OsType::Windows => windows::detectors(),
    }
}

/// 결정적 이벤트 ID를 계산합니다.
pub fn event_id(source_host: &str, category: &str, line: &str) -> String {
    let digest = hex::encode(line_digest(line));
    format!(
        "{source_host}-{category}-{}",
        &digest[..ID_DIGEST_HEX_LEN]
    )
}

/// 정리된(trim) 라인 내용의 SHA-256 다이제스트
pub fn line_digest(line: &str) -> [u8; 32] {
    Sha256::digest(line.trim().as_bytes()).into()
}

/// 라인에서 처음 나오는 IPv4 주소를 찾습니다.
pub fn first_ipv4(line: &str) -> Option<String> {
    line.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|token| token.trim_matches('.'))
        .find(|token| token.parse::<Ipv4Addr>().is_ok())
        .map(str::to_owned)
}

/// 명명된 캡처 그룹 값을 가져옵니다.
pub(crate) fn capture<'h>(caps: &Captures<'h>, name: &str) -> Option<&'h str> {
    caps.name(name).map(|m| m.as_str())
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_owned()
    } else {
        value
    }
}
