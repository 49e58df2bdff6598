//! Windows 탐지기 -- 렌더링된 보안/시스템 이벤트 로그 레코드
//!
//! 이벤트 로그 API는 외부 소스로 취급하며, 레코드는
//! `EventID=4625 TargetUserName=bob IpAddress=10.0.0.3 ...` 형태의 라인으로 들어옵니다.
//! 목록에 없는 이벤트 ID는 분류하지 않습니다.

use std::net::IpAddr;

use regex::Captures;

use logwarden_core::event::{EventType, Severity, UNKNOWN_IP};

use super::{Detector, ExtractFn, Extracted};

/// (이벤트 ID, 카테고리, 유형, 심각도)
const EVENT_MAP: [(u32, &str, EventType, Severity); 10] = [
    (4625, "win-4625", EventType::LoginFail, Severity::MEDIUM),
    (4624, "win-4624", EventType::LoginSuccess, Severity::INFO),
    (4688, "win-4688", EventType::ProcessExec, Severity::INFO),
    (4720, "win-4720", EventType::AccountCreate, Severity::HIGH),
    (4726, "win-4726", EventType::AccountDelete, Severity::MEDIUM),
    (4728, "win-4728", EventType::GroupAdd, Severity::MEDIUM),
    (4732, "win-4732", EventType::GroupAdd, Severity::MEDIUM),
    (4756, "win-4756", EventType::GroupAdd, Severity::MEDIUM),
    (7045, "win-7045", EventType::ServiceInstall, Severity::MEDIUM),
    (1102, "win-1102", EventType::LogTampering, Severity::CRITICAL),
];

/// 로그 삭제(1102) 이벤트의 행위자
const AUDIT_USER: &str = "audit-system";

/// Windows 탐지기 목록
pub fn detectors() -> Result<Vec<Detector>, regex::Error> {
    EVENT_MAP
        .iter()
        .map(|&(id, category, event_type, severity)| {
            let extract: ExtractFn = if id == 1102 {
                audit_record
            } else {
                account_record
            };
            Detector::new(
                category,
                &format!(r"\bEventID=0*{id}\b"),
                event_type,
                severity,
                extract,
            )
        })
        .collect()
}

fn account_record(_caps: &Captures<'_>, line: &str) -> Option<Extracted> {
    let user = field(line, "TargetUserName")
        .or_else(|| field(line, "SubjectUserName"))
        .unwrap_or("system");
    Some(Extracted::new(user, source_ip(line)))
}

fn audit_record(_caps: &Captures<'_>, line: &str) -> Option<Extracted> {
    Some(Extracted::new(AUDIT_USER, source_ip(line)))
}

fn source_ip(line: &str) -> String {
    field(line, "IpAddress")
        .filter(|ip| ip.parse::<IpAddr>().is_ok())
        .unwrap_or(UNKNOWN_IP)
        .to_owned()
}

/// `Key=value` 필드 값을 찾습니다. 빈 값과 `-`는 없는 것으로 봅니다.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split_whitespace()
        .filter_map(|token| token.split_once('='))
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim_matches(['"', ',', ';']))
        .filter(|v| !v.is_empty() && *v != "-")
}
