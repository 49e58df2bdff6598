//! 방화벽 탐지기 -- iptables/UFW/pfSense 및 일반 방화벽 로그
//!
//! 차단 계열 탐지기는 drop/block/denied/reject 어휘가 있는 라인만 평가합니다.

use regex::Captures;

use logwarden_core::event::{EventType, Severity, UNKNOWN_IP};

use super::{Detector, Extracted, capture, first_ipv4};

const FIREWALL_USER: &str = "firewall";

/// 방화벽 탐지기 목록
pub fn detectors() -> Result<Vec<Detector>, regex::Error> {
    Ok(vec![
        Detector::new(
            "fw-drop",
            r"SRC=(?P<src>\S+).*?DST=(?P<dst>\S+).*?PROTO=(?P<proto>\w+).*?SPT=(?P<spt>\d+).*?DPT=(?P<dpt>\d+)",
            EventType::ConnectionBlocked,
            Severity::LOW,
            netfilter_summary,
        )?
        .with_guard(is_block_line),
        Detector::new(
            "fw-generic-block",
            r"(?:blocked|denied|dropped|rejected).*from\s+(?P<ip>\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
            EventType::ConnectionBlocked,
            Severity::LOW,
            |caps, _| Some(Extracted::new(FIREWALL_USER, capture(caps, "ip")?)),
        )?
        .with_guard(is_block_line),
        Detector::new(
            "fw-scan",
            r"(?:port\s+scan|syn\s+flood|ddos)",
            EventType::PortScan,
            Severity::HIGH,
            ip_anywhere,
        )?,
        Detector::new(
            "fw-intrusion",
            r"(?:intrusion|attack|malicious|threat)",
            EventType::CriticalError,
            Severity::CRITICAL,
            ip_anywhere,
        )?,
    ])
}

fn is_block_line(lowercase: &str) -> bool {
    ["drop", "block", "denied", "reject"]
        .iter()
        .any(|word| lowercase.contains(word))
}

/// netfilter 필드로 요약 메시지를 만듭니다.
fn netfilter_summary(caps: &Captures<'_>, _line: &str) -> Option<Extracted> {
    let src = capture(caps, "src")?;
    let message = format!(
        "Blocked {} from {}:{} to {}:{}",
        capture(caps, "proto")?,
        src,
        capture(caps, "spt")?,
        capture(caps, "dst")?,
        capture(caps, "dpt")?,
    );
    Some(Extracted::new(FIREWALL_USER, src).with_message(message))
}

fn ip_anywhere(_caps: &Captures<'_>, line: &str) -> Option<Extracted> {
    Some(Extracted::new(
        FIREWALL_USER,
        first_ipv4(line).unwrap_or_else(|| UNKNOWN_IP.to_owned()),
    ))
}
