//! Pi-hole 탐지기 -- dnsmasq/FTL 차단 로그
//!
//! 두 가지 형식을 지원합니다.
//! - dnsmasq 응답 라인: `gravity blocked ads.example.com is 0.0.0.0`
//!   (클라이언트는 다른 라인에 있으므로 출발지 IP는 알 수 없음)
//! - 렌더링된 FTL 쿼리 레코드: `Blocked DNS query for ads.example.com from 192.168.1.5#5353`

use std::net::IpAddr;

use regex::Captures;

use logwarden_core::event::{EventType, Severity, UNKNOWN_IP};

use super::{Detector, Extracted, capture};

const PIHOLE_USER: &str = "pihole";

/// Pi-hole 탐지기 목록
pub fn detectors() -> Result<Vec<Detector>, regex::Error> {
    Ok(vec![
        Detector::new(
            "pihole-query",
            r"Blocked DNS query for (?P<domain>\S+) from (?P<client>\S+)",
            EventType::DnsBlock,
            Severity::INFO,
            query_record,
        )?,
        Detector::new(
            "pihole-block",
            r"\b(?:gravity blocked|regex blacklisted|exactly blacklisted|blacklisted|blocked) (?P<domain>\S+) is (?P<reply>\S+)",
            EventType::DnsBlock,
            Severity::INFO,
            block_reply,
        )?,
    ])
}

fn query_record(caps: &Captures<'_>, _line: &str) -> Option<Extracted> {
    let domain = capture(caps, "domain")?;
    let client = sanitize_client(capture(caps, "client")?);
    let message = format!("Blocked DNS query for {domain} from {client}");
    Some(Extracted::new(PIHOLE_USER, client).with_message(message))
}

fn block_reply(caps: &Captures<'_>, _line: &str) -> Option<Extracted> {
    let domain = capture(caps, "domain")?;
    let message = format!("Blocked DNS query for {domain} from {UNKNOWN_IP}");
    Some(Extracted::new(PIHOLE_USER, UNKNOWN_IP).with_message(message))
}

/// 클라이언트 주소에서 포트를 제거합니다 (IPv6는 그대로 둡니다).
fn sanitize_client(client: &str) -> String {
    let client = client.trim_end_matches(['.', ',', ')']);
    if client.parse::<IpAddr>().is_ok() {
        return client.to_owned();
    }
    let host = match client.split_once('#') {
        Some((host, _port)) => host,
        None if client.matches(':').count() == 1 => client.split(':').next().unwrap_or(client),
        None => client,
    };
    if host.is_empty() {
        UNKNOWN_IP.to_owned()
    } else {
        host.to_owned()
    }
}
