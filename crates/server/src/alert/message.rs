//! 알림 메시지 구성과 렌더링
//!
//! 제목, 필드 목록, 상세 메시지, 시각으로 구성하며 Telegram HTML parse mode에 맞게
//! 특수 문자를 이스케이프하여 렌더링합니다.

use chrono::{DateTime, Utc};

use logwarden_core::event::{Event, Severity};

use crate::liveness::HostStatus;
use crate::store::AlertKind;

/// 상세 메시지 최대 길이 (문자 수)
pub const MAX_DETAIL_CHARS: usize = 200;

/// 전송할 알림 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    /// 알림 종류
    pub kind: AlertKind,
    /// 중복 방지 조건 ID (이벤트 ID 또는 `host-down-{host}`)
    pub condition_id: String,
    /// 제목
    pub title: String,
    /// (라벨, 값) 목록
    pub fields: Vec<(&'static str, String)>,
    /// 잘린 원본 메시지
    pub details: Option<String>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

/// 호스트 비활성 알림의 조건 ID
pub fn host_down_condition(hostname: &str) -> String {
    format!("host-down-{hostname}")
}

/// 심각도별 표시 기호
pub fn severity_emoji(severity: Severity) -> &'static str {
    match severity.value() {
        5 => "🔴",
        4 => "🟠",
        3 => "🟡",
        _ => "🔵",
    }
}

/// 200자를 넘으면 197자 + "..."로 자릅니다.
pub fn truncate_details(raw: &str) -> String {
    if raw.chars().count() <= MAX_DETAIL_CHARS {
        return raw.to_owned();
    }
    let mut truncated: String = raw.chars().take(MAX_DETAIL_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

/// HTML 특수 문자 이스케이프
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl AlertMessage {
    /// 심각도 임계값 이상 이벤트 알림
    pub fn critical_event(event: &Event, now: DateTime<Utc>) -> Self {
        Self {
            kind: AlertKind::Critical,
            condition_id: event.event_id.clone(),
            title: format!("{} {}", severity_emoji(event.severity), event.event_type),
            fields: vec![
                ("Host", event.source_host.clone()),
                ("OS", event.os_type.to_string()),
                ("Type", event.event_type.to_string()),
                ("Severity", event.severity.to_string()),
                ("Source IP", event.source_ip.clone()),
                ("User", event.user.clone()),
            ],
            details: (!event.raw_message.is_empty()).then(|| truncate_details(&event.raw_message)),
            created_at: now,
        }
    }

    /// 호스트 비활성 알림
    pub fn host_down(host: &HostStatus, now: DateTime<Utc>) -> Self {
        Self {
            kind: AlertKind::HostDown,
            condition_id: host_down_condition(&host.hostname),
            title: format!("⚠️ Host Offline: {}", host.hostname),
            fields: vec![
                ("Host", host.hostname.clone()),
                ("OS", host.os_type.clone()),
                ("Last seen", host.last_seen.clone()),
                ("Minutes since seen", host.minutes_since_seen.to_string()),
            ],
            details: None,
            created_at: now,
        }
    }

    /// Telegram HTML 본문
    pub fn render_html(&self) -> String {
        let mut out = format!("<b>{}</b>\n\n", escape_html(&self.title));
        for (label, value) in &self.fields {
            out.push_str(&format!("<b>{label}</b>: <code>{}</code>\n", escape_html(value)));
        }
        if let Some(details) = &self.details {
            out.push_str(&format!("\n<pre>{}</pre>\n", escape_html(details)));
        }
        out.push_str(&format!(
            "\n<i>Time: {}</i>",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out
    }

    /// 로그용 한 줄 요약
    pub fn render_plain(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(label, value)| format!("{label}={value}"))
            .collect();
        format!("{} | {}", self.title, fields.join(" "))
    }
}
