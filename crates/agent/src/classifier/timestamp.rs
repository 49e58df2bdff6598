//! 라인 타임스탬프 추출
//!
//! 지원 형식:
//! - 라인 앞의 ISO-8601 (`2025-03-10T11:59:00`, 소수점/오프셋 허용, 오프셋 없으면 UTC)
//! - 라인 앞의 syslog (`Mar 10 11:59:00`), 연도는 관찰 시각에서 가져옵니다.
//!
//! 파싱할 수 없으면 관찰 시각을 그대로 사용합니다.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// 라인에서 타임스탬프를 추출합니다. 실패하면 `observed_at`.
pub fn parse_line_timestamp(line: &str, observed_at: DateTime<Utc>) -> DateTime<Utc> {
    let line = line.trim_start();
    parse_iso_prefix(line)
        .or_else(|| parse_syslog_prefix(line, observed_at))
        .unwrap_or(observed_at)
}

/// 라인 앞의 ISO-8601 타임스탬프를 파싱합니다.
fn parse_iso_prefix(line: &str) -> Option<DateTime<Utc>> {
    let token = line.split_whitespace().next()?;
    if token.len() < 19 || !token.as_bytes()[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = token.get(..19)?;
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// 라인 앞의 syslog 타임스탬프 (`Mon dd HH:MM:SS`)를 파싱합니다.
///
/// 관찰 시각보다 하루 이상 미래로 계산되면 작년 로그로 봅니다 (연말 경계).
fn parse_syslog_prefix(line: &str, observed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut parts = line.split_whitespace();
    let month_token = parts.next()?;
    let day_token = parts.next()?;
    let time_token = parts.next()?;

    if month_token.len() != 3 {
        return None;
    }
    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month_token))? as u32
        + 1;
    let day: u32 = day_token.parse().ok()?;
    let time = NaiveTime::parse_from_str(time_token, "%H:%M:%S").ok()?;

    let at_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day).map(|date| Utc.from_utc_datetime(&date.and_time(time)))
    };

    let candidate = at_year(observed_at.year())?;
    if candidate - observed_at > Duration::days(1) {
        return at_year(observed_at.year() - 1);
    }
    Some(candidate)
}
