//! 조용한 시간 -- 알림 전송을 미루는 하루 중 구간
//!
//! `"HH:MM-HH:MM"` 형식이며 UTC 기준 분 단위 반열린 구간 `[start, end)`입니다.
//! `start > end`이면 자정을 넘어가는 구간이고, `start == end`이면 빈 구간입니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Timelike, Utc};

const MINUTES_PER_DAY: u16 = 24 * 60;

/// 조용한 시간 형식 오류
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid quiet hours '{value}': use HH:MM-HH:MM (e.g. 22:00-06:00)")]
pub struct QuietHoursError {
    pub value: String,
}

/// 조용한 시간 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    start_minute: u16,
    end_minute: u16,
}

impl QuietHours {
    /// 분 단위 경계로 생성합니다. 둘 다 하루(1440분) 미만이어야 합니다.
    pub fn new(start_minute: u16, end_minute: u16) -> Option<Self> {
        (start_minute < MINUTES_PER_DAY && end_minute < MINUTES_PER_DAY).then_some(Self {
            start_minute,
            end_minute,
        })
    }

    /// 빈 문자열이면 `None`, 아니면 파싱합니다.
    pub fn parse_optional(value: &str) -> Result<Option<Self>, QuietHoursError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        value.parse().map(Some)
    }

    pub fn start_minute(&self) -> u16 {
        self.start_minute
    }

    pub fn end_minute(&self) -> u16 {
        self.end_minute
    }

    /// 하루 중 분이 구간에 포함되는지 확인합니다.
    pub fn contains_minute(&self, minute: u16) -> bool {
        match self.start_minute.cmp(&self.end_minute) {
            std::cmp::Ordering::Less => self.start_minute <= minute && minute < self.end_minute,
            std::cmp::Ordering::Greater => minute >= self.start_minute || minute < self.end_minute,
            std::cmp::Ordering::Equal => false,
        }
    }

    /// 시각이 구간에 포함되는지 확인합니다 (UTC).
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        // hour < 24, minute < 60 이므로 u16 범위 안
        let minute = (at.hour() * 60 + at.minute()) as u16;
        self.contains_minute(minute)
    }
}

fn parse_clock(value: &str) -> Option<u16> {
    let (hour, minute) = value.trim().split_once(':')?;
    let hour: u16 = hour.parse().ok()?;
    let minute: u16 = minute.parse().ok()?;
    (hour < 24 && minute < 60).then_some(hour * 60 + minute)
}

impl FromStr for QuietHours {
    type Err = QuietHoursError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || QuietHoursError {
            value: s.to_owned(),
        };
        let (start, end) = s.split_once('-').ok_or_else(err)?;
        let start = parse_clock(start).ok_or_else(err)?;
        let end = parse_clock(end).ok_or_else(err)?;
        Self::new(start, end).ok_or_else(err)
    }
}

impl fmt::Display for QuietHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start_minute / 60,
            self.start_minute % 60,
            self.end_minute / 60,
            self.end_minute % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn minute(h: u16, m: u16) -> u16 {
        h * 60 + m
    }

    #[test]
    fn parses_and_displays() {
        let q: QuietHours = "22:00-06:30".parse().unwrap();
        assert_eq!(q.start_minute(), minute(22, 0));
        assert_eq!(q.end_minute(), minute(6, 30));
        assert_eq!(q.to_string(), "22:00-06:30");
    }

    #[test]
    fn same_day_window_is_half_open() {
        let q: QuietHours = "09:00-17:00".parse().unwrap();
        assert!(!q.contains_minute(minute(8, 59)));
        assert!(q.contains_minute(minute(9, 0)));
        assert!(q.contains_minute(minute(16, 59)));
        assert!(!q.contains_minute(minute(17, 0)));
    }

    #[test]
    fn window_wraps_past_midnight() {
        let q: QuietHours = "22:00-06:00".parse().unwrap();
        assert!(q.contains_minute(minute(22, 0)));
        assert!(q.contains_minute(minute(23, 59)));
        assert!(q.contains_minute(minute(0, 0)));
        assert!(q.contains_minute(minute(5, 59)));
        assert!(!q.contains_minute(minute(6, 0)));
        assert!(!q.contains_minute(minute(21, 59)));
    }

    #[test]
    fn equal_bounds_are_empty() {
        let q: QuietHours = "03:00-03:00".parse().unwrap();
        assert!((0..MINUTES_PER_DAY).all(|m| !q.contains_minute(m)));
    }

    #[test]
    fn contains_uses_utc_minute_of_day() {
        let q: QuietHours = "22:00-06:00".parse().unwrap();
        assert!(q.contains(Utc.with_ymd_and_hms(2025, 3, 10, 23, 15, 0).unwrap()));
        assert!(!q.contains(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()));
    }

    #[test]
    fn rejects_malformed_values() {
        for bad in ["22:00", "24:00-06:00", "22:60-06:00", "ab:cd-06:00", "22-06", "-"] {
            assert!(bad.parse::<QuietHours>().is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn empty_value_disables() {
        assert_eq!(QuietHours::parse_optional("  ").unwrap(), None);
        assert!(QuietHours::parse_optional("22:00-06:00").unwrap().is_some());
    }
}
