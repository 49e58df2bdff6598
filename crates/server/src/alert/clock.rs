//! 주입 가능한 시계
//!
//! 알림 엔진은 현재 시각을 [`Clock`]으로만 얻습니다. 테스트는 [`ManualClock`]으로
//! 조용한 시간과 비활성 임계값을 실제 대기 없이 검증합니다.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// 현재 시각 제공자
pub trait Clock: Send + Sync {
    /// 현재 UTC 시각
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동으로 움직이는 시계
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// 주어진 시각에서 시작합니다.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// 시각을 설정합니다.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// 시각을 앞으로 이동합니다.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
