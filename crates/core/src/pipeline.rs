//! 파이프라인 trait -- 장기 실행 컴포넌트의 생명주기 정의
//!
//! 에이전트 루프와 알림 엔진처럼 백그라운드에서 도는 컴포넌트는
//! [`Pipeline`]을 구현하여 데몬에서 동일한 방식(start/stop/health_check)으로 관리됩니다.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::LogwardenError;

/// 컴포넌트 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작은 하지만 문제가 있음 (예: 연속 전송 실패)
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 여부
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 백그라운드 컴포넌트 생명주기 trait
pub trait Pipeline: Send {
    /// 백그라운드 태스크를 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogwardenError>> + Send;

    /// 협력적 취소를 요청하고 태스크 종료를 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogwardenError>> + Send;

    /// 현재 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 대기 중 취소 확인 간격
pub const CANCEL_CHECK_STEP: Duration = Duration::from_secs(1);

/// `total` 동안 1초 단위로 나누어 대기합니다. 취소되면 즉시 `false`를 반환합니다.
pub async fn sleep_cancellable(total: Duration, cancel: &CancellationToken) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        let step = remaining.min(CANCEL_CHECK_STEP);
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(step) => {}
        }
        remaining = remaining.saturating_sub(step);
    }
    !cancel.is_cancelled()
}
