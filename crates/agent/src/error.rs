//! 에이전트 에러 타입
//!
//! [`AgentError`]는 에이전트 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<AgentError> for LogwardenError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 분류되지 않은 라인은 에러가 아니며 `None`으로 표현됩니다.

use logwarden_core::error::{ConfigError, DeliveryError, LogwardenError};

/// 에이전트 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// 로그 소스 읽기 실패 (파일 없음 제외)
    #[error("source error: {path}: {reason}")]
    SourceUnavailable {
        /// 소스 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 커서 상태 파일 저장 실패
    #[error("offset store error: {path}: {reason}")]
    OffsetStore {
        /// 상태 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 수집 서버 전송 실패 (타임아웃, 연결 실패, 비정상 응답)
    #[error("delivery to {endpoint} failed: {reason}")]
    Delivery {
        /// 요청 경로 (/ingest, /heartbeat)
        endpoint: String,
        /// HTTP 상태 코드 (응답을 받은 경우)
        status: Option<u16>,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AgentError> for LogwardenError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Delivery {
                endpoint,
                status: Some(status),
                ..
            } => LogwardenError::Delivery(DeliveryError::Rejected { endpoint, status }),
            AgentError::Delivery {
                endpoint, reason, ..
            } => LogwardenError::Delivery(DeliveryError::Request { endpoint, reason }),
            AgentError::Config { field, reason } => {
                LogwardenError::Config(ConfigError::InvalidValue { field, reason })
            }
            AgentError::Io(e) => LogwardenError::Io(e),
            other => LogwardenError::Io(std::io::Error::other(other.to_string())),
        }
    }
}
