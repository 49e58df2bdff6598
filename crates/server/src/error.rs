//! 에러 타입 -- 스토리지, 검증, 인증, 알림 전송 에러
//!
//! [`ServerError`]는 axum [`IntoResponse`]를 구현하여 `{"detail": "..."}` 본문과
//! 상태 코드로 변환됩니다.

use std::error::Error as StdError;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use logwarden_core::error::{EventError, LogwardenError};

/// 원인 에러 박스
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// 수집 서버 에러
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 이벤트 스키마 위반 (요청 전체 거부)
    #[error("validation failed: {0}")]
    Validation(String),

    /// API 키 누락
    #[error("missing API key")]
    Unauthorized,

    /// API 키 불일치
    #[error("invalid API key")]
    Forbidden,

    /// 잘못된 요청 (헤더 누락, 범위 밖 값)
    #[error("{0}")]
    BadRequest(String),

    /// 대상 없음
    #[error("{0}")]
    NotFound(String),

    /// 요청 본문이 `server.max_body_bytes`를 넘음
    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    /// 리스너 바인드 실패
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// 알림 전송 실패
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl From<EventError> for ServerError {
    fn from(err: EventError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl ServerError {
    /// HTTP 상태 코드
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Storage(_) | Self::Bind { .. } | Self::Dispatch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<ServerError> for LogwardenError {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Storage(e) => LogwardenError::Storage(e.into()),
            other => LogwardenError::Storage(logwarden_core::error::StorageError::Query(
                other.to_string(),
            )),
        }
    }
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결 실패
    #[error("connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// 쿼리 실패
    #[error("query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// 스키마 생성 실패
    #[error("schema migration failed: {message}")]
    Migration {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },

    /// 저장된 데이터가 스키마와 맞지 않음
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// 원인을 포함한 연결 에러
    pub fn connection(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// 원인을 포함한 쿼리 에러
    pub fn query(message: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Query {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// 원인을 포함한 마이그레이션 에러
    pub fn migration(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Migration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<StorageError> for logwarden_core::error::StorageError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Connection { message, .. } => Self::Connection(message),
            other => Self::Query(other.to_string()),
        }
    }
}

/// 알림 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// 전송 설정 누락
    #[error("dispatcher not configured: {0}")]
    NotConfigured(String),

    /// 요청 실패 (연결, 타임아웃)
    #[error("request failed: {0}")]
    Request(String),

    /// 외부 API가 거부
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
