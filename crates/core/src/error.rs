//! 에러 타입 -- 도메인별 에러 정의

/// Logwarden 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogwardenError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 이벤트 스키마 위반
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 수집 서버로의 전송 에러
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 이벤트 스키마 위반
///
/// 수집 경계에서 닫힌 열거형과 값 범위를 벗어난 입력을 거부할 때 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// 심각도가 1..=5 범위를 벗어남
    #[error("severity {value} out of range 1..=5")]
    InvalidSeverity { value: i64 },

    /// 알 수 없는 OS 유형
    #[error("unknown os_type '{value}'")]
    UnknownOsType { value: String },

    /// 알 수 없는 이벤트 유형
    #[error("unknown event_type '{value}'")]
    UnknownEventType { value: String },

    /// 필수 필드 누락 또는 빈 값
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// 타임스탬프 형식 오류
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 쿼리 실패
    #[error("query failed: {0}")]
    Query(String),
}

/// 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// 요청 전송 실패 (연결 거부, 타임아웃 등)
    #[error("request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    /// 서버가 성공이 아닌 응답을 반환
    #[error("{endpoint} returned status {status}")]
    Rejected { endpoint: String, status: u16 },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline is not running")]
    NotRunning,

    /// 백그라운드 태스크가 비정상 종료됨
    #[error("background task failed: {reason}")]
    TaskFailed { reason: String },
}
