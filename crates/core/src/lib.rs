//! Logwarden 공통 크레이트
//!
//! 에이전트와 수집 서버가 공유하는 타입을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`event`]: 정규화된 보안 이벤트 스키마와 닫힌 열거형 (`OsType`, `EventType`, `Severity`)
//! - [`error`]: 도메인 에러 타입
//! - [`config`]: `logwarden.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`metrics`]: Prometheus 메트릭 이름 상수
//! - [`pipeline`]: 장기 실행 컴포넌트의 생명주기 trait

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    ConfigError, DeliveryError, EventError, LogwardenError, PipelineError, StorageError,
};

// 설정
pub use config::LogwardenConfig;

// 이벤트
pub use event::{Event, EventType, OsType, Severity, UNKNOWN_IP};

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};
