//! Logwarden 수집 서버
//!
//! 에이전트가 보낸 이벤트 배치를 검증해 멱등하게 저장하고, 호스트 생존을 추적하며,
//! 심각한 이벤트와 비활성 호스트를 알림으로 보냅니다.
//!
//! # 모듈 구성
//!
//! - [`store`]: `EventStore` trait과 SQLite 구현 (sqlx)
//! - [`ingest`]: 배치 검증, 중복 무시, 암묵적 하트비트
//! - [`liveness`]: 활성/비활성 호스트 분류
//! - [`runtime_config`]: 재시작 없이 바뀌는 알림 설정
//! - [`alert`]: 폴링 알림 엔진, 조용한 시간, 디스패처
//! - [`api`]: axum HTTP API
//! - [`context`]: 핸들러와 알림 엔진이 공유하는 상태
//!
//! # 사용 예시
//!
//! ```ignore
//! let ctx = AppContext::open(config).await?;
//! let listener = api::bind(&ctx.config.server.bind).await?;
//! api::serve(listener, ctx.clone(), shutdown_signal()).await?;
//! ctx.shutdown().await;
//! ```

pub mod alert;
pub mod api;
pub mod context;
pub mod error;
pub mod ingest;
pub mod liveness;
pub mod runtime_config;
pub mod store;

pub use alert::{AlertEngine, AlertEngineBuilder, CycleOutcome, Dispatcher};
pub use context::AppContext;
pub use error::{DispatchError, ServerError, StorageError};
pub use ingest::{IngestReport, IngestService};
pub use liveness::{HostReport, HostStatus};
pub use runtime_config::{RuntimeConfigStore, RuntimeSnapshot};
pub use store::{EventFilter, EventStore, SqliteStore};
