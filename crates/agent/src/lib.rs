//! Logwarden 호스트 에이전트
//!
//! 로그 파일을 tail 하여 보안 관련 라인을 정규화된 이벤트로 분류하고,
//! 수집 서버로 배치 전송합니다. 전송이 확인된 뒤에만 커서를 커밋하므로
//! 재시작이나 네트워크 장애 후에도 라인을 잃지 않습니다 (at-least-once).
//!
//! # 모듈 구성
//!
//! - [`offset`]: 소스별 바이트 커서 저장소 (원자적 쓰기, 레거시 형식 마이그레이션)
//! - [`collector`]: 라인 소스 추상화와 파일 구현 (로테이션/누락 감지)
//! - [`classifier`]: 플랫폼별 탐지기와 결정적 이벤트 ID
//! - [`dedup`]: 세션 중복 캐시
//! - [`delivery`]: 수집 서버 HTTP 클라이언트
//! - [`agent`]: 한 주기 실행과 루프 (Pipeline trait 구현)
//! - [`config`]: 에이전트 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! LogSource -> SessionDedupCache -> LineClassifier -> Delivery -> OffsetStore.commit
//!     |                                   |              |
//!  rotation/missing                 detector families   ingest + heartbeat
//! ```

pub mod agent;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod error;
pub mod offset;

// --- 주요 타입 re-export ---

// 에이전트
pub use agent::{Agent, AgentBuilder, CycleReport};

// 설정
pub use config::AgentSettings;

// 에러
pub use error::AgentError;

// 분류기
pub use classifier::{Detector, LineClassifier};

// 수집기
pub use collector::{FileSource, LogSource, SourceRead, SourceState};

// 중복 제거
pub use dedup::SessionDedupCache;

// 전송
pub use delivery::{Delivery, HttpDeliveryClient, IngestAck};

// 커서
pub use offset::OffsetStore;
