//! 로그 소스 어댑터 -- 커서 이후에 추가된 라인만 읽습니다.
//!
//! # 소스 상태
//! - [`SourceState::Normal`]: 현재 크기 >= 커서, 커서부터 끝까지 읽음
//! - [`SourceState::Rotated`]: 현재 크기 < 커서, 0부터 다시 읽음
//! - [`SourceState::Missing`]: 소스 없음, 빈 결과 (커서 변경 없음)
//!
//! 어댑터는 커서를 직접 저장하지 않습니다. 읽은 결과의 `next_offset`은
//! 전송이 확인된 뒤 에이전트가 [`OffsetStore`](crate::offset::OffsetStore)에 커밋합니다.

pub mod file;

pub use file::FileSource;

use async_trait::async_trait;

use crate::error::AgentError;

/// 한 번의 읽기에서 관찰된 소스 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// 정상 (추가분만 읽음)
    Normal,
    /// 로테이션/트렁케이션 감지 (처음부터 읽음)
    Rotated,
    /// 소스 없음
    Missing,
}

/// 소스 하나에서 읽은 결과
#[derive(Debug, Clone)]
pub struct SourceRead {
    /// 소스 식별자 (파일 경로)
    pub source: String,
    /// 새로 읽은 완결된 라인 (개행 제거)
    pub lines: Vec<String>,
    /// 실제 읽기 시작 위치 (로테이션 시 0)
    pub start_offset: u64,
    /// 커밋 대기 중인 다음 커서
    pub next_offset: u64,
    /// 관찰된 상태
    pub state: SourceState,
}

impl SourceRead {
    /// 소스가 없을 때의 빈 결과 (커서 유지)
    pub fn missing(source: impl Into<String>, offset: u64) -> Self {
        Self {
            source: source.into(),
            lines: Vec::new(),
            start_offset: offset,
            next_offset: offset,
            state: SourceState::Missing,
        }
    }

    /// 커서가 이동했는지 여부
    pub fn advanced(&self, committed: u64) -> bool {
        self.next_offset != committed
    }
}

/// 라인 소스 어댑터
///
/// 파일 외의 소스 (예: 이벤트 로그 API를 렌더링한 라인 스트림)도
/// 이 트레이트를 구현하면 에이전트에 연결할 수 있습니다.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// `offset` 이후에 추가된 라인을 읽습니다.
    async fn read_new(&self, source: &str, offset: u64) -> Result<SourceRead, AgentError>;
}
