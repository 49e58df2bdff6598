//! 커서 저장소 -- 소스별 마지막 처리 바이트 오프셋 영속화
//!
//! [`OffsetStore`]는 `{ "<소스 경로>": <오프셋>, ... }` 형태의 JSON 파일에
//! 소스별 커서를 저장합니다. 전송이 확인된 뒤에만 [`OffsetStore::commit`]이 호출되므로
//! 커밋 전에 프로세스가 죽으면 같은 구간을 다시 읽습니다 (서버 측 ID 멱등성에 의존).
//!
//! # 상태 파일 호환성
//! - 구형식 `{ "last_position": N }` 또는 정수 `N` → 첫 번째 설정 소스의 커서로 이전
//! - 읽을 수 없거나 손상된 파일 → 빈 맵 (처음부터 다시 읽음), `error!` 로그

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::AgentError;

/// 구형식 단일 커서 키
const LEGACY_POSITION_KEY: &str = "last_position";

/// 소스별 커서 저장소
#[derive(Debug)]
pub struct OffsetStore {
    /// 상태 파일 경로
    path: PathBuf,
    /// 소스 식별자 -> 바이트 오프셋
    offsets: BTreeMap<String, u64>,
}

impl OffsetStore {
    /// 빈 저장소를 생성합니다 (파일은 commit 시 생성).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offsets: BTreeMap::new(),
        }
    }

    /// 상태 파일에서 커서를 로드합니다.
    ///
    /// 이 함수는 실패하지 않습니다. 파일이 없거나 손상된 경우
    /// 빈 맵으로 시작하며, 이는 전체 재처리를 의미합니다.
    /// `sources`는 구형식 상태를 이전할 때 첫 번째 소스를 결정하는 데 사용됩니다.
    pub async fn load(path: impl Into<PathBuf>, sources: &[PathBuf]) -> Self {
        let path = path.into();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "no cursor state found, all sources will be read from offset 0"
                );
                return Self::new(path);
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "failed to read cursor state, all sources will be re-read from offset 0"
                );
                return Self::new(path);
            }
        };

        let offsets = match parse_state(&content, sources) {
            Some(offsets) => offsets,
            None => {
                error!(
                    path = %path.display(),
                    "cursor state is corrupt, all sources will be re-read from offset 0"
                );
                BTreeMap::new()
            }
        };

        info!(
            path = %path.display(),
            sources = offsets.len(),
            "cursor state loaded"
        );
        Self { path, offsets }
    }

    /// 소스의 현재 커서를 반환합니다 (없으면 0).
    pub fn get(&self, source: &str) -> u64 {
        self.offsets.get(source).copied().unwrap_or(0)
    }

    /// 전체 커서 맵에 대한 참조를 반환합니다.
    pub fn offsets(&self) -> &BTreeMap<String, u64> {
        &self.offsets
    }

    /// 상태 파일 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 대기 중인 커서 갱신을 반영하고 파일에 저장합니다.
    ///
    /// 전송 확인 후에만 호출해야 합니다.
    pub async fn commit<'a, I>(&mut self, pending: I) -> Result<(), AgentError>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut changed = false;
        for (source, offset) in pending {
            let previous = self.offsets.insert(source.to_owned(), offset);
            if previous != Some(offset) {
                debug!(source, offset, ?previous, "cursor advanced");
                changed = true;
            }
        }
        if changed {
            self.persist().await?;
        }
        Ok(())
    }

    /// 현재 커서 맵을 원자적으로 저장합니다 (임시 파일 + rename).
    pub async fn persist(&self) -> Result<(), AgentError> {
        let json = serde_json::to_vec_pretty(&self.offsets)?;
        let tmp_path = tmp_path_for(&self.path);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.store_error(e))?;
        }
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| self.store_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.store_error(e))?;
        Ok(())
    }

    fn store_error(&self, e: std::io::Error) -> AgentError {
        AgentError::OffsetStore {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// 상태 파일 내용을 해석합니다. 손상된 경우 `None`.
fn parse_state(content: &str, sources: &[PathBuf]) -> Option<BTreeMap<String, u64>> {
    let value: Value = serde_json::from_str(content).ok()?;
    let first_source = sources.first().map(|p| p.display().to_string());

    match value {
        Value::Number(n) => {
            let offset = n.as_u64()?;
            Some(migrate_legacy(first_source, offset))
        }
        Value::Object(map) => {
            if let Some(legacy) = map.get(LEGACY_POSITION_KEY) {
                let offset = legacy.as_u64()?;
                info!(offset, "migrating legacy single-cursor state");
                return Some(migrate_legacy(first_source, offset));
            }
            let mut offsets = BTreeMap::new();
            for (source, offset) in map {
                match offset.as_u64() {
                    Some(offset) => {
                        offsets.insert(source, offset);
                    }
                    None => warn!(source, "ignoring non-integer cursor entry"),
                }
            }
            Some(offsets)
        }
        _ => None,
    }
}

fn migrate_legacy(first_source: Option<String>, offset: u64) -> BTreeMap<String, u64> {
    let mut offsets = BTreeMap::new();
    match first_source {
        Some(source) => {
            offsets.insert(source, offset);
        }
        None => warn!(offset, "legacy cursor found but no sources configured, discarding"),
    }
    offsets
}
