//! 파일 기반 로그 소스
//!
//! 커서부터 EOF까지 읽고, 파일 크기가 커서보다 작으면 로테이션으로 보고
//! 처음부터 다시 읽습니다. 개행으로 끝나지 않은 마지막 라인은 아직 쓰는 중일 수
//! 있으므로 남겨두고 다음 주기에 읽습니다.

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use super::{LogSource, SourceRead, SourceState};
use crate::config::DEFAULT_MAX_READ_BYTES;
use crate::error::AgentError;

/// 파일 소스 어댑터
#[derive(Debug, Clone)]
pub struct FileSource {
    /// 한 번에 읽을 최대 바이트 수
    max_read_bytes: u64,
}

impl Default for FileSource {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_READ_BYTES)
    }
}

impl FileSource {
    /// 새 파일 소스를 생성합니다.
    pub fn new(max_read_bytes: u64) -> Self {
        Self {
            max_read_bytes: max_read_bytes.max(1),
        }
    }

    fn source_error(path: &Path, e: std::io::Error) -> AgentError {
        AgentError::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl LogSource for FileSource {
    async fn read_new(&self, source: &str, offset: u64) -> Result<SourceRead, AgentError> {
        let path = Path::new(source);

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(source, "log source not found, skipping this cycle");
                return Ok(SourceRead::missing(source, offset));
            }
            Err(e) => return Err(Self::source_error(path, e)),
        };

        let size = metadata.len();
        let (start_offset, state) = if size < offset {
            info!(
                source,
                size, offset, "log source shrank below cursor, treating as rotated"
            );
            (0, SourceState::Rotated)
        } else {
            (offset, SourceState::Normal)
        };

        if size == start_offset {
            return Ok(SourceRead {
                source: source.to_owned(),
                lines: Vec::new(),
                start_offset,
                next_offset: start_offset,
                state,
            });
        }

        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Self::source_error(path, e))?;
        file.seek(SeekFrom::Start(start_offset))
            .await
            .map_err(|e| Self::source_error(path, e))?;

        let mut buf = Vec::new();
        file.take(self.max_read_bytes)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| Self::source_error(path, e))?;

        let buffer_full = buf.len() as u64 >= self.max_read_bytes;
        let consumed = complete_prefix_len(&buf, buffer_full);
        let lines = split_lines(&buf[..consumed]);

        debug!(
            source,
            start_offset,
            bytes = consumed,
            lines = lines.len(),
            "read new lines"
        );

        Ok(SourceRead {
            source: source.to_owned(),
            lines,
            start_offset,
            next_offset: start_offset + consumed as u64,
            state,
        })
    }
}

/// 완결된 라인까지의 바이트 길이를 계산합니다.
///
/// 버퍼가 가득 찼는데 개행이 하나도 없으면 진행 불가를 막기 위해 전체를 소비합니다.
fn complete_prefix_len(buf: &[u8], buffer_full: bool) -> usize {
    match buf.iter().rposition(|&b| b == b'\n') {
        Some(pos) => pos + 1,
        None if buffer_full => buf.len(),
        None => 0,
    }
}

/// 바이트를 라인으로 분리합니다 (lossy UTF-8, `\r` 제거).
fn split_lines(bytes: &[u8]) -> Vec<String> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    body.split(|&b| b == b'\n')
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line).into_owned()
        })
        .collect()
}
