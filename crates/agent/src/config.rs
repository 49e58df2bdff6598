//! 에이전트 설정
//!
//! [`AgentSettings`]는 core의 [`AgentConfig`](logwarden_core::config::AgentConfig)를
//! 타입이 지정된 형태(경로, `Duration`, `OsType`)로 변환한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use logwarden_core::config::LogwardenConfig;
//! use logwarden_agent::config::AgentSettings;
//!
//! let core_config = LogwardenConfig::default();
//! let settings = AgentSettings::from_core(&core_config.agent)?;
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use logwarden_core::config::AgentConfig;
use logwarden_core::event::OsType;

use crate::error::AgentError;

/// 한 주기에 소스 하나에서 읽을 최대 바이트 수 기본값 (16MB)
pub const DEFAULT_MAX_READ_BYTES: u64 = 16 * 1024 * 1024;

/// 에이전트 런타임 설정
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// 수집 서버 기본 URL (끝의 `/` 제거됨)
    pub server_url: String,
    /// API 키
    pub api_key: String,
    /// 보고 호스트명
    pub source_host: String,
    /// 소스 플랫폼
    pub os_type: OsType,
    /// 감시할 로그 파일 목록
    pub log_files: Vec<PathBuf>,
    /// 커서 상태 파일
    pub state_file: PathBuf,
    /// 수집 주기
    pub interval: Duration,
    /// 배치 전송 타임아웃
    pub request_timeout: Duration,
    /// 하트비트 타임아웃
    pub heartbeat_timeout: Duration,
    /// 세션 중복 캐시 용량
    pub dedup_capacity: usize,
    /// 최소 라인 길이
    pub min_line_length: usize,
    /// `/ingest` 요청 하나에 담을 최대 이벤트 수
    pub max_batch_events: usize,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 한 주기에 소스 하나에서 읽을 최대 바이트 수
    pub max_read_bytes: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        // core 기본값은 항상 유효하므로 변환이 실패하지 않습니다.
        let core = AgentConfig::default();
        Self {
            server_url: core.server_url,
            api_key: core.api_key,
            source_host: "localhost".to_owned(),
            os_type: OsType::Linux,
            log_files: core.log_files.into_iter().map(PathBuf::from).collect(),
            state_file: PathBuf::from(core.state_file),
            interval: Duration::from_secs(core.interval_secs),
            request_timeout: Duration::from_secs(core.request_timeout_secs),
            heartbeat_timeout: Duration::from_secs(core.heartbeat_timeout_secs),
            dedup_capacity: core.dedup_capacity,
            min_line_length: core.min_line_length,
            max_batch_events: core.max_batch_events,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

impl AgentSettings {
    /// core의 `AgentConfig`에서 에이전트 설정을 생성합니다.
    pub fn from_core(core: &AgentConfig) -> Result<Self, AgentError> {
        let os_type = core
            .os_type
            .parse::<OsType>()
            .map_err(|e| AgentError::Config {
                field: "agent.os_type".to_owned(),
                reason: e.to_string(),
            })?;

        let settings = Self {
            server_url: core.server_url.trim_end_matches('/').to_owned(),
            api_key: core.api_key.clone(),
            source_host: core.resolved_source_host(),
            os_type,
            log_files: core.log_files.iter().map(PathBuf::from).collect(),
            state_file: PathBuf::from(&core.state_file),
            interval: Duration::from_secs(core.interval_secs),
            request_timeout: Duration::from_secs(core.request_timeout_secs),
            heartbeat_timeout: Duration::from_secs(core.heartbeat_timeout_secs),
            dedup_capacity: core.dedup_capacity,
            min_line_length: core.min_line_length,
            max_batch_events: core.max_batch_events,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.log_files.is_empty() {
            return Err(AgentError::Config {
                field: "agent.log_files".to_owned(),
                reason: "at least one log file must be configured".to_owned(),
            });
        }
        for path in &self.log_files {
            validate_log_path(path)?;
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(AgentError::Config {
                field: "agent.server_url".to_owned(),
                reason: format!("'{}' must start with http:// or https://", self.server_url),
            });
        }
        if self.interval.is_zero() {
            return Err(AgentError::Config {
                field: "agent.interval_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.max_batch_events == 0 {
            return Err(AgentError::Config {
                field: "agent.max_batch_events".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if self.max_read_bytes == 0 {
            return Err(AgentError::Config {
                field: "agent.max_read_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}

/// 로그 경로가 안전한지 검증합니다 (path traversal 방지).
fn validate_log_path(path: &Path) -> Result<(), AgentError> {
    if path.as_os_str().is_empty() {
        return Err(AgentError::Config {
            field: "agent.log_files".to_owned(),
            reason: "log file path must not be empty".to_owned(),
        });
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(AgentError::Config {
            field: "agent.log_files".to_owned(),
            reason: format!(
                "log file path '{}' contains path traversal pattern '..'",
                path.display()
            ),
        });
    }
    Ok(())
}
