//! 설정 관리 -- logwarden.toml 파싱 및 런타임 설정
//!
//! [`LogwardenConfig`]는 에이전트와 서버 양쪽의 설정을 담는 최상위 구조체입니다.
//! 각 역할은 자기 섹션만 읽어 사용합니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWARDEN_AGENT_SERVER_URL=http://siem:8000` 형식)
//! 3. 설정 파일 (`logwarden.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 알림 엔진의 임계값처럼 운영 중 바뀌는 값은 여기가 아니라
//! 서버의 런타임 설정 저장소에 있습니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logwarden_core::error::LogwardenError> {
//! use logwarden_core::config::LogwardenConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogwardenConfig::load("logwarden.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogwardenConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogwardenError};
use crate::event::OsType;

/// `/ingest` 본문 크기 상한 기본값 (16MB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// `server.max_body_bytes` 하한 (64KB)
const MIN_BODY_BYTES: usize = 64 * 1024;

/// Logwarden 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogwardenConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 에이전트 설정
    #[serde(default)]
    pub agent: AgentConfig,
    /// 수집 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 알림 엔진 설정
    #[serde(default)]
    pub alert: AlertConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogwardenConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogwardenError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogwardenError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwardenError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWARDEN_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWARDEN_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "LOGWARDEN_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "LOGWARDEN_GENERAL_PID_FILE");

        // Agent
        override_string(&mut self.agent.server_url, "LOGWARDEN_AGENT_SERVER_URL");
        override_string(&mut self.agent.api_key, "LOGWARDEN_AGENT_API_KEY");
        override_string(&mut self.agent.source_host, "LOGWARDEN_AGENT_SOURCE_HOST");
        override_string(&mut self.agent.os_type, "LOGWARDEN_AGENT_OS_TYPE");
        override_csv(&mut self.agent.log_files, "LOGWARDEN_AGENT_LOG_FILES");
        override_string(&mut self.agent.state_file, "LOGWARDEN_AGENT_STATE_FILE");
        override_u64(&mut self.agent.interval_secs, "LOGWARDEN_AGENT_INTERVAL_SECS");
        override_u64(
            &mut self.agent.request_timeout_secs,
            "LOGWARDEN_AGENT_REQUEST_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.agent.heartbeat_timeout_secs,
            "LOGWARDEN_AGENT_HEARTBEAT_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.agent.dedup_capacity,
            "LOGWARDEN_AGENT_DEDUP_CAPACITY",
        );
        override_usize(
            &mut self.agent.min_line_length,
            "LOGWARDEN_AGENT_MIN_LINE_LENGTH",
        );
        override_usize(
            &mut self.agent.max_batch_events,
            "LOGWARDEN_AGENT_MAX_BATCH_EVENTS",
        );

        // Server
        override_string(&mut self.server.bind, "LOGWARDEN_SERVER_BIND");
        override_string(
            &mut self.server.database_path,
            "LOGWARDEN_SERVER_DATABASE_PATH",
        );
        override_string(&mut self.server.api_key, "LOGWARDEN_SERVER_API_KEY");
        override_u32(
            &mut self.server.max_connections,
            "LOGWARDEN_SERVER_MAX_CONNECTIONS",
        );
        override_u32(
            &mut self.server.default_events_limit,
            "LOGWARDEN_SERVER_DEFAULT_EVENTS_LIMIT",
        );
        override_u32(
            &mut self.server.max_events_limit,
            "LOGWARDEN_SERVER_MAX_EVENTS_LIMIT",
        );
        override_usize(
            &mut self.server.max_body_bytes,
            "LOGWARDEN_SERVER_MAX_BODY_BYTES",
        );

        // Alert
        override_bool(&mut self.alert.enabled, "LOGWARDEN_ALERT_ENABLED");
        override_u64(
            &mut self.alert.check_interval_secs,
            "LOGWARDEN_ALERT_CHECK_INTERVAL_SECS",
        );
        override_u32(
            &mut self.alert.recent_events_limit,
            "LOGWARDEN_ALERT_RECENT_EVENTS_LIMIT",
        );
        override_string(&mut self.alert.dispatcher, "LOGWARDEN_ALERT_DISPATCHER");
        override_string(
            &mut self.alert.telegram_bot_token,
            "LOGWARDEN_ALERT_TELEGRAM_BOT_TOKEN",
        );
        override_string(
            &mut self.alert.telegram_chat_id,
            "LOGWARDEN_ALERT_TELEGRAM_CHAT_ID",
        );
        override_u64(
            &mut self.alert.request_timeout_secs,
            "LOGWARDEN_ALERT_REQUEST_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGWARDEN_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGWARDEN_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGWARDEN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwardenError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.agent.os_type.parse::<OsType>().is_err() {
            let names: Vec<&str> = OsType::ALL.iter().map(|os| os.as_str()).collect();
            return Err(invalid(
                "agent.os_type",
                format!("must be one of: {}", names.join(", ")),
            ));
        }

        if self.agent.interval_secs == 0 {
            return Err(invalid("agent.interval_secs", "must be greater than 0"));
        }
        if self.agent.request_timeout_secs == 0 || self.agent.heartbeat_timeout_secs == 0 {
            return Err(invalid("agent.request_timeout_secs", "timeouts must be greater than 0"));
        }
        if self.agent.dedup_capacity == 0 {
            return Err(invalid("agent.dedup_capacity", "must be greater than 0"));
        }
        if self.agent.max_batch_events == 0 {
            return Err(invalid("agent.max_batch_events", "must be greater than 0"));
        }

        if self.server.max_connections == 0 {
            return Err(invalid("server.max_connections", "must be greater than 0"));
        }
        if self.server.default_events_limit == 0
            || self.server.max_events_limit < self.server.default_events_limit
        {
            return Err(invalid(
                "server.max_events_limit",
                "must be >= default_events_limit and both greater than 0",
            ));
        }

        if self.server.max_body_bytes < MIN_BODY_BYTES {
            return Err(invalid(
                "server.max_body_bytes",
                format!("must be at least {MIN_BODY_BYTES} bytes"),
            ));
        }

        if self.alert.check_interval_secs == 0 {
            return Err(invalid("alert.check_interval_secs", "must be greater than 0"));
        }

        let valid_dispatchers = ["log", "telegram"];
        if !valid_dispatchers.contains(&self.alert.dispatcher.as_str()) {
            return Err(invalid(
                "alert.dispatcher",
                format!("must be one of: {}", valid_dispatchers.join(", ")),
            ));
        }
        if self.alert.dispatcher == "telegram"
            && (self.alert.telegram_bot_token.is_empty() || self.alert.telegram_chat_id.is_empty())
        {
            return Err(invalid(
                "alert.telegram_bot_token",
                "telegram dispatcher requires telegram_bot_token and telegram_chat_id",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LogwardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// PID 파일 경로 (빈 값이면 사용하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/logwarden".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 에이전트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 수집 서버 기본 URL
    pub server_url: String,
    /// 수집 서버 API 키
    pub api_key: String,
    /// 보고할 호스트명 (빈 값이면 시스템 호스트명)
    pub source_host: String,
    /// 소스 플랫폼 (WINDOWS, LINUX, PIHOLE, MACOS, FIREWALL)
    pub os_type: String,
    /// 감시할 로그 파일 목록
    pub log_files: Vec<String>,
    /// 커서 상태 파일 경로
    pub state_file: String,
    /// 수집 주기 (초)
    pub interval_secs: u64,
    /// 배치 전송 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 하트비트 타임아웃 (초)
    pub heartbeat_timeout_secs: u64,
    /// 세션 중복 캐시 용량
    pub dedup_capacity: usize,
    /// 분류 대상 최소 라인 길이 (공백 제거 후)
    pub min_line_length: usize,
    /// `/ingest` 요청 하나에 담을 최대 이벤트 수
    ///
    /// 밀린 로그를 따라잡는 주기에는 배치를 이 크기로 나누어 전송합니다.
    pub max_batch_events: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_owned(),
            api_key: String::new(),
            source_host: String::new(),
            os_type: "LINUX".to_owned(),
            log_files: vec!["/var/log/auth.log".to_owned()],
            state_file: ".logwarden_agent_state".to_owned(),
            interval_secs: 30,
            request_timeout_secs: 30,
            heartbeat_timeout_secs: 10,
            dedup_capacity: 100_000,
            min_line_length: 10,
            max_batch_events: 500,
        }
    }
}

impl AgentConfig {
    /// 설정된 호스트명, 없으면 시스템 호스트명을 반환합니다.
    pub fn resolved_source_host(&self) -> String {
        if !self.source_host.trim().is_empty() {
            return self.source_host.trim().to_owned();
        }
        std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|h| h.trim().to_owned())
                    .filter(|h| !h.is_empty())
            })
            .unwrap_or_else(|| "localhost".to_owned())
    }
}

/// 수집 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP 바인드 주소
    pub bind: String,
    /// SQLite 데이터베이스 경로 (`:memory:` 허용)
    pub database_path: String,
    /// API 키 (빈 값이면 인증 비활성화)
    pub api_key: String,
    /// 커넥션 풀 최대 크기
    pub max_connections: u32,
    /// `/events` 기본 limit
    pub default_events_limit: u32,
    /// `/events` limit 상한
    pub max_events_limit: u32,
    /// `/ingest` 요청 본문 최대 크기 (바이트)
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_owned(),
            database_path: "logwarden.db".to_owned(),
            api_key: String::new(),
            max_connections: 5,
            default_events_limit: 1000,
            max_events_limit: 10_000,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// 알림 엔진 설정
///
/// 임계값, 조용한 시간대, 활성화 여부는 런타임 설정 저장소에서 매 주기 읽습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// 알림 엔진 태스크 실행 여부
    pub enabled: bool,
    /// 폴링 주기 (초)
    pub check_interval_secs: u64,
    /// 한 주기에 검사할 최근 이벤트 수
    pub recent_events_limit: u32,
    /// 디스패처 종류 (log, telegram)
    pub dispatcher: String,
    /// Telegram 봇 토큰
    pub telegram_bot_token: String,
    /// Telegram 채팅 ID
    pub telegram_chat_id: String,
    /// 디스패치 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 60,
            recent_events_limit: 100,
            dispatcher: "log".to_owned(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            request_timeout_secs: 10,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
