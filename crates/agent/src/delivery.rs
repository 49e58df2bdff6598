//! 전송 클라이언트 -- 수집 서버로 배치와 하트비트를 보냅니다.
//!
//! # 프로토콜
//! - `POST {server_url}/ingest`, 헤더 `api-key`, 본문 `{"events": [...]}`
//!   성공 조건: HTTP 2xx 이고 응답 본문의 `success == true`
//! - `POST {server_url}/heartbeat`, 헤더 `api-key`, `source-host`, `os-type`, 본문 없음
//!
//! 모든 요청에는 타임아웃이 있으며, 타임아웃은 전송 실패로 취급됩니다.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use logwarden_core::event::{Event, OsType};

use crate::config::AgentSettings;
use crate::error::AgentError;

/// API 키 헤더
pub const API_KEY_HEADER: &str = "api-key";
/// 하트비트 호스트명 헤더
pub const SOURCE_HOST_HEADER: &str = "source-host";
/// 하트비트 OS 유형 헤더
pub const OS_TYPE_HEADER: &str = "os-type";

const INGEST_PATH: &str = "/ingest";
const HEARTBEAT_PATH: &str = "/heartbeat";

/// 수집 서버의 배치 응답
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestAck {
    /// 처리 성공 여부
    pub success: bool,
    /// 사람이 읽는 요약
    #[serde(default)]
    pub message: String,
    /// 새로 저장된 이벤트 수 (중복 제외)
    #[serde(default)]
    pub events_processed: u64,
}

#[derive(Serialize)]
struct IngestRequest<'a> {
    events: &'a [Event],
}

/// 전송 추상화
///
/// 에이전트 루프는 이 트레이트만 알며, 테스트에서는 인메모리 구현으로 대체합니다.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// 한 주기의 이벤트 배치를 전송합니다. `Ok`는 서버가 확인했음을 의미합니다.
    async fn deliver(&self, events: &[Event]) -> Result<IngestAck, AgentError>;

    /// 하트비트를 전송합니다.
    async fn heartbeat(&self) -> Result<(), AgentError>;
}

/// reqwest 기반 HTTP 전송 클라이언트
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    server_url: String,
    api_key: String,
    source_host: String,
    os_type: OsType,
    request_timeout: Duration,
    heartbeat_timeout: Duration,
}

impl HttpDeliveryClient {
    /// 에이전트 설정으로 클라이언트를 생성합니다.
    pub fn new(settings: &AgentSettings) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("logwarden-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Config {
                field: "agent.server_url".to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            server_url: settings.server_url.trim_end_matches('/').to_owned(),
            api_key: settings.api_key.clone(),
            source_host: settings.source_host.clone(),
            os_type: settings.os_type,
            request_timeout: settings.request_timeout,
            heartbeat_timeout: settings.heartbeat_timeout,
        })
    }

    /// 요청 대상 기본 URL
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn headers(&self, with_identity: bool) -> Result<HeaderMap, AgentError> {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, API_KEY_HEADER, &self.api_key)?;
        if with_identity {
            insert_header(&mut headers, SOURCE_HOST_HEADER, &self.source_host)?;
            insert_header(&mut headers, OS_TYPE_HEADER, self.os_type.as_str())?;
        }
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), AgentError> {
    let value = HeaderValue::from_str(value).map_err(|e| AgentError::Config {
        field: name.to_owned(),
        reason: format!("invalid header value: {e}"),
    })?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

fn request_error(endpoint: &str, e: &reqwest::Error) -> AgentError {
    let reason = if e.is_timeout() {
        "request timed out".to_owned()
    } else {
        e.to_string()
    };
    AgentError::Delivery {
        endpoint: endpoint.to_owned(),
        status: e.status().map(|s| s.as_u16()),
        reason,
    }
}

#[async_trait]
impl Delivery for HttpDeliveryClient {
    async fn deliver(&self, events: &[Event]) -> Result<IngestAck, AgentError> {
        let url = format!("{}{INGEST_PATH}", self.server_url);
        debug!(url = %url, events = events.len(), "delivering event batch");

        let response = self
            .client
            .post(&url)
            .headers(self.headers(false)?)
            .timeout(self.request_timeout)
            .json(&IngestRequest { events })
            .send()
            .await
            .map_err(|e| request_error(INGEST_PATH, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_owned());
            return Err(AgentError::Delivery {
                endpoint: INGEST_PATH.to_owned(),
                status: Some(status.as_u16()),
                reason: body,
            });
        }

        let ack: IngestAck = response
            .json()
            .await
            .map_err(|e| request_error(INGEST_PATH, &e))?;
        if !ack.success {
            return Err(AgentError::Delivery {
                endpoint: INGEST_PATH.to_owned(),
                status: Some(status.as_u16()),
                reason: format!("server reported failure: {}", ack.message),
            });
        }
        Ok(ack)
    }

    async fn heartbeat(&self) -> Result<(), AgentError> {
        let url = format!("{}{HEARTBEAT_PATH}", self.server_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(true)?)
            .timeout(self.heartbeat_timeout)
            .send()
            .await
            .map_err(|e| request_error(HEARTBEAT_PATH, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Delivery {
                endpoint: HEARTBEAT_PATH.to_owned(),
                status: Some(status.as_u16()),
                reason: format!("heartbeat rejected with {status}"),
            });
        }
        debug!(host = %self.source_host, "heartbeat sent");
        Ok(())
    }
}
