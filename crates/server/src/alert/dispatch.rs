//! 알림 디스패처
//!
//! 알림 엔진은 [`Dispatcher`] trait만 호출합니다. 성공(`Ok`)일 때만 알림 기록이
//! 남으므로, 실패한 알림은 다음 주기에 다시 시도됩니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use logwarden_core::config::AlertConfig;

use crate::alert::message::AlertMessage;
use crate::error::DispatchError;

/// 기본 Telegram API 주소
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// 알림 전송 추상화
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// 메시지를 전송합니다.
    async fn dispatch(&self, message: &AlertMessage) -> Result<(), DispatchError>;

    /// 로그용 이름
    fn name(&self) -> &'static str;
}

/// tracing 로그로만 알림을 남기는 디스패처
#[derive(Debug, Clone, Default)]
pub struct LogDispatcher;

#[async_trait]
impl Dispatcher for LogDispatcher {
    async fn dispatch(&self, message: &AlertMessage) -> Result<(), DispatchError> {
        info!(
            kind = %message.kind,
            condition_id = %message.condition_id,
            alert = %message.render_plain(),
            "alert"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

/// Telegram Bot API 디스패처
#[derive(Debug, Clone)]
pub struct TelegramDispatcher {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    timeout: Duration,
}

impl TelegramDispatcher {
    /// 토큰과 채팅 ID로 생성합니다. 둘 중 하나라도 비어 있으면 에러입니다.
    pub fn new(
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let bot_token = bot_token.into();
        let chat_id = chat_id.into();
        if bot_token.trim().is_empty() {
            return Err(DispatchError::NotConfigured(
                "telegram_bot_token is empty".to_owned(),
            ));
        }
        if chat_id.trim().is_empty() {
            return Err(DispatchError::NotConfigured(
                "telegram_chat_id is empty".to_owned(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("logwarden-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DispatchError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: TELEGRAM_API_BASE.to_owned(),
            bot_token,
            chat_id,
            timeout,
        })
    }

    /// API 주소를 바꿉니다 (테스트용 목 서버).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl Dispatcher for TelegramDispatcher {
    async fn dispatch(&self, message: &AlertMessage) -> Result<(), DispatchError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: message.render_html(),
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "telegram rejected alert");
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

/// 설정에 맞는 디스패처를 생성합니다.
pub fn dispatcher_from_config(config: &AlertConfig) -> Result<Arc<dyn Dispatcher>, DispatchError> {
    match config.dispatcher.as_str() {
        "log" => Ok(Arc::new(LogDispatcher)),
        "telegram" => Ok(Arc::new(TelegramDispatcher::new(
            config.telegram_bot_token.clone(),
            config.telegram_chat_id.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?)),
        other => Err(DispatchError::NotConfigured(format!(
            "unknown dispatcher '{other}' (expected log or telegram)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    use crate::liveness::HostStatus;

    use super::*;

    type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    async fn spawn_mock(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/{bot}/sendMessage",
                post(
                    move |State(store): State<Captured>,
                          Path(bot): Path<String>,
                          Json(body): Json<Value>| async move {
                        store.lock().unwrap().push((bot, body));
                        (status, Json(serde_json::json!({ "ok": status.is_success() })))
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    fn message() -> AlertMessage {
        let host = HostStatus {
            hostname: "db-01".to_owned(),
            os_type: "LINUX".to_owned(),
            last_seen: "2025-03-10T11:40:00.000000Z".to_owned(),
            total_events: 1,
            minutes_since_seen: 20,
        };
        AlertMessage::host_down(&host, Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn telegram_posts_html_message() {
        let (base, captured) = spawn_mock(StatusCode::OK).await;
        let dispatcher = TelegramDispatcher::new("TOKEN", "42", Duration::from_secs(5))
            .unwrap()
            .with_api_base(base);

        dispatcher.dispatch(&message()).await.unwrap();

        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "botTOKEN");
        assert_eq!(calls[0].1["chat_id"], "42");
        assert_eq!(calls[0].1["parse_mode"], "HTML");
        assert!(calls[0].1["text"].as_str().unwrap().contains("Host Offline: db-01"));
    }

    #[tokio::test]
    async fn telegram_rejection_is_an_error() {
        let (base, _captured) = spawn_mock(StatusCode::BAD_REQUEST).await;
        let dispatcher = TelegramDispatcher::new("TOKEN", "42", Duration::from_secs(5))
            .unwrap()
            .with_api_base(base);

        let err = dispatcher.dispatch(&message()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn unreachable_api_is_request_error() {
        let dispatcher = TelegramDispatcher::new("TOKEN", "42", Duration::from_millis(500))
            .unwrap()
            .with_api_base("http://127.0.0.1:1");
        let err = dispatcher.dispatch(&message()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Request(_)));
    }

    #[test]
    fn telegram_requires_token_and_chat() {
        assert!(TelegramDispatcher::new("", "42", Duration::from_secs(1)).is_err());
        assert!(TelegramDispatcher::new("TOKEN", " ", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn factory_selects_dispatcher() {
        let mut config = AlertConfig::default();
        assert_eq!(dispatcher_from_config(&config).unwrap().name(), "log");

        config.dispatcher = "telegram".to_owned();
        assert!(dispatcher_from_config(&config).is_err());

        config.telegram_bot_token = "TOKEN".to_owned();
        config.telegram_chat_id = "42".to_owned();
        assert_eq!(dispatcher_from_config(&config).unwrap().name(), "telegram");

        config.dispatcher = "pager".to_owned();
        assert!(dispatcher_from_config(&config).is_err());
    }

    #[tokio::test]
    async fn log_dispatcher_always_succeeds() {
        assert!(LogDispatcher.dispatch(&message()).await.is_ok());
    }
}
