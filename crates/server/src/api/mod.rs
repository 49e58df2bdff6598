//! HTTP API (axum)
//!
//! | 메서드 | 경로 | 인증 |
//! |---|---|---|
//! | GET | `/` | - |
//! | GET | `/health` | - |
//! | POST | `/ingest` | api-key |
//! | POST | `/heartbeat` | api-key |
//! | GET | `/events` | api-key |
//! | GET | `/hosts` | api-key |
//! | DELETE | `/hosts/{hostname}` | api-key |
//! | GET | `/alert-config` | api-key |
//! | POST | `/alert-config/{severity-threshold,inactive-threshold,quiet-hours,enable}` | api-key |
//! | GET | `/metrics` | api-key |

mod alert_config;
mod auth;
mod events;
mod hosts;
mod ingest;
mod system;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tracing::info;

use crate::context::AppContext;
use crate::error::ServerError;

pub use auth::{API_KEY_HEADER, Authenticated};

/// 전체 라우터를 구성합니다.
///
/// `/ingest` 본문 상한은 `server.max_body_bytes`입니다.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let body_limit = DefaultBodyLimit::max(ctx.config.server.max_body_bytes);
    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .route("/ingest", post(ingest::ingest).layer(body_limit))
        .route("/heartbeat", post(ingest::heartbeat))
        .route("/events", get(events::list_events))
        .route("/hosts", get(hosts::list_hosts))
        .route("/hosts/{hostname}", delete(hosts::delete_host))
        .route("/alert-config", get(alert_config::get_config))
        .route(
            "/alert-config/severity-threshold",
            post(alert_config::set_severity_threshold),
        )
        .route(
            "/alert-config/inactive-threshold",
            post(alert_config::set_inactive_threshold),
        )
        .route("/alert-config/quiet-hours", post(alert_config::set_quiet_hours))
        .route("/alert-config/enable", post(alert_config::set_enabled))
        .with_state(ctx)
}

/// 설정된 주소에 바인드합니다.
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
        addr: addr.to_owned(),
        reason: e.to_string(),
    })
}

/// `shutdown`이 완료될 때까지 요청을 처리합니다. 진행 중인 요청은 마무리합니다.
pub async fn serve<F>(listener: TcpListener, ctx: Arc<AppContext>, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_owned());
    info!(addr = %addr, "http api listening");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Bind {
            addr,
            reason: e.to_string(),
        })?;

    info!("http api stopped");
    Ok(())
}
