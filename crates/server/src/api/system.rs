//! `/`, `/health`, `/metrics`

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tracing::warn;

use crate::api::auth::Authenticated;
use crate::context::AppContext;
use crate::error::ServerError;
use crate::store::{EventStore, Summary};

pub(crate) async fn root() -> Json<Value> {
    Json(json!({
        "service": "logwarden",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub(crate) async fn health(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    match ctx.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        ),
        Err(e) => {
            warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "error" })),
            )
        }
    }
}

/// 최근 24시간 요약
pub(crate) async fn metrics(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
) -> Result<Json<Summary>, ServerError> {
    let since = Utc::now() - Duration::hours(24);
    Ok(Json(ctx.store.summary(since).await?))
}
