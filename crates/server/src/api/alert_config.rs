//! `/alert-config` -- 재시작 없이 알림 설정 변경

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::api::auth::Authenticated;
use crate::context::AppContext;
use crate::error::ServerError;
use crate::runtime_config::RuntimeView;

#[derive(Debug, Deserialize)]
pub(crate) struct ValueBody<T> {
    value: T,
}

#[derive(Debug, Serialize)]
pub(crate) struct AlertConfigResponse {
    #[serde(flatten)]
    view: RuntimeView,
    check_interval_seconds: u64,
}

pub(crate) async fn get_config(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
) -> Result<Json<AlertConfigResponse>, ServerError> {
    let snapshot = ctx.runtime.snapshot().await?;
    Ok(Json(AlertConfigResponse {
        view: RuntimeView::from(&snapshot),
        check_interval_seconds: ctx.config.alert.check_interval_secs,
    }))
}

pub(crate) async fn set_severity_threshold(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    body: Result<Json<ValueBody<i64>>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let value = value_of(body)?;
    ctx.runtime.set_severity_threshold(value).await?;
    Ok(updated(format!("Severity threshold set to {value}")))
}

pub(crate) async fn set_inactive_threshold(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    body: Result<Json<ValueBody<i64>>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let value = value_of(body)?;
    ctx.runtime.set_inactive_threshold(value).await?;
    Ok(updated(format!("Inactive threshold set to {value} minutes")))
}

pub(crate) async fn set_quiet_hours(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    body: Result<Json<ValueBody<String>>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let value = value_of(body)?;
    ctx.runtime.set_quiet_hours(&value).await?;
    let message = if value.trim().is_empty() {
        "Quiet hours disabled".to_owned()
    } else {
        format!("Quiet hours set to {}", value.trim())
    };
    Ok(updated(message))
}

pub(crate) async fn set_enabled(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    body: Result<Json<ValueBody<bool>>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let value = value_of(body)?;
    ctx.runtime.set_enabled(value).await?;
    let message = if value {
        "Alerts enabled"
    } else {
        "Alerts disabled"
    };
    Ok(updated(message.to_owned()))
}

fn value_of<T>(body: Result<Json<ValueBody<T>>, JsonRejection>) -> Result<T, ServerError> {
    body.map(|Json(b)| b.value)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

fn updated(message: String) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}
