//! `GET /hosts`, `DELETE /hosts/{hostname}`

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::api::auth::Authenticated;
use crate::context::AppContext;
use crate::error::ServerError;
use crate::liveness::{DEFAULT_INACTIVE_THRESHOLD_MINUTES, HostStatus, host_report};
use crate::runtime_config::MAX_INACTIVE_THRESHOLD_MINUTES;
use crate::store::EventStore;

#[derive(Debug, Deserialize)]
pub(crate) struct HostsQuery {
    inactive_threshold: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HostsResponse {
    success: bool,
    active_hosts: Vec<HostStatus>,
    inactive_hosts: Vec<HostStatus>,
    threshold_minutes: u32,
    total_active: usize,
    total_inactive: usize,
}

pub(crate) async fn list_hosts(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    query: Result<Query<HostsQuery>, QueryRejection>,
) -> Result<Json<HostsResponse>, ServerError> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let threshold = query
        .inactive_threshold
        .unwrap_or(DEFAULT_INACTIVE_THRESHOLD_MINUTES);
    if !(1..=MAX_INACTIVE_THRESHOLD_MINUTES).contains(&threshold) {
        return Err(ServerError::BadRequest(format!(
            "inactive_threshold must be between 1 and {MAX_INACTIVE_THRESHOLD_MINUTES}"
        )));
    }

    let report = host_report(&*ctx.store, Utc::now(), threshold).await?;
    Ok(Json(HostsResponse {
        success: true,
        total_active: report.active.len(),
        total_inactive: report.inactive.len(),
        active_hosts: report.active,
        inactive_hosts: report.inactive,
        threshold_minutes: report.threshold_minutes,
    }))
}

pub(crate) async fn delete_host(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    Path(hostname): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let removed = ctx.store.delete_host(&hostname).await?;
    if removed == 0 {
        return Err(ServerError::NotFound(format!("host '{hostname}' not found")));
    }
    info!(host = %hostname, removed, "host deleted");
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted host {hostname}"),
        "rows_removed": removed,
    })))
}
