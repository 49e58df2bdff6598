//! `GET /events`

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use logwarden_core::event::{Event, Severity};

use crate::api::auth::Authenticated;
use crate::context::AppContext;
use crate::error::ServerError;
use crate::store::{EventFilter, EventStore};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EventsQuery {
    os_type: Option<String>,
    severity: Option<i64>,
    severity_min: Option<i64>,
    event_type: Option<String>,
    source_ip: Option<String>,
    user: Option<String>,
    source_host: Option<String>,
    raw_message: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EventsResponse {
    success: bool,
    total_count: u64,
    offset: u32,
    limit: u32,
    count: usize,
    events: Vec<Event>,
}

pub(crate) async fn list_events(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<EventsResponse>, ServerError> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let server = &ctx.config.server;
    let filter = build_filter(query, server.default_events_limit, server.max_events_limit)?;

    let page = ctx.store.query_events(&filter).await?;
    Ok(Json(EventsResponse {
        success: true,
        total_count: page.total_count,
        offset: filter.offset,
        limit: filter.limit,
        count: page.events.len(),
        events: page.events,
    }))
}

/// 쿼리 문자열을 저장소 필터로 변환합니다. 빈 값은 조건 없음으로 봅니다.
pub(crate) fn build_filter(
    query: EventsQuery,
    default_limit: u32,
    max_limit: u32,
) -> Result<EventFilter, ServerError> {
    let bad = |e: logwarden_core::error::EventError| ServerError::BadRequest(e.to_string());

    Ok(EventFilter {
        os_type: non_empty(query.os_type).map(|v| v.parse()).transpose().map_err(bad)?,
        severity: query.severity.map(Severity::new).transpose().map_err(bad)?,
        severity_min: query.severity_min.map(Severity::new).transpose().map_err(bad)?,
        event_type: non_empty(query.event_type)
            .map(|v| v.parse())
            .transpose()
            .map_err(bad)?,
        source_ip: non_empty(query.source_ip),
        user: non_empty(query.user),
        source_host: non_empty(query.source_host),
        raw_message: non_empty(query.raw_message),
        start_date: parse_date("start_date", query.start_date)?,
        end_date: parse_date("end_date", query.end_date)?,
        limit: query
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(max_limit),
        offset: query.offset.unwrap_or(0),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(field: &str, value: Option<String>) -> Result<Option<NaiveDate>, ServerError> {
    non_empty(value)
        .map(|v| {
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").map_err(|_| {
                ServerError::BadRequest(format!("{field} must be YYYY-MM-DD, got '{v}'"))
            })
        })
        .transpose()
}
