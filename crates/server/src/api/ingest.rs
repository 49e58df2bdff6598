//! `/ingest`, `/heartbeat`

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use logwarden_core::error::EventError;
use logwarden_core::event::{EventSubmission, OsType};

use crate::api::auth::Authenticated;
use crate::context::AppContext;
use crate::error::ServerError;
use crate::ingest::IngestReport;

/// 하트비트 호스트명 헤더
pub const SOURCE_HOST_HEADER: &str = "source-host";
/// 하트비트 OS 유형 헤더
pub const OS_TYPE_HEADER: &str = "os-type";

#[derive(Debug, Deserialize)]
pub(crate) struct IngestRequest {
    events: Vec<EventSubmission>,
}

pub(crate) async fn ingest(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestReport>, ServerError> {
    let Json(request) = body.map_err(rejection_error)?;
    let report = ctx.ingest.ingest(request.events, Utc::now()).await?;
    Ok(Json(report))
}

pub(crate) async fn heartbeat(
    State(ctx): State<Arc<AppContext>>,
    _auth: Authenticated,
    headers: HeaderMap,
) -> Result<Json<Value>, ServerError> {
    let source_host = required_header(&headers, SOURCE_HOST_HEADER)?;
    let os_type: OsType = required_header(&headers, OS_TYPE_HEADER)?
        .parse()
        .map_err(|e: EventError| ServerError::BadRequest(e.to_string()))?;

    ctx.ingest
        .heartbeat(source_host, os_type, Utc::now())
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Heartbeat recorded for {}", source_host.trim()),
    })))
}

/// 본문 크기 초과는 413, 그 밖의 JSON 거부는 스키마 위반(422)입니다.
fn rejection_error(rejection: JsonRejection) -> ServerError {
    match rejection {
        JsonRejection::BytesRejection(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            ServerError::PayloadTooLarge(e.body_text())
        }
        JsonRejection::BytesRejection(e) => ServerError::BadRequest(e.body_text()),
        other => ServerError::Validation(other.body_text()),
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ServerError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest(format!("missing header '{name}'")))
}
