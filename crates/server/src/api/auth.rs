//! API 키 인증
//!
//! 헤더가 없으면 401, 값이 다르면 403입니다. 서버에 키가 설정되지 않았으면
//! 모든 요청을 통과시킵니다.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;

use crate::context::AppContext;
use crate::error::ServerError;

/// API 키 헤더 이름
pub const API_KEY_HEADER: &str = "api-key";

/// 인증을 통과한 요청 표시
#[derive(Debug, Clone, Copy)]
pub struct Authenticated;

impl FromRequestParts<Arc<AppContext>> for Authenticated {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        check_api_key(
            &ctx.config.server.api_key,
            parts
                .headers
                .get(API_KEY_HEADER)
                .map(|v| v.to_str().unwrap_or_default()),
        )?;
        Ok(Self)
    }
}

/// 헤더 값을 설정된 키와 비교합니다.
pub(crate) fn check_api_key(expected: &str, provided: Option<&str>) -> Result<(), ServerError> {
    if expected.is_empty() {
        return Ok(());
    }
    match provided {
        None => Err(ServerError::Unauthorized),
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(()),
        Some(_) => {
            warn!("rejected request with invalid API key");
            Err(ServerError::Forbidden)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
