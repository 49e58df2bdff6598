//! 수집 서비스 -- 검증, 멱등 저장, 암묵적 하트비트
//!
//! 배치의 이벤트 하나라도 스키마를 위반하면 요청 전체를 거부합니다.
//! 중복 ID는 행 단위로 건너뛰며 배치는 계속 진행됩니다. 새 이벤트가 저장된
//! 호스트는 수신 시각으로 하트비트가 갱신됩니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use logwarden_core::event::{Event, EventSubmission, OsType};
use logwarden_core::metrics as m;

use crate::error::ServerError;
use crate::store::EventStore;

/// 배치 처리 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub success: bool,
    pub message: String,
    /// 새로 저장된 이벤트 수 (중복 제외)
    pub events_processed: u64,
    #[serde(skip)]
    pub duplicates: u64,
}

/// 수집 서비스
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn EventStore>,
}

impl IngestService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// 제출된 배치를 검증하고 저장합니다.
    pub async fn ingest(
        &self,
        submissions: Vec<EventSubmission>,
        received_at: DateTime<Utc>,
    ) -> Result<IngestReport, ServerError> {
        let events = validate_batch(submissions).inspect_err(|e| {
            metrics::counter!(m::INGEST_REJECTED_REQUESTS_TOTAL).increment(1);
            warn!(error = %e, "ingest request rejected");
        })?;

        let outcome = self.store.insert_events(&events).await?;
        for (host, os_type) in &outcome.stored_hosts {
            self.store
                .record_heartbeat(host, *os_type, received_at)
                .await?;
        }

        metrics::counter!(m::INGEST_EVENTS_STORED_TOTAL).increment(outcome.stored);
        metrics::counter!(m::INGEST_DUPLICATES_TOTAL).increment(outcome.duplicates);

        let mut message = format!("Processed {} events", outcome.stored);
        if outcome.duplicates > 0 {
            message.push_str(&format!(", {} duplicates skipped", outcome.duplicates));
        }
        if outcome.stored > 0 {
            info!(
                stored = outcome.stored,
                duplicates = outcome.duplicates,
                hosts = outcome.stored_hosts.len(),
                "events ingested"
            );
        } else {
            debug!(
                received = events.len(),
                duplicates = outcome.duplicates,
                "batch contained no new events"
            );
        }

        Ok(IngestReport {
            success: true,
            message,
            events_processed: outcome.stored,
            duplicates: outcome.duplicates,
        })
    }

    /// 명시적 하트비트를 기록합니다.
    pub async fn heartbeat(
        &self,
        source_host: &str,
        os_type: OsType,
        at: DateTime<Utc>,
    ) -> Result<(), ServerError> {
        let source_host = source_host.trim();
        if source_host.is_empty() {
            return Err(ServerError::BadRequest("source-host must not be empty".to_owned()));
        }
        self.store.record_heartbeat(source_host, os_type, at).await?;
        metrics::counter!(m::INGEST_HEARTBEATS_TOTAL).increment(1);
        debug!(host = source_host, os_type = %os_type, "heartbeat recorded");
        Ok(())
    }
}

/// 모든 제출을 검증합니다. 첫 위반 이벤트의 위치와 이유를 에러에 담습니다.
pub fn validate_batch(submissions: Vec<EventSubmission>) -> Result<Vec<Event>, ServerError> {
    submissions
        .into_iter()
        .enumerate()
        .map(|(index, submission)| {
            submission
                .into_event()
                .map_err(|e| ServerError::Validation(format!("events[{index}]: {e}")))
        })
        .collect()
}
