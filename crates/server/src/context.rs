//! 애플리케이션 컨텍스트
//!
//! 시작 시 한 번 만들어 HTTP 핸들러와 알림 엔진이 `Arc`로 공유합니다.
//! 종료 시 [`AppContext::shutdown`]으로 커넥션 풀을 닫습니다.

use std::sync::Arc;
use std::time::Instant;

use logwarden_core::config::LogwardenConfig;

use crate::error::StorageError;
use crate::ingest::IngestService;
use crate::runtime_config::RuntimeConfigStore;
use crate::store::{EventStore, SqliteStore};

/// 공유 애플리케이션 상태
pub struct AppContext {
    pub config: LogwardenConfig,
    pub store: Arc<SqliteStore>,
    pub runtime: RuntimeConfigStore,
    pub ingest: IngestService,
    pub started_at: Instant,
}

impl AppContext {
    /// 설정의 데이터베이스를 열어 컨텍스트를 만듭니다.
    pub async fn open(config: LogwardenConfig) -> Result<Arc<Self>, StorageError> {
        let store = Arc::new(
            SqliteStore::open(&config.server.database_path, config.server.max_connections).await?,
        );
        Ok(Self::with_store(config, store))
    }

    /// 이미 열린 저장소로 컨텍스트를 만듭니다.
    pub fn with_store(config: LogwardenConfig, store: Arc<SqliteStore>) -> Arc<Self> {
        let shared: Arc<dyn EventStore> = store.clone();
        Arc::new(Self {
            config,
            runtime: RuntimeConfigStore::new(Arc::clone(&shared)),
            ingest: IngestService::new(shared),
            store,
            started_at: Instant::now(),
        })
    }

    /// trait 객체로 본 저장소
    pub fn event_store(&self) -> Arc<dyn EventStore> {
        self.store.clone()
    }

    /// 가동 시간 (초)
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// 커넥션 풀을 닫습니다.
    pub async fn shutdown(&self) {
        self.store.close().await;
    }
}
