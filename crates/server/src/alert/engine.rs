//! 알림 엔진 -- 고정 주기 폴링 태스크
//!
//! 한 주기는 두 단계입니다.
//! 1. 최근 이벤트 중 심각도 임계값 이상이고 `(event_id, critical)` 기록이 없는 것을 알림
//! 2. 비활성 호스트 중 `(host-down-{host}, host_down)` 기록이 없는 것을 알림
//!
//! 기록은 디스패치가 성공한 뒤에만 남습니다. 조용한 시간에는 기록 없이 건너뛰므로
//! 같은 조건이 구간이 끝난 뒤 다시 평가됩니다. 런타임 설정은 매 주기 새로 읽습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::metrics as m;
use logwarden_core::pipeline::{HealthStatus, Pipeline, sleep_cancellable};

use crate::alert::clock::{Clock, SystemClock};
use crate::alert::dispatch::{Dispatcher, LogDispatcher};
use crate::alert::message::AlertMessage;
use crate::error::StorageError;
use crate::liveness::host_report;
use crate::runtime_config::{RuntimeConfigStore, RuntimeSnapshot};
use crate::store::{AlertKind, EventStore};

/// 연속 실패가 이 횟수 이상이면 Degraded
const DEGRADED_AFTER_FAILURES: u32 = 3;

/// 기본 폴링 주기
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// 기본 최근 이벤트 검사 수
pub const DEFAULT_RECENT_EVENTS_LIMIT: u32 = 100;

/// 한 주기 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// 전송되고 기록된 알림 수
    pub dispatched: u32,
    /// 조용한 시간으로 미룬 수
    pub suppressed: u32,
    /// 전송 실패 수 (기록 없음)
    pub failed: u32,
    /// 알림이 꺼져 있어 주기를 건너뛰었는지
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Initialized,
    Running,
    Stopped,
}

#[derive(Debug, Default)]
struct EngineStats {
    cycles: AtomicU64,
    consecutive_failures: AtomicU32,
}

/// 주기 실행에 필요한 공유 상태
struct AlertWorker {
    store: Arc<dyn EventStore>,
    runtime: RuntimeConfigStore,
    dispatcher: Arc<dyn Dispatcher>,
    clock: Arc<dyn Clock>,
    recent_limit: u32,
    stats: EngineStats,
}

enum Decision {
    AlreadySent,
    Suppressed,
    Dispatched,
    Failed,
}

impl AlertWorker {
    async fn run_cycle(&self) -> Result<CycleOutcome, StorageError> {
        let started = Instant::now();
        let result = self.evaluate().await;
        match &result {
            Ok(_) => self.stats.consecutive_failures.store(0, Ordering::Relaxed),
            Err(_) => {
                self.stats.consecutive_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "alert cycle finished");
        result
    }

    async fn evaluate(&self) -> Result<CycleOutcome, StorageError> {
        let snapshot = self.runtime.snapshot().await?;
        let mut outcome = CycleOutcome::default();
        if !snapshot.alerts_enabled {
            debug!("alerts disabled, skipping cycle");
            outcome.skipped = true;
            return Ok(outcome);
        }

        let now = self.clock.now();
        let quiet = snapshot.quiet_hours.is_some_and(|q| q.contains(now));
        if quiet {
            debug!(now = %now, "inside quiet hours, alerts deferred");
        }

        self.check_critical_events(&snapshot, now, quiet, &mut outcome)
            .await?;
        self.check_host_liveness(&snapshot, now, quiet, &mut outcome)
            .await?;

        if outcome.dispatched > 0 || outcome.failed > 0 {
            info!(
                dispatched = outcome.dispatched,
                suppressed = outcome.suppressed,
                failed = outcome.failed,
                "alert cycle complete"
            );
        }
        Ok(outcome)
    }

    async fn check_critical_events(
        &self,
        snapshot: &RuntimeSnapshot,
        now: DateTime<Utc>,
        quiet: bool,
        outcome: &mut CycleOutcome,
    ) -> Result<(), StorageError> {
        let events = self.store.recent_events(self.recent_limit).await?;
        for event in events
            .iter()
            .filter(|e| e.severity >= snapshot.severity_threshold)
        {
            let message = AlertMessage::critical_event(event, now);
            let decision = self.handle(&message, quiet).await?;
            tally(outcome, decision);
        }
        Ok(())
    }

    async fn check_host_liveness(
        &self,
        snapshot: &RuntimeSnapshot,
        now: DateTime<Utc>,
        quiet: bool,
        outcome: &mut CycleOutcome,
    ) -> Result<(), StorageError> {
        let report =
            host_report(self.store.as_ref(), now, snapshot.inactive_threshold_minutes).await?;
        metrics::gauge!(m::ALERT_ACTIVE_HOSTS).set(report.active.len() as f64);
        metrics::gauge!(m::ALERT_INACTIVE_HOSTS).set(report.inactive.len() as f64);

        for host in &report.inactive {
            let message = AlertMessage::host_down(host, now);
            let decision = self.handle(&message, quiet).await?;
            tally(outcome, decision);
        }
        Ok(())
    }

    async fn handle(&self, message: &AlertMessage, quiet: bool) -> Result<Decision, StorageError> {
        if self
            .store
            .alert_exists(&message.condition_id, message.kind)
            .await?
        {
            return Ok(Decision::AlreadySent);
        }

        let kind = message.kind.as_str();
        if quiet {
            metrics::counter!(m::ALERT_SUPPRESSED_TOTAL, m::LABEL_ALERT_KIND => kind).increment(1);
            return Ok(Decision::Suppressed);
        }

        match self.dispatcher.dispatch(message).await {
            Ok(()) => {
                self.store
                    .record_alert(&message.condition_id, message.kind, message.created_at)
                    .await?;
                metrics::counter!(m::ALERT_DISPATCHED_TOTAL, m::LABEL_ALERT_KIND => kind)
                    .increment(1);
                info!(
                    kind,
                    condition_id = %message.condition_id,
                    dispatcher = self.dispatcher.name(),
                    "alert dispatched"
                );
                Ok(Decision::Dispatched)
            }
            Err(e) => {
                metrics::counter!(m::ALERT_DISPATCH_FAILURES_TOTAL, m::LABEL_ALERT_KIND => kind)
                    .increment(1);
                warn!(
                    kind,
                    condition_id = %message.condition_id,
                    error = %e,
                    "alert dispatch failed, will retry next cycle"
                );
                Ok(Decision::Failed)
            }
        }
    }
}

fn tally(outcome: &mut CycleOutcome, decision: Decision) {
    match decision {
        Decision::AlreadySent => {}
        Decision::Suppressed => outcome.suppressed += 1,
        Decision::Dispatched => outcome.dispatched += 1,
        Decision::Failed => outcome.failed += 1,
    }
}

/// 알림 엔진
///
/// [`Pipeline`]으로 백그라운드 태스크를 관리하거나, [`AlertEngine::run`]을 직접
/// 호출하여 취소 토큰으로 종료할 수 있습니다.
pub struct AlertEngine {
    worker: Arc<AlertWorker>,
    interval: Duration,
    state: EngineState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AlertEngine {
    /// 빌더를 생성합니다.
    pub fn builder(store: Arc<dyn EventStore>) -> AlertEngineBuilder {
        AlertEngineBuilder::new(store)
    }

    /// 한 주기를 실행합니다.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, StorageError> {
        self.worker.run_cycle().await
    }

    /// 취소될 때까지 주기를 반복합니다.
    pub async fn run(&self, cancel: CancellationToken) {
        run_loop(Arc::clone(&self.worker), self.interval, cancel).await;
    }

    /// 폴링 주기
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 완료된 주기 수
    pub fn cycles(&self) -> u64 {
        self.worker.stats.cycles.load(Ordering::Relaxed)
    }
}

async fn run_loop(worker: Arc<AlertWorker>, interval: Duration, cancel: CancellationToken) {
    info!(
        interval_secs = interval.as_secs(),
        dispatcher = worker.dispatcher.name(),
        "alert engine started"
    );
    loop {
        if cancel.is_cancelled() {
            break;
        }
        if let Err(e) = worker.run_cycle().await {
            error!(error = %e, "alert cycle failed");
        }
        if !sleep_cancellable(interval, &cancel).await {
            break;
        }
    }
    info!(
        cycles = worker.stats.cycles.load(Ordering::Relaxed),
        "alert engine stopped"
    );
}

impl Pipeline for AlertEngine {
    async fn start(&mut self) -> Result<(), LogwardenError> {
        if self.state == EngineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        self.cancel = CancellationToken::new();
        self.task = Some(tokio::spawn(run_loop(
            Arc::clone(&self.worker),
            self.interval,
            self.cancel.clone(),
        )));
        self.state = EngineState::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogwardenError> {
        if self.state != EngineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| PipelineError::TaskFailed {
                reason: e.to_string(),
            })?;
        }
        self.state = EngineState::Stopped;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            EngineState::Running => {
                let failures = self.worker.stats.consecutive_failures.load(Ordering::Relaxed);
                if failures >= DEGRADED_AFTER_FAILURES {
                    HealthStatus::Degraded(format!("{failures} consecutive alert cycle failures"))
                } else {
                    HealthStatus::Healthy
                }
            }
            EngineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            EngineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 알림 엔진 빌더
///
/// 디스패처와 시계를 지정하지 않으면 [`LogDispatcher`]와 [`SystemClock`]을 사용합니다.
pub struct AlertEngineBuilder {
    store: Arc<dyn EventStore>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    clock: Option<Arc<dyn Clock>>,
    interval: Duration,
    recent_limit: u32,
}

impl AlertEngineBuilder {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            dispatcher: None,
            clock: None,
            interval: DEFAULT_CHECK_INTERVAL,
            recent_limit: DEFAULT_RECENT_EVENTS_LIMIT,
        }
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 폴링 주기. 0이면 기본값을 사용합니다.
    pub fn interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    pub fn recent_limit(mut self, limit: u32) -> Self {
        self.recent_limit = limit.max(1);
        self
    }

    pub fn build(self) -> AlertEngine {
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(LogDispatcher));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let worker = AlertWorker {
            runtime: RuntimeConfigStore::new(Arc::clone(&self.store)),
            store: self.store,
            dispatcher,
            clock,
            recent_limit: self.recent_limit,
            stats: EngineStats::default(),
        };
        AlertEngine {
            worker: Arc::new(worker),
            interval: self.interval,
            state: EngineState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
        }
    }
}
