//! 에이전트 루프 -- 읽기/중복 제거/분류/전송/커서 커밋을 한 주기로 실행합니다.
//!
//! [`Agent`]는 core의 [`Pipeline`] trait을 구현하여 데몬에서
//! start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 한 주기
//! ```text
//! 모든 소스 read_new → 세션 중복 제거 → 분류 → 배치 전송 → (확인 시) 하트비트 + 커서 커밋
//! ```
//! 전송이 실패하면 커서를 커밋하지 않고, 이번 주기에 기록한 중복 캐시 항목도 되돌립니다.
//! 다음 주기에 같은 구간을 다시 읽어 재분류하며, 같은 라인은 같은 ID를 가지므로
//! 서버에서 중복으로 흡수됩니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::event::Event;
use logwarden_core::metrics as m;
use logwarden_core::pipeline::{HealthStatus, Pipeline, sleep_cancellable};

use crate::classifier::LineClassifier;
use crate::collector::{FileSource, LogSource, SourceState};
use crate::config::AgentSettings;
use crate::dedup::SessionDedupCache;
use crate::delivery::{Delivery, HttpDeliveryClient};
use crate::error::AgentError;
use crate::offset::OffsetStore;

/// 연속 전송 실패가 이 횟수 이상이면 Degraded
pub const DEGRADED_AFTER_FAILURES: u32 = 3;

/// 한 주기의 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 모든 소스에서 읽은 라인 수
    pub lines_read: usize,
    /// 세션 중복 캐시에 걸러진 라인 수
    pub dedup_hits: usize,
    /// 분류된 이벤트 수
    pub events: usize,
    /// 모든 배치가 서버에서 확인되었는지 여부
    pub delivered: bool,
    /// 전송한 `/ingest` 요청 수
    pub batches: usize,
    /// 서버가 새로 저장했다고 보고한 이벤트 수
    pub events_processed: u64,
    /// 하트비트 전송 성공 여부
    pub heartbeat_sent: bool,
    /// 커서가 커밋되었는지 여부
    pub committed: bool,
}

/// 루프와 공유하는 상태 카운터
#[derive(Debug, Default)]
struct AgentStats {
    consecutive_failures: AtomicU32,
    cycles: AtomicU64,
}

/// 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentState {
    Initialized,
    Running,
    Stopped,
}

/// 한 주기를 실행하는 내부 상태
struct CycleRunner {
    settings: AgentSettings,
    classifier: LineClassifier,
    dedup: SessionDedupCache,
    offsets: OffsetStore,
    source: Arc<dyn LogSource>,
    delivery: Arc<dyn Delivery>,
    stats: Arc<AgentStats>,
}

impl CycleRunner {
    async fn run_cycle(&mut self) -> Result<CycleReport, AgentError> {
        let started = Instant::now();
        let observed_at = Utc::now();
        let mut report = CycleReport::default();
        let mut pending: Vec<(String, u64)> = Vec::new();
        let mut recorded: Vec<String> = Vec::new();
        let mut events: Vec<Event> = Vec::new();

        for path in &self.settings.log_files {
            let source_id = path.display().to_string();
            let committed = self.offsets.get(&source_id);

            let read = match self.source.read_new(&source_id, committed).await {
                Ok(read) => read,
                Err(e) => {
                    warn!(source = %source_id, error = %e, "failed to read log source");
                    continue;
                }
            };
            if read.state == SourceState::Rotated {
                info!(source = %source_id, previous = committed, "cursor reset after rotation");
            }

            report.lines_read += read.lines.len();
            for line in read.lines.iter().filter(|l| !l.trim().is_empty()) {
                if !self.dedup.insert(line) {
                    report.dedup_hits += 1;
                    continue;
                }
                recorded.push(line.clone());
                if let Some(event) = self.classifier.classify(line, observed_at) {
                    events.push(event);
                }
            }

            if read.advanced(committed) {
                pending.push((source_id, read.next_offset));
            }
        }

        report.events = events.len();
        metrics::counter!(m::AGENT_LINES_READ_TOTAL).increment(report.lines_read as u64);
        metrics::counter!(m::AGENT_DEDUP_HITS_TOTAL).increment(report.dedup_hits as u64);
        metrics::counter!(
            m::AGENT_EVENTS_CLASSIFIED_TOTAL,
            m::LABEL_OS_TYPE => self.settings.os_type.as_str()
        )
        .increment(report.events as u64);

        if events.is_empty() {
            // 재전송할 이벤트가 없으므로 하트비트 결과와 무관하게 커밋합니다.
            report.heartbeat_sent = self.send_heartbeat().await;
        } else {
            match self.deliver_batches(&events).await {
                Ok(processed) => {
                    self.stats.consecutive_failures.store(0, Ordering::Relaxed);
                    report.delivered = true;
                    report.batches = events.len().div_ceil(self.settings.max_batch_events);
                    report.events_processed = processed;
                    report.heartbeat_sent = self.send_heartbeat().await;
                }
                Err(e) => {
                    let failures = self.stats.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        error = %e,
                        events = events.len(),
                        consecutive_failures = failures,
                        "event batch delivery failed, cursors not committed"
                    );
                    for line in &recorded {
                        self.dedup.forget(line);
                    }
                    self.finish(&report, started);
                    return Ok(report);
                }
            }
        }

        self.offsets
            .commit(pending.iter().map(|(source, offset)| (source.as_str(), *offset)))
            .await?;
        report.committed = true;
        self.finish(&report, started);
        Ok(report)
    }

    /// 이벤트를 `max_batch_events` 크기로 나누어 순서대로 전송합니다.
    ///
    /// 하나라도 실패하면 즉시 에러를 반환합니다. 앞서 확인된 배치는 다음 주기에
    /// 다시 전송되어 서버에서 중복으로 흡수됩니다.
    async fn deliver_batches(&self, events: &[Event]) -> Result<u64, AgentError> {
        let mut processed = 0;
        for batch in events.chunks(self.settings.max_batch_events) {
            match self.delivery.deliver(batch).await {
                Ok(ack) => {
                    metrics::counter!(m::AGENT_DELIVERIES_TOTAL, m::LABEL_RESULT => "success")
                        .increment(1);
                    info!(
                        events = batch.len(),
                        processed = ack.events_processed,
                        message = %ack.message,
                        "event batch delivered"
                    );
                    processed += ack.events_processed;
                }
                Err(e) => {
                    metrics::counter!(m::AGENT_DELIVERIES_TOTAL, m::LABEL_RESULT => "failure")
                        .increment(1);
                    return Err(e);
                }
            }
        }
        Ok(processed)
    }

    async fn send_heartbeat(&self) -> bool {
        match self.delivery.heartbeat().await {
            Ok(()) => {
                metrics::counter!(m::AGENT_HEARTBEATS_TOTAL, m::LABEL_RESULT => "success")
                    .increment(1);
                true
            }
            Err(e) => {
                metrics::counter!(m::AGENT_HEARTBEATS_TOTAL, m::LABEL_RESULT => "failure")
                    .increment(1);
                warn!(error = %e, "heartbeat failed");
                false
            }
        }
    }

    fn finish(&self, report: &CycleReport, started: Instant) {
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        metrics::histogram!(m::AGENT_CYCLE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        debug!(?report, "cycle finished");
    }
}

/// 호스트 에이전트
///
/// # 사용 예시
/// ```ignore
/// use logwarden_agent::{AgentBuilder, AgentSettings};
///
/// let mut agent = AgentBuilder::new(settings).build().await?;
/// let report = agent.run_cycle().await?;
/// ```
pub struct Agent {
    runner: Arc<Mutex<CycleRunner>>,
    stats: Arc<AgentStats>,
    interval: Duration,
    state: AgentState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Agent {
    /// 한 주기를 실행합니다.
    pub async fn run_cycle(&self) -> Result<CycleReport, AgentError> {
        self.runner.lock().await.run_cycle().await
    }

    /// 취소될 때까지 주기를 반복합니다. 주기 안의 에러는 로그만 남기고 계속합니다.
    pub async fn run(&self, cancel: CancellationToken) {
        run_loop(
            Arc::clone(&self.runner),
            Arc::clone(&self.stats),
            self.interval,
            cancel,
        )
        .await;
    }

    /// 연속 전송 실패 횟수
    pub fn consecutive_failures(&self) -> u32 {
        self.stats.consecutive_failures.load(Ordering::Relaxed)
    }

    /// 완료된 주기 수
    pub fn cycles(&self) -> u64 {
        self.stats.cycles.load(Ordering::Relaxed)
    }

    /// 현재 상태 이름
    pub fn state_name(&self) -> &'static str {
        match self.state {
            AgentState::Initialized => "initialized",
            AgentState::Running => "running",
            AgentState::Stopped => "stopped",
        }
    }
}

async fn run_loop(
    runner: Arc<Mutex<CycleRunner>>,
    stats: Arc<AgentStats>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!(interval_secs = interval.as_secs(), "agent loop started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let result = runner.lock().await.run_cycle().await;
        match result {
            Ok(report) => debug!(
                lines = report.lines_read,
                events = report.events,
                delivered = report.delivered,
                "agent cycle complete"
            ),
            Err(e) => error!(error = %e, "agent cycle failed"),
        }

        if !sleep_cancellable(interval, &cancel).await {
            break;
        }
    }
    info!(
        cycles = stats.cycles.load(Ordering::Relaxed),
        "agent loop stopped"
    );
}

impl Pipeline for Agent {
    async fn start(&mut self) -> Result<(), LogwardenError> {
        if self.state == AgentState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        self.cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.runner),
            Arc::clone(&self.stats),
            self.interval,
            self.cancel.clone(),
        ));
        self.task = Some(handle);
        self.state = AgentState::Running;
        info!("agent started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogwardenError> {
        if self.state != AgentState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| PipelineError::TaskFailed {
                reason: e.to_string(),
            })?;
        }
        self.state = AgentState::Stopped;
        info!("agent stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            AgentState::Running => {
                let failures = self.consecutive_failures();
                if failures >= DEGRADED_AFTER_FAILURES {
                    HealthStatus::Degraded(format!("{failures} consecutive delivery failures"))
                } else {
                    HealthStatus::Healthy
                }
            }
            AgentState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            AgentState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 에이전트 빌더
///
/// 소스와 전송 구현을 지정하지 않으면 [`FileSource`]와 [`HttpDeliveryClient`]를 사용합니다.
pub struct AgentBuilder {
    settings: AgentSettings,
    source: Option<Arc<dyn LogSource>>,
    delivery: Option<Arc<dyn Delivery>>,
}

impl AgentBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new(settings: AgentSettings) -> Self {
        Self {
            settings,
            source: None,
            delivery: None,
        }
    }

    /// 라인 소스를 지정합니다.
    pub fn source(mut self, source: Arc<dyn LogSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// 전송 구현을 지정합니다.
    pub fn delivery(mut self, delivery: Arc<dyn Delivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// 에이전트를 빌드합니다. 커서 상태 파일을 로드합니다.
    pub async fn build(self) -> Result<Agent, AgentError> {
        self.settings.validate()?;

        let classifier = LineClassifier::new(&self.settings.source_host, self.settings.os_type)?
            .with_min_line_length(self.settings.min_line_length);
        let source = match self.source {
            Some(source) => source,
            None => Arc::new(FileSource::new(self.settings.max_read_bytes)),
        };
        let delivery = match self.delivery {
            Some(delivery) => delivery,
            None => Arc::new(HttpDeliveryClient::new(&self.settings)?),
        };
        let offsets = OffsetStore::load(&self.settings.state_file, &self.settings.log_files).await;

        info!(
            host = %self.settings.source_host,
            os_type = %self.settings.os_type,
            sources = self.settings.log_files.len(),
            detectors = classifier.detectors().len(),
            "agent built"
        );

        let stats = Arc::new(AgentStats::default());
        let interval = self.settings.interval;
        let runner = CycleRunner {
            dedup: SessionDedupCache::new(self.settings.dedup_capacity),
            settings: self.settings,
            classifier,
            offsets,
            source,
            delivery,
            stats: Arc::clone(&stats),
        };

        Ok(Agent {
            runner: Arc::new(Mutex::new(runner)),
            stats,
            interval,
            state: AgentState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::delivery::IngestAck;

    /// 호출을 기록하고 설정된 결과를 돌려주는 인메모리 전송
    #[derive(Default)]
    struct RecordingDelivery {
        batches: StdMutex<Vec<Vec<Event>>>,
        heartbeats: AtomicU32,
        fail_deliveries: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Delivery for RecordingDelivery {
        async fn deliver(&self, events: &[Event]) -> Result<IngestAck, AgentError> {
            self.batches.lock().unwrap().push(events.to_vec());
            if self.fail_deliveries.load(Ordering::Relaxed) {
                return Err(AgentError::Delivery {
                    endpoint: "/ingest".to_owned(),
                    status: Some(503),
                    reason: "unavailable".to_owned(),
                });
            }
            Ok(IngestAck {
                success: true,
                message: format!("Processed {} events", events.len()),
                events_processed: events.len() as u64,
            })
        }

        async fn heartbeat(&self) -> Result<(), AgentError> {
            self.heartbeats.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        log_path: PathBuf,
        state_path: PathBuf,
        delivery: Arc<RecordingDelivery>,
    }

    fn fixture(initial: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("auth.log");
        std::fs::write(&log_path, initial).unwrap();
        Fixture {
            state_path: dir.path().join("state.json"),
            log_path,
            _dir: dir,
            delivery: Arc::new(RecordingDelivery::default()),
        }
    }

    async fn agent_for(fx: &Fixture) -> Agent {
        let settings = AgentSettings {
            source_host: "web-01".to_owned(),
            log_files: vec![fx.log_path.clone()],
            state_file: fx.state_path.clone(),
            interval: Duration::from_secs(1),
            ..AgentSettings::default()
        };
        AgentBuilder::new(settings)
            .delivery(fx.delivery.clone())
            .build()
            .await
            .unwrap()
    }

    fn append(path: &PathBuf, text: &str) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    const FAILED_ROOT: &str =
        "Mar 10 11:58:01 web-01 sshd[1]: Failed password for root from 198.51.100.7 port 22 ssh2\n";
    const FAILED_ADMIN: &str =
        "Mar 10 11:58:02 web-01 sshd[2]: Failed password for admin from 198.51.100.8 port 22 ssh2\n";

    #[tokio::test]
    async fn cycle_delivers_events_and_commits_cursor() {
        let fx = fixture("");
        append(&fx.log_path, FAILED_ROOT);
        append(&fx.log_path, "\n");
        append(&fx.log_path, FAILED_ADMIN);
        let agent = agent_for(&fx).await;

        let report = agent.run_cycle().await.unwrap();
        assert_eq!(report.lines_read, 3);
        assert_eq!(report.events, 2);
        assert!(report.delivered);
        assert!(report.heartbeat_sent);
        assert!(report.committed);

        let size = std::fs::metadata(&fx.log_path).unwrap().len();
        let store = OffsetStore::load(&fx.state_path, &[fx.log_path.clone()]).await;
        assert_eq!(store.get(&fx.log_path.display().to_string()), size);
    }

    #[tokio::test]
    async fn failed_delivery_keeps_cursor_and_redelivers_same_ids() {
        let fx = fixture(FAILED_ROOT);
        fx.delivery.fail_deliveries.store(true, Ordering::Relaxed);
        let agent = agent_for(&fx).await;

        let first = agent.run_cycle().await.unwrap();
        assert!(!first.delivered);
        assert!(!first.committed);
        assert!(!fx.state_path.exists());
        assert_eq!(agent.consecutive_failures(), 1);

        fx.delivery.fail_deliveries.store(false, Ordering::Relaxed);
        let second = agent.run_cycle().await.unwrap();
        assert!(second.delivered);
        assert_eq!(second.dedup_hits, 0);

        let batches = fx.delivery.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].event_id, batches[1][0].event_id);
        assert_eq!(agent.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn cycle_without_events_sends_heartbeat_and_commits() {
        let fx = fixture("Mar 10 11:00:00 web-01 CRON[5]: (root) CMD (true)\n");
        let agent = agent_for(&fx).await;

        let report = agent.run_cycle().await.unwrap();
        assert_eq!(report.events, 0);
        assert!(report.heartbeat_sent);
        assert!(report.committed);
        assert_eq!(fx.delivery.heartbeats.load(Ordering::Relaxed), 1);
        assert!(fx.delivery.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_lines_in_session_are_skipped() {
        let fx = fixture(FAILED_ROOT);
        let agent = agent_for(&fx).await;
        agent.run_cycle().await.unwrap();

        append(&fx.log_path, FAILED_ROOT);
        let report = agent.run_cycle().await.unwrap();
        assert_eq!(report.lines_read, 1);
        assert_eq!(report.dedup_hits, 1);
        assert_eq!(report.events, 0);
    }

    #[tokio::test]
    async fn missing_source_is_skipped() {
        let fx = fixture("");
        std::fs::remove_file(&fx.log_path).unwrap();
        let agent = agent_for(&fx).await;

        let report = agent.run_cycle().await.unwrap();
        assert_eq!(report.lines_read, 0);
        assert!(report.heartbeat_sent);
    }

    #[tokio::test]
    async fn pipeline_lifecycle_and_health() {
        let fx = fixture("");
        let mut agent = agent_for(&fx).await;
        assert!(agent.health_check().await.is_unhealthy());

        agent.start().await.unwrap();
        assert_eq!(agent.state_name(), "running");
        assert!(agent.start().await.is_err());

        agent.stop().await.unwrap();
        assert_eq!(agent.state_name(), "stopped");
        assert!(agent.stop().await.is_err());
    }

    #[tokio::test]
    async fn repeated_failures_degrade_health() {
        let fx = fixture(FAILED_ROOT);
        fx.delivery.fail_deliveries.store(true, Ordering::Relaxed);
        let mut agent = agent_for(&fx).await;
        for _ in 0..DEGRADED_AFTER_FAILURES {
            agent.run_cycle().await.unwrap();
        }
        agent.state = AgentState::Running;
        assert!(matches!(
            agent.health_check().await,
            HealthStatus::Degraded(_)
        ));
    }
}
