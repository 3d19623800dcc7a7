//! 파이프라인 오케스트레이션 -- 수집/알림/보존 정리 루프의 생명주기를 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `fieldtail-daemon`에서 start/stop/health_check로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! ingest loop   (poll_interval)      : IngestLoop::ingest_once  (spawn_blocking)
//! alert loop    (eval_interval)      : AlertEngine::tick
//! retention loop(sweep_interval)     : Store::purge_older_than  (spawn_blocking)
//! ```
//!
//! 세 루프는 같은 [`CancellationToken`]을 관찰하며, 한 번의 반복이 끝난
//! 뒤에만 종료 요청을 확인합니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use fieldtail_core::error::{FieldtailError, PipelineError};
use fieldtail_core::pipeline::{HealthStatus, Pipeline};
use fieldtail_core::types::FileStatus;

use crate::admin::AdminService;
use crate::alert::AlertEngine;
use crate::broadcast::EventBroadcast;
use crate::collector::StatusBoard;
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::ingest::IngestLoop;
use crate::notify::Notifier;
use crate::profiler::Profiler;
use crate::rule::RuleEngine;
use crate::store::{PurgeReport, Store};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 보존 기간이 지난 이벤트/알림/감사 로그를 삭제합니다.
///
/// 보존 기간이 표현 가능한 시각 범위를 넘으면 가장 이른 시각을 기준으로 삼아
/// 아무것도 지우지 않습니다.
pub fn sweep_retention(
    store: &dyn Store,
    retention_days: u32,
) -> Result<PurgeReport, LogPipelineError> {
    let cutoff = ChronoDuration::try_days(i64::from(retention_days))
        .and_then(|retention| Utc::now().checked_sub_signed(retention))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let report = store.purge_older_than(cutoff)?;
    tracing::info!(
        retention_days,
        events = report.events,
        alerts = report.alerts,
        audit = report.audit,
        "retention sweep finished"
    );
    Ok(report)
}

/// 로그 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use fieldtail_log_pipeline::{LogPipelineBuilder, SqliteStore, WebhookNotifier};
///
/// let mut pipeline = LogPipelineBuilder::new()
///     .config(config)
///     .store(Arc::new(SqliteStore::open(&db_path)?))
///     .notifier(Arc::new(notifier))
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct LogPipeline<N: Notifier> {
    config: PipelineConfig,
    state: PipelineState,
    store: Arc<dyn Store>,
    rules: Arc<RuleEngine>,
    broadcast: Arc<EventBroadcast>,
    status: StatusBoard,
    ingest: Arc<IngestLoop>,
    alerts: Arc<AlertEngine<N>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<N: Notifier> LogPipeline<N> {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 저장소 핸들
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    /// 이벤트 브로드캐스트 핸들 (실시간 구독용)
    pub fn broadcast(&self) -> Arc<EventBroadcast> {
        Arc::clone(&self.broadcast)
    }

    /// 파일 상태 보드
    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// 같은 저장소와 규칙 캐시를 쓰는 관리 서비스를 만듭니다.
    pub fn admin(&self) -> AdminService {
        AdminService::new(
            Arc::clone(&self.store),
            Arc::clone(&self.rules),
            self.status.clone(),
        )
    }

    fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut job: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                job().await;
            }
            tracing::debug!(task = name, "periodic task stopped");
        });
        self.tasks.push(handle);
    }
}

impl<N: Notifier> Pipeline for LogPipeline<N> {
    async fn start(&mut self) -> Result<(), FieldtailError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(log_dir = %self.config.log_dir.display(), "starting log pipeline");

        // 1. 기본 정책
        let seeded = self
            .alerts
            .seed_default_policies()
            .map_err(FieldtailError::from)?;
        tracing::info!(seeded, "alert policies ready");

        // 2. 규칙 캐시 선로딩
        match self.rules.reload() {
            Ok(matcher) => tracing::info!(rules = matcher.len(), "parse rules loaded"),
            Err(e) => tracing::warn!(error = %e, "initial rule load failed"),
        }

        // 3. 주기 태스크
        self.cancel = CancellationToken::new();

        let ingest = Arc::clone(&self.ingest);
        self.spawn_periodic("ingest", self.config.poll_interval(), move || {
            let ingest = Arc::clone(&ingest);
            async move {
                match tokio::task::spawn_blocking(move || ingest.ingest_once()).await {
                    Ok(pass) if pass.events > 0 || pass.aborted > 0 => tracing::debug!(
                        files = pass.files,
                        events = pass.events,
                        ignored = pass.ignored,
                        aborted = pass.aborted,
                        "ingest pass finished"
                    ),
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "ingest pass panicked"),
                }
            }
        });

        let alerts = Arc::clone(&self.alerts);
        self.spawn_periodic("alert", self.config.eval_interval(), move || {
            let alerts = Arc::clone(&alerts);
            async move {
                let tick = alerts.tick().await;
                if tick.sent + tick.failed > 0 || tick.db_error {
                    tracing::info!(
                        sent = tick.sent,
                        failed = tick.failed,
                        suppressed = tick.suppressed,
                        db_error = tick.db_error,
                        "alert tick finished"
                    );
                }
            }
        });

        // interval의 첫 틱은 즉시 발생하므로 시작 직후 한 번 정리됨
        let store = Arc::clone(&self.store);
        let retention_days = self.config.retention_days;
        self.spawn_periodic(
            "retention",
            self.config.retention_sweep_interval(),
            move || {
                let store = Arc::clone(&store);
                async move {
                    let result = tokio::task::spawn_blocking(move || {
                        sweep_retention(store.as_ref(), retention_days)
                    })
                    .await;
                    match result {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => tracing::error!(error = %e, "retention sweep failed"),
                        Err(e) => tracing::error!(error = %e, "retention sweep panicked"),
                    }
                }
            },
        );

        self.state = PipelineState::Running;
        tracing::info!(tasks = self.tasks.len(), "log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), FieldtailError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log pipeline");
        self.cancel.cancel();

        let mut join_error = None;
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "pipeline task failed to join");
                join_error = Some(e.to_string());
            }
        }

        self.state = PipelineState::Stopped;
        tracing::info!("log pipeline stopped");
        match join_error {
            Some(reason) => Err(PipelineError::TaskJoin(reason).into()),
            None => Ok(()),
        }
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.tasks.iter().any(JoinHandle::is_finished) {
                    return HealthStatus::Unhealthy("background task exited".to_owned());
                }
                let missing = self
                    .status
                    .snapshot()
                    .values()
                    .filter(|entry| entry.status == FileStatus::Missing)
                    .count();
                if missing > 0 {
                    HealthStatus::Degraded(format!("{missing} file(s) missing"))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
pub struct LogPipelineBuilder<N> {
    config: PipelineConfig,
    store: Option<Arc<dyn Store>>,
    notifier: Option<Arc<N>>,
}

impl<N: Notifier> LogPipelineBuilder<N> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            store: None,
            notifier: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 저장소를 지정합니다.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// 알림 전송기를 지정합니다.
    pub fn notifier(mut self, notifier: Arc<N>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// 저장소와 알림 전송기는 필수입니다.
    pub fn build(self) -> Result<LogPipeline<N>, LogPipelineError> {
        self.config.validate()?;

        let store = self.store.ok_or_else(|| LogPipelineError::Config {
            field: "store".to_owned(),
            reason: "a store must be provided".to_owned(),
        })?;
        let notifier = self.notifier.ok_or_else(|| LogPipelineError::Config {
            field: "notifier".to_owned(),
            reason: "a notifier must be provided".to_owned(),
        })?;

        let status = StatusBoard::new();
        let rules = Arc::new(RuleEngine::new(
            Arc::clone(&store),
            self.config.rule_reload(),
        ));
        let profiler = Arc::new(Profiler::new(Arc::clone(&store)));
        let broadcast = Arc::new(EventBroadcast::new(self.config.broadcast_capacity));
        let ingest = Arc::new(IngestLoop::new(
            self.config.ingest_target(),
            Arc::clone(&store),
            Arc::clone(&rules),
            profiler,
            Arc::clone(&broadcast),
            status.clone(),
        ));
        let alerts = Arc::new(AlertEngine::new(
            Arc::clone(&store),
            status.clone(),
            notifier,
            self.config.default_cooldown_secs,
        ));

        Ok(LogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            store,
            rules,
            broadcast,
            status,
            ingest,
            alerts,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

impl<N: Notifier> Default for LogPipelineBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}
