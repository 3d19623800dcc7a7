//! 알림 엔진 -- 정책 평가와 디스패치
//!
//! 주기적인 틱마다 활성화된 정책을 평가해 알림 후보를 만들고,
//! [`Dispatcher`]로 중복 제거/쿨다운/전송을 처리합니다.
//!
//! # 정책
//! - `PARSE_FAIL_RATE`: 시간 창 내 실패율이 임계값 이상이면 집계 알림 하나 (파일 `all`)
//! - `INGEST_STALL`: 상태가 `ok`가 아닌 채로 시간 창보다 오래 머문 파일마다 하나
//! - `FILE_MISSING`: 현재 `missing`인 파일마다 하나 (쿨다운으로만 제한)
//!
//! 틱 도중 오류가 나면 CRITICAL `DB_ERROR` 알림을 FAILED 상태로 직접 기록합니다.
//! 이 기록은 중복 제거, 쿨다운, 전송을 모두 거치지 않습니다.

pub mod dispatch;
pub mod policy;

pub use dispatch::{AlertCandidate, DispatchResult, Dispatcher};
pub use policy::{AlertPolicy, PolicyKind, PolicyThreshold, default_policies};

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use fieldtail_core::types::{AlertStatus, FileStatus, Severity};

use crate::collector::StatusBoard;
use crate::error::LogPipelineError;
use crate::notify::Notifier;
use crate::store::{NewAlert, Store};

/// 초 단위 시간 창 (chrono 범위로 제한)
fn window(secs: u64) -> ChronoDuration {
    let max = i64::MAX / 1000;
    ChronoDuration::seconds(i64::try_from(secs).unwrap_or(max).min(max))
}

/// 한 번의 틱 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// 평가한 정책 수
    pub evaluated: usize,
    /// 전송 성공
    pub sent: usize,
    /// 전송 실패
    pub failed: usize,
    /// 쿨다운 억제
    pub suppressed: usize,
    /// DB_ERROR 기록 여부
    pub db_error: bool,
}

impl TickSummary {
    fn count(&mut self, result: DispatchResult) {
        match result {
            DispatchResult::Sent => self.sent += 1,
            DispatchResult::Failed => self.failed += 1,
            DispatchResult::Suppressed => self.suppressed += 1,
        }
    }
}

/// 알림 엔진
pub struct AlertEngine<N> {
    store: Arc<dyn Store>,
    status: StatusBoard,
    dispatcher: Dispatcher<N>,
}

impl<N: Notifier> AlertEngine<N> {
    /// 새 알림 엔진을 생성합니다.
    pub fn new(
        store: Arc<dyn Store>,
        status: StatusBoard,
        notifier: Arc<N>,
        default_cooldown_secs: u64,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&store), notifier, default_cooldown_secs);
        Self {
            store,
            status,
            dispatcher,
        }
    }

    /// 기본 정책을 없을 때만 추가합니다. 추가된 수를 반환합니다.
    pub fn seed_default_policies(&self) -> Result<usize, LogPipelineError> {
        let mut added = 0;
        for policy in default_policies() {
            if self.store.seed_policy(&policy)? {
                tracing::info!(policy = %policy.name, "seeded default alert policy");
                added += 1;
            }
        }
        Ok(added)
    }

    /// 현재 시각으로 틱을 수행합니다.
    pub async fn tick(&self) -> TickSummary {
        self.tick_at(Utc::now()).await
    }

    /// 주어진 시각으로 틱을 수행합니다. 실패는 DB_ERROR 알림으로 바뀝니다.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();
        if let Err(e) = self.evaluate(now, &mut summary).await {
            tracing::error!(error = %e, "alert evaluation failed");
            self.record_db_error(&e, now);
            summary.db_error = true;
        }
        summary
    }

    async fn evaluate(&self, now: DateTime<Utc>, summary: &mut TickSummary) -> Result<(), LogPipelineError> {
        let policies = self.store.list_policies()?;
        for policy in policies.iter().filter(|p| p.enabled) {
            let candidates = match policy.kind() {
                Some(PolicyKind::ParseFailRate) => self.parse_fail_rate(policy, now)?,
                Some(PolicyKind::IngestStall) => self.ingest_stall(policy, now),
                Some(PolicyKind::FileMissing) => self.file_missing(),
                Some(PolicyKind::DbError) | None => continue,
            };
            summary.evaluated += 1;
            for candidate in &candidates {
                let result = self.dispatcher.dispatch_at(policy, candidate, now).await?;
                summary.count(result);
            }
        }
        Ok(())
    }

    fn parse_fail_rate(
        &self,
        policy: &AlertPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertCandidate>, LogPipelineError> {
        let since = now
            .checked_sub_signed(window(policy.threshold.window_sec))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let stats = self.store.event_window_stats(since)?;
        if stats.total == 0 {
            return Ok(Vec::new());
        }
        let rate = stats.failed as f64 / stats.total as f64;
        if rate < policy.fail_rate() {
            return Ok(Vec::new());
        }
        Ok(vec![AlertCandidate {
            file_path: "all".to_owned(),
            device: Some("all".to_owned()),
            grp: Some("all".to_owned()),
            summary: format!("parse fail rate {:.2}%", rate * 100.0),
            samples: stats.failed_samples,
        }])
    }

    fn ingest_stall(&self, policy: &AlertPolicy, now: DateTime<Utc>) -> Vec<AlertCandidate> {
        let max_age = window(policy.threshold.window_sec);
        self.status
            .snapshot()
            .into_iter()
            .filter(|(_, entry)| entry.status != FileStatus::Ok)
            .filter(|(_, entry)| now - entry.since > max_age)
            .map(|(path, _)| AlertCandidate::for_file(&path, "ingest stalled"))
            .collect()
    }

    fn file_missing(&self) -> Vec<AlertCandidate> {
        self.status
            .snapshot()
            .into_iter()
            .filter(|(_, entry)| entry.status == FileStatus::Missing)
            .map(|(path, _)| AlertCandidate::for_file(&path, "file missing"))
            .collect()
    }

    fn record_db_error(&self, err: &LogPipelineError, now: DateTime<Utc>) {
        let alert = NewAlert {
            created_at: now,
            policy: policy::DB_ERROR.to_owned(),
            severity: Severity::Critical,
            status: AlertStatus::Failed,
            dedup_key: policy::DB_ERROR.to_owned(),
            summary: "DB error".to_owned(),
            detail: serde_json::Value::String(err.to_string()),
        };
        if let Err(e) = self.store.insert_alert(&alert) {
            tracing::error!(error = %e, "failed to record DB_ERROR alert");
        }
    }
}
