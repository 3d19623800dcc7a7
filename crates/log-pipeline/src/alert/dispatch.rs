//! 알림 디스패치 -- 중복 제거, 쿨다운, 메시지 구성, 전송, 429 재시도
//!
//! 같은 중복 제거 키(`정책:파일`)의 가장 최근 알림이 쿨다운 안에 있으면
//! 행을 만들지 않고 조용히 억제합니다. 그렇지 않으면 PENDING 행을 먼저
//! 저장한 뒤 전송하고, 결과에 따라 같은 키의 PENDING 행을 SENT/FAILED로
//! 바꿉니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fieldtail_core::metrics as m;
use fieldtail_core::types::{AlertStatus, Severity};

use super::policy::AlertPolicy;
use crate::error::LogPipelineError;
use crate::notify::{NotifyOutcome, Notifier};
use crate::store::{NewAlert, Store};

/// 메시지에 포함하는 최대 샘플 수
pub const MAX_SAMPLES: usize = 3;

/// `Retry-After`가 없거나 해석되지 않을 때의 대기 시간 (초)
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// 평가 결과로 만들어진 알림 후보
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertCandidate {
    /// 대상 파일 경로 (집계 알림은 `all`)
    pub file_path: String,
    /// 장비 ID
    pub device: Option<String>,
    /// 그룹
    pub grp: Option<String>,
    /// 요약
    pub summary: String,
    /// 샘플 라인
    pub samples: Vec<String>,
}

impl AlertCandidate {
    /// 파일 단위 후보를 만듭니다.
    pub fn for_file(file_path: &str, summary: &str) -> Self {
        Self {
            file_path: file_path.to_owned(),
            device: None,
            grp: None,
            summary: summary.to_owned(),
            samples: Vec::new(),
        }
    }
}

/// 디스패치 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// 쿨다운으로 억제 (행 없음, 전송 없음)
    Suppressed,
    /// 전송 성공
    Sent,
    /// 전송 실패
    Failed,
}

/// 중복 제거 키
pub fn dedup_key(policy: &str, file_path: &str) -> String {
    format!("{policy}:{file_path}")
}

/// `Retry-After` 헤더를 초 단위 정수로 해석합니다. 실패하면 1초.
pub fn retry_after_secs(outcome: &NotifyOutcome) -> u64 {
    outcome
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn mention(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "@channel ",
        Severity::Warn => "@here ",
        Severity::Info => "",
    }
}

/// 웹훅 메시지 페이로드를 만듭니다.
pub fn build_message(
    policy: &AlertPolicy,
    candidate: &AlertCandidate,
    now: DateTime<Utc>,
) -> serde_json::Value {
    let mut lines = vec![
        format!("{}[{}] {}", mention(policy.severity), policy.severity, policy.name),
        format!("*time*: {}", now.format("%Y-%m-%d %H:%M:%S")),
        format!("*file*: {}", candidate.file_path),
        format!(
            "*device/grp*: {} / {}",
            candidate.device.as_deref().unwrap_or("-"),
            candidate.grp.as_deref().unwrap_or("-")
        ),
        format!("*summary*: {}", candidate.summary),
        "*recent samples*:".to_owned(),
    ];
    lines.extend(
        candidate
            .samples
            .iter()
            .take(MAX_SAMPLES)
            .map(|s| format!("- {s}")),
    );
    serde_json::json!({ "text": lines.join("\n") })
}

/// 알림 디스패처
pub struct Dispatcher<N> {
    store: Arc<dyn Store>,
    notifier: Arc<N>,
    default_cooldown_secs: u64,
}

impl<N: Notifier> Dispatcher<N> {
    /// 새 디스패처를 생성합니다.
    pub fn new(store: Arc<dyn Store>, notifier: Arc<N>, default_cooldown_secs: u64) -> Self {
        Self {
            store,
            notifier,
            default_cooldown_secs,
        }
    }

    /// 기본 쿨다운 (초)
    pub fn default_cooldown_secs(&self) -> u64 {
        self.default_cooldown_secs
    }

    /// 현재 시각 기준으로 후보를 디스패치합니다.
    pub async fn dispatch(
        &self,
        policy: &AlertPolicy,
        candidate: &AlertCandidate,
    ) -> Result<DispatchResult, LogPipelineError> {
        self.dispatch_at(policy, candidate, Utc::now()).await
    }

    /// 주어진 시각 기준으로 후보를 디스패치합니다.
    pub async fn dispatch_at(
        &self,
        policy: &AlertPolicy,
        candidate: &AlertCandidate,
        now: DateTime<Utc>,
    ) -> Result<DispatchResult, LogPipelineError> {
        let key = dedup_key(&policy.name, &candidate.file_path);
        let cooldown = policy.effective_cooldown(self.default_cooldown_secs);

        if let Some(last) = self.store.latest_alert_at(&key)? {
            let elapsed = (now - last).num_milliseconds();
            if elapsed <= (cooldown as i64).saturating_mul(1000) {
                metrics::counter!(m::ALERTS_SUPPRESSED_TOTAL, m::LABEL_POLICY => policy.name.clone())
                    .increment(1);
                tracing::debug!(dedup_key = %key, elapsed_ms = elapsed, cooldown, "alert suppressed by cooldown");
                return Ok(DispatchResult::Suppressed);
            }
        }

        self.store.insert_alert(&NewAlert {
            created_at: now,
            policy: policy.name.clone(),
            severity: policy.severity,
            status: AlertStatus::Pending,
            dedup_key: key.clone(),
            summary: candidate.summary.clone(),
            detail: serde_json::to_value(candidate)?,
        })?;

        let payload = build_message(policy, candidate, now);
        let mut outcome = self.notifier.send(&payload).await;
        if outcome.is_rate_limited() {
            let wait = retry_after_secs(&outcome);
            tracing::info!(dedup_key = %key, wait_secs = wait, "webhook rate limited, retrying once");
            tokio::time::sleep(Duration::from_secs(wait)).await;
            outcome = self.notifier.send(&payload).await;
        }

        let (status, result) = if outcome.ok {
            (AlertStatus::Sent, DispatchResult::Sent)
        } else {
            (AlertStatus::Failed, DispatchResult::Failed)
        };
        self.store.resolve_pending_alerts(&key, status)?;

        metrics::counter!(m::ALERTS_DISPATCHED_TOTAL, m::LABEL_POLICY => policy.name.clone())
            .increment(1);
        if result == DispatchResult::Failed {
            metrics::counter!(m::ALERTS_FAILED_TOTAL, m::LABEL_POLICY => policy.name.clone())
                .increment(1);
            tracing::warn!(
                dedup_key = %key,
                status = ?outcome.status,
                error = outcome.error.as_deref().unwrap_or(""),
                "alert delivery failed"
            );
        } else {
            tracing::info!(dedup_key = %key, severity = %policy.severity, "alert sent");
        }
        Ok(result)
    }
}
