//! 영속 저장소 -- 이벤트, 파일 상태, 규칙, 라벨, 프로파일, 알림, 감사 로그
//!
//! [`Store`] trait은 파이프라인이 요구하는 저장 계약을 정의합니다.
//! 구현체는 내부에서 쓰기를 직렬화해야 하며, 파이프라인은
//! `Arc<dyn Store>`로 공유합니다.
//!
//! - [`sqlite`]: 단일 연결 + `Mutex` 기반 SQLite 구현

pub mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldtail_core::types::{AlertStatus, Event, Severity};

use crate::alert::policy::AlertPolicy;
use crate::error::LogPipelineError;
use crate::rule::types::{Rule, RuleDraft};

/// 파일별 읽기 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// 파일 경로
    pub path: String,
    /// 소비한 바이트 수
    pub offset: u64,
    /// 파일 식별자 (Unix에서는 inode)
    pub identity: String,
    /// 마지막 갱신 시각
    pub updated_at: DateTime<Utc>,
}

/// 값 위치별 라벨 (메타데이터 전용)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueLabel {
    /// 장비 ID
    pub device: String,
    /// 그룹 번호
    pub grp: i64,
    /// 값 위치
    pub idx: usize,
    /// 표시 이름
    pub label: String,
    /// 단위
    #[serde(default)]
    pub unit: Option<String>,
    /// 메모
    #[serde(default)]
    pub note: Option<String>,
    /// 마지막 갱신 시각
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 값 위치별 통계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// 값 위치
    pub idx: usize,
    /// 최소값
    pub min: f64,
    /// 최대값
    pub max: f64,
    /// 평균
    pub mean: f64,
    /// 모표준편차
    pub std: f64,
    /// 서로 다른 값 개수
    pub unique_count: usize,
    /// 서로 다른 값이 2개 이하
    pub is_binary: bool,
    /// 서로 다른 값이 1개
    pub is_constant: bool,
    /// 음수 비율
    pub negative_rate: f64,
}

/// (장비, 그룹)별 프로파일
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueProfile {
    /// 장비 ID (없으면 빈 문자열)
    pub device: String,
    /// 그룹 번호
    pub grp: i64,
    /// 대표 값 개수
    pub typical_value_count: usize,
    /// 통계에 사용된 벡터 수
    pub sample_count: usize,
    /// 위치별 통계
    pub indexes: Vec<IndexStats>,
    /// 계산 시각
    pub updated_at: DateTime<Utc>,
}

/// 감사 로그 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// ID
    pub id: i64,
    /// 기록 시각
    pub created_at: DateTime<Utc>,
    /// 수행자
    pub actor: String,
    /// 동작 이름 (RULE_CREATE 등)
    pub action: String,
    /// 상세 내용
    pub detail: String,
}

/// 새 알림 행
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 정책 이름
    pub policy: String,
    /// 심각도
    pub severity: Severity,
    /// 초기 상태
    pub status: AlertStatus,
    /// 중복 제거 키
    pub dedup_key: String,
    /// 요약
    pub summary: String,
    /// 상세 정보
    pub detail: serde_json::Value,
}

/// 저장된 알림
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// ID
    pub id: i64,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 정책 이름
    pub policy: String,
    /// 심각도
    pub severity: Severity,
    /// 상태
    pub status: AlertStatus,
    /// 중복 제거 키
    pub dedup_key: String,
    /// 요약
    pub summary: String,
    /// 상세 정보
    pub detail: serde_json::Value,
}

/// 시간 창 내 이벤트 통계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// 전체 이벤트 수
    pub total: u64,
    /// 파싱 실패 이벤트 수
    pub failed: u64,
    /// 최근 실패 라인 (최대 3개, 최신순)
    pub failed_samples: Vec<String>,
}

/// 보존 기간 정리 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// 삭제된 이벤트 수
    pub events: usize,
    /// 삭제된 알림 수
    pub alerts: usize,
    /// 삭제된 감사 로그 수
    pub audit: usize,
}

/// 파이프라인 저장 계약
///
/// 모든 메서드는 동기 호출이며, 구현체는 동시 호출을 내부에서 직렬화합니다.
/// 시각은 호출자가 전달합니다.
pub trait Store: Send + Sync {
    // --- 이벤트 ---

    /// 이벤트를 추가하고 ID를 반환합니다.
    fn insert_event(&self, event: &Event) -> Result<i64, LogPipelineError>;

    /// 최근 이벤트를 최신순으로 조회합니다.
    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, LogPipelineError>;

    /// `since` 이후 생성된 이벤트의 성공/실패 통계를 계산합니다.
    fn event_window_stats(&self, since: DateTime<Utc>) -> Result<WindowStats, LogPipelineError>;

    // --- 파일 상태 ---

    /// 파일 읽기 위치를 조회합니다.
    fn file_state(&self, path: &str) -> Result<Option<FileState>, LogPipelineError>;

    /// 파일 읽기 위치를 경로 기준으로 upsert 합니다.
    fn upsert_file_state(&self, state: &FileState) -> Result<(), LogPipelineError>;

    // --- 규칙 ---

    /// 모든 규칙을 (priority, id) 순서로 조회합니다.
    fn list_rules(&self) -> Result<Vec<Rule>, LogPipelineError>;

    /// 활성화된 ACTIVE 규칙을 (priority, id) 순서로 조회합니다.
    fn active_rules(&self) -> Result<Vec<Rule>, LogPipelineError>;

    /// 규칙 하나를 조회합니다.
    fn get_rule(&self, id: i64) -> Result<Option<Rule>, LogPipelineError>;

    /// 규칙을 추가하고 저장된 규칙을 반환합니다.
    fn insert_rule(&self, draft: &RuleDraft, now: DateTime<Utc>) -> Result<Rule, LogPipelineError>;

    /// 규칙 내용을 교체합니다. 규칙이 없으면 `None`.
    fn update_rule(
        &self,
        id: i64,
        draft: &RuleDraft,
        now: DateTime<Utc>,
    ) -> Result<Option<Rule>, LogPipelineError>;

    /// 규칙을 삭제합니다. 삭제되었으면 `true`.
    fn delete_rule(&self, id: i64) -> Result<bool, LogPipelineError>;

    // --- 라벨 ---

    /// 라벨을 (device, grp, idx) 기준으로 upsert 합니다.
    fn upsert_label(&self, label: &ValueLabel, now: DateTime<Utc>) -> Result<(), LogPipelineError>;

    /// 라벨을 (device, grp, idx) 순서로 조회합니다.
    fn list_labels(&self) -> Result<Vec<ValueLabel>, LogPipelineError>;

    // --- 프로파일 ---

    /// (장비, 그룹) 프로파일과 위치별 통계를 한 트랜잭션으로 덮어씁니다.
    fn upsert_profile(&self, profile: &ValueProfile) -> Result<(), LogPipelineError>;

    /// (장비, 그룹) 프로파일을 조회합니다.
    fn get_profile(&self, device: &str, grp: i64) -> Result<Option<ValueProfile>, LogPipelineError>;

    /// 모든 프로파일을 조회합니다.
    fn list_profiles(&self) -> Result<Vec<ValueProfile>, LogPipelineError>;

    // --- 감사 로그 ---

    /// 규칙 생성과 라벨 upsert를 감사 로그와 함께 하나의 트랜잭션으로 반영합니다.
    ///
    /// 하나라도 실패하면 아무것도 반영되지 않습니다. 생성된 규칙을 반환합니다.
    fn import_bundle(
        &self,
        actor: &str,
        rules: &[RuleDraft],
        labels: &[ValueLabel],
        now: DateTime<Utc>,
    ) -> Result<Vec<Rule>, LogPipelineError>;

    /// 감사 로그를 추가합니다.
    fn append_audit(
        &self,
        actor: &str,
        action: &str,
        detail: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LogPipelineError>;

    /// 최근 감사 로그를 최신순으로 조회합니다.
    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, LogPipelineError>;

    // --- 알림 정책 ---

    /// 같은 이름의 정책이 없을 때만 추가합니다. 추가되었으면 `true`.
    fn seed_policy(&self, policy: &AlertPolicy) -> Result<bool, LogPipelineError>;

    /// 정책을 이름 기준으로 upsert 합니다.
    fn upsert_policy(&self, policy: &AlertPolicy) -> Result<(), LogPipelineError>;

    /// 모든 정책을 조회합니다.
    fn list_policies(&self) -> Result<Vec<AlertPolicy>, LogPipelineError>;

    // --- 알림 ---

    /// 중복 제거 키의 가장 최근 알림 생성 시각 (상태 무관)
    fn latest_alert_at(&self, dedup_key: &str) -> Result<Option<DateTime<Utc>>, LogPipelineError>;

    /// 알림 행을 새로 추가합니다.
    fn insert_alert(&self, alert: &NewAlert) -> Result<i64, LogPipelineError>;

    /// 중복 제거 키가 같은 PENDING 알림의 상태를 바꿉니다.
    fn resolve_pending_alerts(
        &self,
        dedup_key: &str,
        status: AlertStatus,
    ) -> Result<usize, LogPipelineError>;

    /// 최근 알림을 최신순으로 조회합니다.
    fn list_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, LogPipelineError>;

    /// 알림을 ACK 상태로 바꿉니다. 알림이 없으면 `false`.
    fn ack_alert(&self, id: i64) -> Result<bool, LogPipelineError>;

    // --- 보존 기간 ---

    /// `cutoff` 이전의 이벤트, 알림, 감사 로그를 삭제합니다.
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport, LogPipelineError>;
}
