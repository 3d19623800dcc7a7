//! 알림 정책 정의 및 기본 정책

use serde::{Deserialize, Serialize};

use fieldtail_core::types::Severity;

/// 파싱 실패율 정책 이름
pub const PARSE_FAIL_RATE: &str = "PARSE_FAIL_RATE";
/// 수집 정체 정책 이름
pub const INGEST_STALL: &str = "INGEST_STALL";
/// 파일 누락 정책 이름
pub const FILE_MISSING: &str = "FILE_MISSING";
/// 저장소 오류 정책 이름
pub const DB_ERROR: &str = "DB_ERROR";

/// 실패율 임계값 기본값
pub const DEFAULT_FAIL_RATE: f64 = 0.05;
/// 평가 시간 창 기본값 (초)
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// 평가 로직 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// 시간 창 내 파싱 실패율
    ParseFailRate,
    /// 상태가 ok가 아닌 채로 오래 머문 파일
    IngestStall,
    /// 누락된 파일
    FileMissing,
    /// 평가 자체 실패 (직접 기록 전용)
    DbError,
}

impl PolicyKind {
    /// 정책 이름에서 평가 로직을 찾습니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            PARSE_FAIL_RATE => Some(Self::ParseFailRate),
            INGEST_STALL => Some(Self::IngestStall),
            FILE_MISSING => Some(Self::FileMissing),
            DB_ERROR => Some(Self::DbError),
            _ => None,
        }
    }
}

/// 정책 임계값 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyThreshold {
    /// 평가 시간 창 (초)
    #[serde(default = "default_window")]
    pub window_sec: u64,
    /// 실패율 임계값 (PARSE_FAIL_RATE 전용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

fn default_window() -> u64 {
    DEFAULT_WINDOW_SECS
}

impl Default for PolicyThreshold {
    fn default() -> Self {
        Self {
            window_sec: DEFAULT_WINDOW_SECS,
            rate: None,
        }
    }
}

/// 알림 정책
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    /// 고유 이름
    pub name: String,
    /// 활성화 여부
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 임계값
    #[serde(default)]
    pub threshold: PolicyThreshold,
    /// 쿨다운 (초). 없거나 0이면 설정의 기본값 사용
    #[serde(default)]
    pub cooldown_sec: Option<u64>,
    /// 심각도
    pub severity: Severity,
}

fn default_enabled() -> bool {
    true
}

impl AlertPolicy {
    /// 정책을 생성합니다.
    pub fn new(name: &str, severity: Severity, cooldown_sec: u64) -> Self {
        Self {
            name: name.to_owned(),
            enabled: true,
            threshold: PolicyThreshold::default(),
            cooldown_sec: Some(cooldown_sec),
            severity,
        }
    }

    /// 평가 로직 종류
    pub fn kind(&self) -> Option<PolicyKind> {
        PolicyKind::from_name(&self.name)
    }

    /// 실제 적용할 쿨다운 (초)
    pub fn effective_cooldown(&self, default_secs: u64) -> u64 {
        match self.cooldown_sec {
            Some(secs) if secs > 0 => secs,
            _ => default_secs,
        }
    }

    /// 실패율 임계값
    pub fn fail_rate(&self) -> f64 {
        self.threshold.rate.unwrap_or(DEFAULT_FAIL_RATE)
    }
}

/// 시작 시 없으면 추가되는 기본 정책
pub fn default_policies() -> Vec<AlertPolicy> {
    let mut parse_fail = AlertPolicy::new(PARSE_FAIL_RATE, Severity::Warn, 60);
    parse_fail.threshold.rate = Some(DEFAULT_FAIL_RATE);
    vec![
        parse_fail,
        AlertPolicy::new(INGEST_STALL, Severity::Warn, 120),
        AlertPolicy::new(FILE_MISSING, Severity::Critical, 300),
        AlertPolicy::new(DB_ERROR, Severity::Critical, 300),
    ]
}
