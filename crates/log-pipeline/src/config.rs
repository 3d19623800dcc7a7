//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`FieldtailConfig`]에서 파이프라인이 쓰는
//! 값만 모아 구체 타입(`PathBuf`, `Duration`)으로 제공합니다.
//! 저장소 경로와 웹훅 설정은 파이프라인을 조립하는 쪽(daemon)이 사용합니다.
//!
//! # 사용 예시
//! ```ignore
//! use fieldtail_core::config::FieldtailConfig;
//! use fieldtail_log_pipeline::config::PipelineConfig;
//!
//! let core_config = FieldtailConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fieldtail_core::config::FieldtailConfig;

use crate::error::LogPipelineError;
use crate::ingest::IngestTarget;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 로그 파일 디렉토리
    pub log_dir: PathBuf,
    /// `log_dir` 기준 glob 패턴 목록
    pub include_files: Vec<String>,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 규칙 캐시 최대 유효 시간 (초)
    pub rule_reload_secs: u64,
    /// 정책 평가 주기 (초)
    pub eval_interval_secs: u64,
    /// 정책에 쿨다운이 없을 때 쓰는 기본 쿨다운 (초)
    pub default_cooldown_secs: u64,
    /// 보존 기간 (일)
    pub retention_days: u32,
    /// 보존 기간 정리 주기 (초)
    pub retention_sweep_interval_secs: u64,
    /// 브로드캐스트 버퍼 크기
    pub broadcast_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&FieldtailConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &FieldtailConfig) -> Self {
        Self {
            log_dir: PathBuf::from(&core.ingest.log_dir),
            include_files: core.ingest.include_files.clone(),
            poll_interval_ms: core.ingest.poll_interval_ms,
            rule_reload_secs: core.rules.reload_secs,
            eval_interval_secs: core.alert.eval_interval_secs,
            default_cooldown_secs: core.alert.default_cooldown_secs,
            retention_days: core.storage.retention_days,
            retention_sweep_interval_secs: core.storage.retention_sweep_interval_secs,
            broadcast_capacity: core.broadcast.capacity,
        }
    }

    /// 수집 대상
    pub fn ingest_target(&self) -> IngestTarget {
        IngestTarget {
            log_dir: self.log_dir.clone(),
            include_files: self.include_files.clone(),
        }
    }

    /// 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 규칙 캐시 유효 시간
    pub fn rule_reload(&self) -> Duration {
        Duration::from_secs(self.rule_reload_secs)
    }

    /// 정책 평가 주기
    pub fn eval_interval(&self) -> Duration {
        Duration::from_secs(self.eval_interval_secs)
    }

    /// 보존 기간 정리 주기
    pub fn retention_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention_sweep_interval_secs)
    }

    /// include 패턴이 안전한지 검증합니다.
    ///
    /// # 검증 규칙
    /// - 빈 문자열 불가
    /// - 절대 경로 불가 (`log_dir` 기준 상대 패턴)
    /// - ".." 컴포넌트 불가
    /// - glob 문법 오류 불가
    fn validate_include_pattern(pattern: &str) -> Result<(), LogPipelineError> {
        let fail = |reason: String| LogPipelineError::Collector {
            source_type: "glob".to_owned(),
            reason,
        };

        if pattern.trim().is_empty() {
            return Err(fail("include pattern must not be empty".to_owned()));
        }

        let path = Path::new(pattern);
        if path.is_absolute() {
            return Err(fail(format!(
                "include pattern '{pattern}' must be relative to log_dir"
            )));
        }
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(fail(format!(
                "include pattern '{pattern}' contains path traversal pattern '..'"
            )));
        }

        glob::Pattern::new(pattern)
            .map_err(|e| fail(format!("include pattern '{pattern}': {e}")))?;
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_BROADCAST_CAPACITY: usize = 1_000_000;

        let positive = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("rule_reload_secs", self.rule_reload_secs),
            ("eval_interval_secs", self.eval_interval_secs),
            (
                "retention_sweep_interval_secs",
                self.retention_sweep_interval_secs,
            ),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(LogPipelineError::Config {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        if self.broadcast_capacity == 0 || self.broadcast_capacity > MAX_BROADCAST_CAPACITY {
            return Err(LogPipelineError::Config {
                field: "broadcast_capacity".to_owned(),
                reason: format!("must be 1-{MAX_BROADCAST_CAPACITY}"),
            });
        }

        if self.include_files.is_empty() {
            return Err(LogPipelineError::Config {
                field: "include_files".to_owned(),
                reason: "at least one pattern must be configured".to_owned(),
            });
        }
        for pattern in &self.include_files {
            Self::validate_include_pattern(pattern)?;
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 로그 디렉토리를 설정합니다.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    /// include 패턴을 설정합니다.
    pub fn include_files(mut self, patterns: Vec<String>) -> Self {
        self.config.include_files = patterns;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 규칙 캐시 유효 시간(초)을 설정합니다.
    pub fn rule_reload_secs(mut self, secs: u64) -> Self {
        self.config.rule_reload_secs = secs;
        self
    }

    /// 정책 평가 주기(초)를 설정합니다.
    pub fn eval_interval_secs(mut self, secs: u64) -> Self {
        self.config.eval_interval_secs = secs;
        self
    }

    /// 기본 쿨다운(초)을 설정합니다.
    pub fn default_cooldown_secs(mut self, secs: u64) -> Self {
        self.config.default_cooldown_secs = secs;
        self
    }

    /// 보존 기간(일)을 설정합니다.
    pub fn retention_days(mut self, days: u32) -> Self {
        self.config.retention_days = days;
        self
    }

    /// 브로드캐스트 버퍼 크기를 설정합니다.
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.config.broadcast_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
