//! 설정 관리 -- fieldtail.toml 파싱 및 런타임 설정
//!
//! [`FieldtailConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`FIELDTAIL_INGEST_LOG_DIR=/data/logs` 형식)
//! 3. 설정 파일 (`fieldtail.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), fieldtail_core::error::FieldtailError> {
//! use fieldtail_core::config::FieldtailConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = FieldtailConfig::load("fieldtail.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = FieldtailConfig::parse("[ingest]\nlog_dir = \"/data/logs\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, FieldtailError};

/// fieldtail 통합 설정
///
/// `fieldtail.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldtailConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 파일 수집 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 규칙 캐시 설정
    #[serde(default)]
    pub rules: RulesConfig,
    /// 알림 평가 설정
    #[serde(default)]
    pub alert: AlertConfig,
    /// 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 웹훅 알림 설정
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// 이벤트 브로드캐스트 설정
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl FieldtailConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FieldtailError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FieldtailError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FieldtailError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                FieldtailError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, FieldtailError> {
        toml::from_str(toml_str).map_err(|e| {
            FieldtailError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `FIELDTAIL_{SECTION}_{FIELD}`
    /// 예: `FIELDTAIL_NOTIFIER_WEBHOOK_URL=https://hooks.example.com/x`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "FIELDTAIL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "FIELDTAIL_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.pid_file, "FIELDTAIL_GENERAL_PID_FILE");

        // Ingest
        override_string(&mut self.ingest.log_dir, "FIELDTAIL_INGEST_LOG_DIR");
        override_csv(
            &mut self.ingest.include_files,
            "FIELDTAIL_INGEST_INCLUDE_FILES",
        );
        override_u64(
            &mut self.ingest.poll_interval_ms,
            "FIELDTAIL_INGEST_POLL_INTERVAL_MS",
        );

        // Rules
        override_u64(&mut self.rules.reload_secs, "FIELDTAIL_RULES_RELOAD_SECS");

        // Alert
        override_u64(
            &mut self.alert.default_cooldown_secs,
            "FIELDTAIL_ALERT_DEFAULT_COOLDOWN_SECS",
        );
        override_u64(
            &mut self.alert.eval_interval_secs,
            "FIELDTAIL_ALERT_EVAL_INTERVAL_SECS",
        );

        // Storage
        override_string(&mut self.storage.db_path, "FIELDTAIL_STORAGE_DB_PATH");
        override_u32(
            &mut self.storage.retention_days,
            "FIELDTAIL_STORAGE_RETENTION_DAYS",
        );
        override_u64(
            &mut self.storage.retention_sweep_interval_secs,
            "FIELDTAIL_STORAGE_RETENTION_SWEEP_INTERVAL_SECS",
        );

        // Notifier
        override_string(
            &mut self.notifier.webhook_url,
            "FIELDTAIL_NOTIFIER_WEBHOOK_URL",
        );
        override_u64(
            &mut self.notifier.timeout_secs,
            "FIELDTAIL_NOTIFIER_TIMEOUT_SECS",
        );
        override_bool(&mut self.notifier.disabled, "FIELDTAIL_NOTIFIER_DISABLED");

        // Broadcast
        override_usize(
            &mut self.broadcast.capacity,
            "FIELDTAIL_BROADCAST_CAPACITY",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "FIELDTAIL_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "FIELDTAIL_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "FIELDTAIL_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), FieldtailError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.ingest.log_dir.is_empty() {
            return Err(invalid("ingest.log_dir", "must not be empty"));
        }
        if self.ingest.include_files.iter().all(|p| p.is_empty()) {
            return Err(invalid(
                "ingest.include_files",
                "at least one glob pattern is required",
            ));
        }
        if self.ingest.poll_interval_ms == 0 {
            return Err(invalid("ingest.poll_interval_ms", "must be greater than 0"));
        }

        if self.rules.reload_secs == 0 {
            return Err(invalid("rules.reload_secs", "must be greater than 0"));
        }

        if self.alert.eval_interval_secs == 0 {
            return Err(invalid("alert.eval_interval_secs", "must be greater than 0"));
        }

        if self.storage.db_path.is_empty() {
            return Err(invalid("storage.db_path", "must not be empty"));
        }
        if self.storage.retention_days == 0 {
            return Err(invalid("storage.retention_days", "must be greater than 0"));
        }
        if self.storage.retention_sweep_interval_secs == 0 {
            return Err(invalid(
                "storage.retention_sweep_interval_secs",
                "must be greater than 0",
            ));
        }

        if self.notifier.timeout_secs == 0 {
            return Err(invalid("notifier.timeout_secs", "must be greater than 0"));
        }

        if self.broadcast.capacity == 0 {
            return Err(invalid("broadcast.capacity", "must be greater than 0"));
        }

        if self.metrics.enabled && !self.metrics.endpoint.starts_with('/') {
            return Err(invalid("metrics.endpoint", "must start with '/'"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> FieldtailError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 파일 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 로그 파일 디렉토리
    pub log_dir: String,
    /// `log_dir` 기준 glob 패턴 목록
    pub include_files: Vec<String>,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            log_dir: "./sample_logs".to_owned(),
            include_files: vec!["*".to_owned()],
            poll_interval_ms: 1000,
        }
    }
}

/// 규칙 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// 규칙 캐시 최대 유효 시간 (초)
    pub reload_secs: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self { reload_secs: 10 }
    }
}

/// 알림 평가 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// 정책에 쿨다운이 없을 때 쓰는 기본 쿨다운 (초)
    pub default_cooldown_secs: u64,
    /// 정책 평가 주기 (초)
    pub eval_interval_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            default_cooldown_secs: 60,
            eval_interval_secs: 5,
        }
    }
}

/// 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite 데이터베이스 경로
    pub db_path: String,
    /// 이벤트/알림/감사 로그 보존 기간 (일)
    pub retention_days: u32,
    /// 보존 기간 정리 주기 (초)
    pub retention_sweep_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data.db".to_owned(),
            retention_days: 30,
            retention_sweep_interval_secs: 3600,
        }
    }
}

/// 웹훅 알림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// 채팅 웹훅 URL (빈 문자열이면 비활성)
    pub webhook_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 전송 비활성화
    pub disabled: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            timeout_secs: 5,
            disabled: false,
        }
    }
}

impl NotifierConfig {
    /// 실제로 전송 가능한 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        !self.disabled && !self.webhook_url.is_empty()
    }
}

/// 이벤트 브로드캐스트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// 버퍼 최대 크기
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { capacity: 2000 }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 익스포터 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match parse_bool(&val) {
            Some(parsed) => *target = parsed,
            None => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

macro_rules! numeric_override {
    ($name:ident, $ty:ty) => {
        fn $name(target: &mut $ty, env_key: &str) {
            if let Ok(val) = std::env::var(env_key) {
                match val.trim().parse::<$ty>() {
                    Ok(parsed) => *target = parsed,
                    Err(_) => warn!(
                        env_key,
                        value = val.as_str(),
                        concat!("failed to parse ", stringify!($ty), " from env var, ignoring")
                    ),
                }
            }
        }
    };
}

numeric_override!(override_u16, u16);
numeric_override!(override_u32, u32);
numeric_override!(override_u64, u64);
numeric_override!(override_usize, usize);

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
