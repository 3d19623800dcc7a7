//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for FieldtailError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use fieldtail_core::error::{ConfigError, FieldtailError, PipelineError, StorageError};

/// 로그 파이프라인 도메인 에러
///
/// 수집, 규칙 검증, 저장소, 알림 전송 등 파이프라인 내부의
/// 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 규칙 유효성 검증 실패
    #[error("rule validation error: rule '{rule_id}': {reason}")]
    RuleValidation {
        /// 문제가 된 규칙 ID (신규 규칙은 "new")
        rule_id: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 존재하지 않는 규칙
    #[error("rule not found: {0}")]
    RuleNotFound(i64),

    /// 존재하지 않는 알림
    #[error("alert not found: {0}")]
    AlertNotFound(i64),

    /// 수집기 에러 (파일 탐색, glob 패턴 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (glob, file 등)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 저장소 에러
    #[error("store error: {0}")]
    Store(String),

    /// SQLite 에러
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// 가져오기 번들 에러
    #[error("import error: {0}")]
    Import(String),

    /// 알림 전송 클라이언트 에러
    #[error("notify error: {0}")]
    Notify(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON 직렬화 에러
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<LogPipelineError> for FieldtailError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Config { field, reason } => {
                FieldtailError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Io(e) => FieldtailError::Io(e),
            LogPipelineError::Sqlite(e) => FieldtailError::Storage(StorageError::Query(e.to_string())),
            LogPipelineError::Store(reason) => FieldtailError::Storage(StorageError::Query(reason)),
            other => FieldtailError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_validation_display() {
        let err = LogPipelineError::RuleValidation {
            rule_id: "7".to_owned(),
            reason: "pattern is required".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'7'"));
        assert!(msg.contains("pattern is required"));
    }

    #[test]
    fn collector_error_display() {
        let err = LogPipelineError::Collector {
            source_type: "glob".to_owned(),
            reason: "invalid pattern".to_owned(),
        };
        assert_eq!(err.to_string(), "collector error: glob: invalid pattern");
    }

    #[test]
    fn config_error_converts_to_config_variant() {
        let err = LogPipelineError::Config {
            field: "poll_interval".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        let top: FieldtailError = err.into();
        assert!(matches!(top, FieldtailError::Config(_)));
    }

    #[test]
    fn store_error_converts_to_storage_variant() {
        let top: FieldtailError = LogPipelineError::Store("locked".to_owned()).into();
        assert!(matches!(top, FieldtailError::Storage(_)));
    }

    #[test]
    fn other_errors_convert_to_pipeline_variant() {
        let top: FieldtailError = LogPipelineError::RuleNotFound(3).into();
        assert!(matches!(top, FieldtailError::Pipeline(_)));
        assert!(top.to_string().contains("rule not found: 3"));
    }
}
