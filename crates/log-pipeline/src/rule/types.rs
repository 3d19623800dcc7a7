//! 파싱 규칙 데이터 타입
//!
//! 규칙은 관리 작업을 통해서만 생성/수정/삭제되며, 저장 전에
//! [`RuleDraft::validate`]로 검증됩니다.
//!
//! # JSON 형식
//! ```json
//! {
//!   "enabled": true,
//!   "mode": "ACTIVE",
//!   "priority": 10,
//!   "scope": "FILE",
//!   "scope_value": "/data/field/dev_a.log",
//!   "pattern": "^noise",
//!   "rule_type": "LINE_REPLACE_REGEX",
//!   "action": { "replace": "" },
//!   "note": "strip noise prefix"
//! }
//! ```

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 규칙 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleMode {
    /// 수집 시 적용
    #[default]
    Active,
    /// 초안 (미리보기 전용, 수집에는 적용하지 않음)
    Draft,
}

impl RuleMode {
    /// 저장용 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Draft => "DRAFT",
        }
    }
}

/// 규칙 적용 범위
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "scope_value", rename_all = "UPPERCASE")]
pub enum RuleScope {
    /// 모든 라인
    #[default]
    Global,
    /// 특정 파일 경로
    File(String),
    /// 특정 장비 ID
    Device(String),
}

impl RuleScope {
    /// 저장용 (종류, 값) 쌍
    pub fn to_parts(&self) -> (&'static str, Option<&str>) {
        match self {
            Self::Global => ("GLOBAL", None),
            Self::File(v) => ("FILE", Some(v.as_str())),
            Self::Device(v) => ("DEVICE", Some(v.as_str())),
        }
    }

    /// 저장된 (종류, 값) 쌍에서 복원합니다.
    pub fn from_parts(kind: &str, value: Option<String>) -> Result<Self, String> {
        match (kind, value) {
            ("GLOBAL", _) => Ok(Self::Global),
            ("FILE", Some(v)) => Ok(Self::File(v)),
            ("DEVICE", Some(v)) => Ok(Self::Device(v)),
            (kind, None) => Err(format!("scope {kind} requires a value")),
            (kind, _) => Err(format!("unknown scope: {kind}")),
        }
    }

    /// 주어진 컨텍스트에서 규칙이 적용되는지 확인합니다.
    pub fn matches(&self, file_path: &str, device: Option<&str>) -> bool {
        match self {
            Self::Global => true,
            Self::File(v) => v == file_path,
            Self::Device(v) => device == Some(v.as_str()),
        }
    }
}

/// 규칙 종류별 동작
///
/// `rule_type` 태그와 `action` 페이로드로 직렬화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "rule_type",
    content = "action",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum RuleAction {
    /// 패턴 매칭 시 라인을 버림 (평가 중단)
    IgnoreLineRegex,
    /// 패턴 매칭 시 헤더로 분류 (평가 중단)
    ForceHeaderRegex,
    /// 장비 ID 교정용 치환
    DeviceRewriteRegex {
        /// 치환 문자열 (`$1`, `${name}` 그룹 참조 가능)
        #[serde(default)]
        replace: String,
    },
    /// 일반 라인 치환
    LineReplaceRegex {
        /// 치환 문자열 (`$1`, `${name}` 그룹 참조 가능)
        #[serde(default)]
        replace: String,
    },
    /// 구분자 강제 지정
    DelimiterOverride {
        /// 구분자 문자열
        delimiter: String,
    },
    /// 허용 값 개수 범위 (양 끝 포함, 각각 선택)
    ValuecountRangeEnforce {
        /// 최소 개수
        #[serde(default)]
        min: Option<usize>,
        /// 최대 개수
        #[serde(default)]
        max: Option<usize>,
    },
    /// 파싱 시 제거할 값 위치
    DropValueIndexes {
        /// 0부터 시작하는 위치 목록
        indexes: Vec<usize>,
    },
    /// 모든 값을 실수로 변환
    CoerceNumeric,
}

impl RuleAction {
    /// 규칙 종류 이름
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::IgnoreLineRegex => "IGNORE_LINE_REGEX",
            Self::ForceHeaderRegex => "FORCE_HEADER_REGEX",
            Self::DeviceRewriteRegex { .. } => "DEVICE_REWRITE_REGEX",
            Self::LineReplaceRegex { .. } => "LINE_REPLACE_REGEX",
            Self::DelimiterOverride { .. } => "DELIMITER_OVERRIDE",
            Self::ValuecountRangeEnforce { .. } => "VALUECOUNT_RANGE_ENFORCE",
            Self::DropValueIndexes { .. } => "DROP_VALUE_INDEXES",
            Self::CoerceNumeric => "COERCE_NUMERIC",
        }
    }

    /// 패턴이 필요한 종류인지 확인합니다.
    pub fn requires_pattern(&self) -> bool {
        matches!(
            self,
            Self::IgnoreLineRegex
                | Self::ForceHeaderRegex
                | Self::DeviceRewriteRegex { .. }
                | Self::LineReplaceRegex { .. }
        )
    }

    /// `action` 페이로드만 JSON으로 변환합니다 (저장용).
    pub fn payload_json(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("action").unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        }
    }

    /// 저장된 종류 이름과 페이로드에서 복원합니다.
    pub fn from_parts(
        rule_type: &str,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let mut map = serde_json::Map::new();
        map.insert(
            "rule_type".to_owned(),
            serde_json::Value::String(rule_type.to_owned()),
        );
        if !payload.is_null() {
            map.insert("action".to_owned(), payload);
        }
        serde_json::from_value(serde_json::Value::Object(map))
    }
}

/// 저장 전 규칙 내용
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 모드
    #[serde(default)]
    pub mode: RuleMode,
    /// 우선순위 (오름차순 평가)
    #[serde(default = "default_priority")]
    pub priority: i64,
    /// 적용 범위
    #[serde(flatten)]
    pub scope: RuleScope,
    /// 정규식 패턴
    #[serde(default)]
    pub pattern: Option<String>,
    /// 종류별 동작
    #[serde(flatten)]
    pub action: RuleAction,
    /// 메모
    #[serde(default)]
    pub note: String,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i64 {
    RuleDraft::DEFAULT_PRIORITY
}

impl RuleDraft {
    /// 우선순위를 지정하지 않은 규칙의 기본값
    pub const DEFAULT_PRIORITY: i64 = 100;

    /// 기본값으로 채운 전역 규칙 초안을 만듭니다.
    pub fn new(action: RuleAction, pattern: Option<&str>) -> Self {
        Self {
            enabled: true,
            mode: RuleMode::Active,
            priority: Self::DEFAULT_PRIORITY,
            scope: RuleScope::Global,
            pattern: pattern.map(str::to_owned),
            action,
            note: String::new(),
        }
    }

    /// 규칙 내용의 유효성을 검증합니다.
    ///
    /// `rule_id`는 에러 메시지에만 사용됩니다.
    pub fn validate(&self, rule_id: &str) -> Result<(), LogPipelineError> {
        let fail = |reason: String| LogPipelineError::RuleValidation {
            rule_id: rule_id.to_owned(),
            reason,
        };

        match &self.scope {
            RuleScope::File(v) | RuleScope::Device(v) if v.is_empty() => {
                return Err(fail("scope value must not be empty".to_owned()));
            }
            _ => {}
        }

        if self.action.requires_pattern() {
            let pattern = self
                .pattern
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    fail(format!(
                        "{} requires a pattern",
                        self.action.type_name()
                    ))
                })?;
            Regex::new(pattern).map_err(|e| fail(format!("invalid pattern: {e}")))?;
        }

        match &self.action {
            RuleAction::DelimiterOverride { delimiter } if delimiter.is_empty() => {
                Err(fail("delimiter must not be empty".to_owned()))
            }
            RuleAction::ValuecountRangeEnforce {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(fail(format!("min ({min}) must not exceed max ({max})"))),
            RuleAction::DropValueIndexes { indexes } if indexes.is_empty() => {
                Err(fail("indexes must not be empty".to_owned()))
            }
            _ => Ok(()),
        }
    }
}

/// 저장된 규칙
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 규칙 ID
    pub id: i64,
    /// 활성화 여부
    pub enabled: bool,
    /// 모드
    pub mode: RuleMode,
    /// 우선순위
    pub priority: i64,
    /// 적용 범위
    #[serde(flatten)]
    pub scope: RuleScope,
    /// 정규식 패턴
    pub pattern: Option<String>,
    /// 종류별 동작
    #[serde(flatten)]
    pub action: RuleAction,
    /// 메모
    pub note: String,
    /// 마지막 수정 시각
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// 초안과 ID로 규칙을 구성합니다.
    pub fn from_draft(id: i64, draft: RuleDraft, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            enabled: draft.enabled,
            mode: draft.mode,
            priority: draft.priority,
            scope: draft.scope,
            pattern: draft.pattern,
            action: draft.action,
            note: draft.note,
            updated_at,
        }
    }

    /// 내용 부분만 초안으로 복사합니다.
    pub fn to_draft(&self) -> RuleDraft {
        RuleDraft {
            enabled: self.enabled,
            mode: self.mode,
            priority: self.priority,
            scope: self.scope.clone(),
            pattern: self.pattern.clone(),
            action: self.action.clone(),
            note: self.note.clone(),
        }
    }

    /// 수집에 적용되는 규칙인지 확인합니다.
    pub fn is_live(&self) -> bool {
        self.enabled && self.mode == RuleMode::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_serializes_with_type_tag() {
        let action = RuleAction::DropValueIndexes {
            indexes: vec![0, 2],
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["rule_type"], "DROP_VALUE_INDEXES");
        assert_eq!(json["action"]["indexes"], serde_json::json!([0, 2]));
    }

    #[test]
    fn unit_action_deserializes_without_payload() {
        let action: RuleAction =
            serde_json::from_str(r#"{"rule_type":"COERCE_NUMERIC"}"#).unwrap();
        assert_eq!(action, RuleAction::CoerceNumeric);
    }

    #[test]
    fn action_payload_parts_roundtrip() {
        let action = RuleAction::ValuecountRangeEnforce {
            min: Some(2),
            max: None,
        };
        let payload = action.payload_json();
        let back = RuleAction::from_parts(action.type_name(), payload).unwrap();
        assert_eq!(back, action);

        let unit = RuleAction::from_parts("IGNORE_LINE_REGEX", serde_json::Value::Null).unwrap();
        assert_eq!(unit, RuleAction::IgnoreLineRegex);
    }

    #[test]
    fn unknown_rule_type_is_rejected() {
        assert!(RuleAction::from_parts("EXPLODE", serde_json::Value::Null).is_err());
    }

    #[test]
    fn draft_deserializes_flattened_fields() {
        let json = r#"{
            "priority": 5,
            "scope": "DEVICE",
            "scope_value": "DEV_A",
            "pattern": "^#",
            "rule_type": "IGNORE_LINE_REGEX"
        }"#;
        let draft: RuleDraft = serde_json::from_str(json).unwrap();
        assert!(draft.enabled);
        assert_eq!(draft.priority, 5);
        assert_eq!(draft.mode, RuleMode::Active);
        assert_eq!(draft.scope, RuleScope::Device("DEV_A".to_owned()));
        assert_eq!(draft.action, RuleAction::IgnoreLineRegex);
    }

    #[test]
    fn validate_requires_pattern_for_regex_types() {
        let draft = RuleDraft::new(RuleAction::IgnoreLineRegex, None);
        let err = draft.validate("new").unwrap_err();
        assert!(err.to_string().contains("requires a pattern"));
    }

    #[test]
    fn validate_rejects_uncompilable_pattern() {
        let draft = RuleDraft::new(RuleAction::ForceHeaderRegex, Some("(unclosed"));
        let err = draft.validate("4").unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn validate_rejects_empty_delimiter() {
        let draft = RuleDraft::new(
            RuleAction::DelimiterOverride {
                delimiter: String::new(),
            },
            None,
        );
        assert!(draft.validate("new").is_err());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let draft = RuleDraft::new(
            RuleAction::ValuecountRangeEnforce {
                min: Some(5),
                max: Some(2),
            },
            None,
        );
        assert!(draft.validate("new").is_err());
    }

    #[test]
    fn validate_rejects_empty_scope_value() {
        let mut draft = RuleDraft::new(RuleAction::CoerceNumeric, None);
        draft.scope = RuleScope::File(String::new());
        assert!(draft.validate("new").is_err());
    }

    #[test]
    fn validate_accepts_context_rule_without_pattern() {
        let draft = RuleDraft::new(RuleAction::CoerceNumeric, None);
        draft.validate("new").unwrap();
    }

    #[test]
    fn scope_matching() {
        assert!(RuleScope::Global.matches("/a.log", None));
        assert!(RuleScope::File("/a.log".to_owned()).matches("/a.log", None));
        assert!(!RuleScope::File("/a.log".to_owned()).matches("/b.log", None));
        assert!(RuleScope::Device("D1".to_owned()).matches("/a.log", Some("D1")));
        assert!(!RuleScope::Device("D1".to_owned()).matches("/a.log", None));
    }

    #[test]
    fn scope_parts_roundtrip() {
        let scope = RuleScope::File("/x.log".to_owned());
        let (kind, value) = scope.to_parts();
        let back = RuleScope::from_parts(kind, value.map(str::to_owned)).unwrap();
        assert_eq!(back, scope);
        assert!(RuleScope::from_parts("DEVICE", None).is_err());
    }
}
