//! 규칙 매칭 로직 -- 컴파일된 규칙 적용
//!
//! [`RuleMatcher`]는 정렬된 규칙 목록을 정규식까지 미리 컴파일해 두고,
//! 라인 하나에 대해 우선순위 순서대로 적용합니다.

use regex::Regex;

use fieldtail_core::types::RecordKind;

use super::types::{Rule, RuleAction, RuleScope};
use crate::error::LogPipelineError;

/// 규칙 적용 컨텍스트
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// 라인이 속한 파일 경로
    pub file_path: &'a str,
    /// 라인에서 미리 추출한 장비 ID
    pub device: Option<&'a str>,
}

/// 파서에 전달되는 규칙 누적 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOverrides {
    /// 구분자 강제 지정
    pub delimiter: Option<String>,
    /// 허용 값 개수 범위
    pub value_count_range: Option<(Option<usize>, Option<usize>)>,
    /// 제거할 값 위치
    pub drop_indexes: Vec<usize>,
    /// 실수 변환 여부
    pub coerce_numeric: bool,
}

/// 규칙 적용 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    /// 치환이 반영된 라인
    pub line: String,
    /// 평가를 중단시킨 규칙이 지정한 레코드 종류
    pub kind_override: Option<RecordKind>,
    /// 적용된 규칙 ID (적용 순서)
    pub applied: Vec<i64>,
    /// 파서 오버라이드
    pub overrides: ParseOverrides,
}

impl RuleOutcome {
    /// IGNORE 규칙으로 버려졌는지 확인합니다.
    pub fn is_ignored(&self) -> bool {
        self.kind_override == Some(RecordKind::Ignore)
    }
}

enum CompiledAction {
    Ignore(Regex),
    ForceHeader(Regex),
    Substitute(Regex, String),
    Delimiter(String),
    ValueCountRange(Option<usize>, Option<usize>),
    DropIndexes(Vec<usize>),
    Coerce,
}

struct CompiledRule {
    id: i64,
    scope: RuleScope,
    action: CompiledAction,
}

/// 규칙 매처 -- 정렬된 컴파일 규칙 목록
///
/// 생성 후에는 변경되지 않으므로 `Arc`로 공유해 스냅샷처럼 사용합니다.
#[derive(Default)]
pub struct RuleMatcher {
    rules: Vec<CompiledRule>,
}

impl RuleMatcher {
    /// 빈 매처를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙 목록을 우선순위(오름차순), ID(오름차순) 순서로 컴파일합니다.
    ///
    /// 비활성/초안 규칙은 `include_drafts`가 아니면 건너뜁니다.
    /// 패턴이 컴파일되지 않는 규칙은 경고 후 건너뜁니다.
    pub fn compile(rules: &[Rule], include_drafts: bool) -> Self {
        let mut sorted: Vec<&Rule> = rules
            .iter()
            .filter(|r| r.enabled && (include_drafts || r.is_live()))
            .collect();
        sorted.sort_by_key(|r| (r.priority, r.id));

        let mut compiled = Vec::with_capacity(sorted.len());
        for rule in sorted {
            match compile_rule(rule) {
                Ok(c) => compiled.push(c),
                Err(e) => tracing::warn!(rule_id = rule.id, error = %e, "skipping rule"),
            }
        }
        Self { rules: compiled }
    }

    /// 컴파일된 규칙 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 라인에 규칙을 순서대로 적용합니다.
    ///
    /// IGNORE/FORCE_HEADER 규칙이 매칭되면 즉시 중단합니다.
    /// 나머지 규칙은 컨텍스트를 누적하고 계속 진행합니다.
    pub fn apply(&self, line: &str, ctx: RuleContext<'_>) -> RuleOutcome {
        let mut outcome = RuleOutcome {
            line: line.to_owned(),
            kind_override: None,
            applied: Vec::new(),
            overrides: ParseOverrides::default(),
        };

        for rule in &self.rules {
            if !rule.scope.matches(ctx.file_path, ctx.device) {
                continue;
            }

            match &rule.action {
                CompiledAction::Ignore(re) => {
                    if re.is_match(&outcome.line) {
                        outcome.applied.push(rule.id);
                        outcome.kind_override = Some(RecordKind::Ignore);
                        return outcome;
                    }
                }
                CompiledAction::ForceHeader(re) => {
                    if re.is_match(&outcome.line) {
                        outcome.applied.push(rule.id);
                        outcome.kind_override = Some(RecordKind::Header);
                        return outcome;
                    }
                }
                CompiledAction::Substitute(re, replace) => {
                    if re.is_match(&outcome.line) {
                        outcome.line = re.replace_all(&outcome.line, replace.as_str()).into_owned();
                        outcome.applied.push(rule.id);
                    }
                }
                CompiledAction::Delimiter(delimiter) => {
                    outcome.overrides.delimiter = Some(delimiter.clone());
                    outcome.applied.push(rule.id);
                }
                CompiledAction::ValueCountRange(min, max) => {
                    outcome.overrides.value_count_range = Some((*min, *max));
                    outcome.applied.push(rule.id);
                }
                CompiledAction::DropIndexes(indexes) => {
                    outcome.overrides.drop_indexes = indexes.clone();
                    outcome.applied.push(rule.id);
                }
                CompiledAction::Coerce => {
                    outcome.overrides.coerce_numeric = true;
                    outcome.applied.push(rule.id);
                }
            }
        }

        outcome
    }
}

fn compile_rule(rule: &Rule) -> Result<CompiledRule, LogPipelineError> {
    let pattern = || -> Result<Regex, LogPipelineError> {
        let raw = rule.pattern.as_deref().unwrap_or_default();
        if raw.is_empty() {
            return Err(LogPipelineError::RuleValidation {
                rule_id: rule.id.to_string(),
                reason: format!("{} requires a pattern", rule.action.type_name()),
            });
        }
        Ok(Regex::new(raw)?)
    };

    let action = match &rule.action {
        RuleAction::IgnoreLineRegex => CompiledAction::Ignore(pattern()?),
        RuleAction::ForceHeaderRegex => CompiledAction::ForceHeader(pattern()?),
        RuleAction::DeviceRewriteRegex { replace } | RuleAction::LineReplaceRegex { replace } => {
            CompiledAction::Substitute(pattern()?, replace.clone())
        }
        RuleAction::DelimiterOverride { delimiter } => {
            if delimiter.is_empty() {
                return Err(LogPipelineError::RuleValidation {
                    rule_id: rule.id.to_string(),
                    reason: "delimiter must not be empty".to_owned(),
                });
            }
            CompiledAction::Delimiter(delimiter.clone())
        }
        RuleAction::ValuecountRangeEnforce { min, max } => CompiledAction::ValueCountRange(*min, *max),
        RuleAction::DropValueIndexes { indexes } => CompiledAction::DropIndexes(indexes.clone()),
        RuleAction::CoerceNumeric => CompiledAction::Coerce,
    };

    Ok(CompiledRule {
        id: rule.id,
        scope: rule.scope.clone(),
        action,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::super::types::{RuleDraft, RuleMode};
    use super::*;

    fn rule(id: i64, priority: i64, action: RuleAction, pattern: Option<&str>) -> Rule {
        let mut draft = RuleDraft::new(action, pattern);
        draft.priority = priority;
        Rule::from_draft(id, draft, Utc::now())
    }

    fn ctx(path: &str) -> RuleContext<'_> {
        RuleContext {
            file_path: path,
            device: None,
        }
    }

    #[test]
    fn ignore_short_circuits_lower_priority_rules() {
        let rules = vec![
            rule(1, 0, RuleAction::IgnoreLineRegex, Some("^noise")),
            rule(2, 1, RuleAction::CoerceNumeric, None),
        ];
        let matcher = RuleMatcher::compile(&rules, false);
        let out = matcher.apply("noise DEV_A 1 2 3", ctx("/a.log"));
        assert!(out.is_ignored());
        assert_eq!(out.applied, vec![1]);
        assert!(!out.overrides.coerce_numeric);
    }

    #[test]
    fn force_header_short_circuits() {
        let rules = vec![
            rule(1, 0, RuleAction::ForceHeaderRegex, Some("^SEQ")),
            rule(2, 1, RuleAction::CoerceNumeric, None),
        ];
        let out = RuleMatcher::compile(&rules, false).apply("SEQ GRP V1", ctx("/a.log"));
        assert_eq!(out.kind_override, Some(RecordKind::Header));
        assert_eq!(out.applied, vec![1]);
    }

    #[test]
    fn substitution_records_id_only_when_replaced() {
        let rules = vec![
            rule(
                1,
                0,
                RuleAction::LineReplaceRegex {
                    replace: String::new(),
                },
                Some("^garbage"),
            ),
            rule(
                2,
                1,
                RuleAction::DeviceRewriteRegex {
                    replace: "DEV_$1".to_owned(),
                },
                Some(r"^D(\d+)"),
            ),
        ];
        let matcher = RuleMatcher::compile(&rules, false);
        let out = matcher.apply("D7;1;2;3", ctx("/a.log"));
        assert_eq!(out.line, "DEV_7;1;2;3");
        assert_eq!(out.applied, vec![2]);
    }

    #[test]
    fn evaluation_order_is_priority_then_id() {
        let rules = vec![
            rule(9, 0, RuleAction::CoerceNumeric, None),
            rule(3, 5, RuleAction::DropValueIndexes { indexes: vec![0] }, None),
            rule(4, 0, RuleAction::DelimiterOverride { delimiter: ",".to_owned() }, None),
        ];
        let out = RuleMatcher::compile(&rules, false).apply("x", ctx("/a.log"));
        assert_eq!(out.applied, vec![4, 9, 3]);
        assert_eq!(out.overrides.delimiter.as_deref(), Some(","));
        assert_eq!(out.overrides.drop_indexes, vec![0]);
        assert!(out.overrides.coerce_numeric);
    }

    #[test]
    fn later_context_rule_overrides_earlier_one() {
        let rules = vec![
            rule(1, 0, RuleAction::ValuecountRangeEnforce { min: Some(1), max: None }, None),
            rule(2, 1, RuleAction::ValuecountRangeEnforce { min: None, max: Some(4) }, None),
        ];
        let out = RuleMatcher::compile(&rules, false).apply("x", ctx("/a.log"));
        assert_eq!(out.overrides.value_count_range, Some((None, Some(4))));
    }

    #[test]
    fn scoped_rules_require_exact_match() {
        let mut file_rule = rule(1, 0, RuleAction::CoerceNumeric, None);
        file_rule.scope = RuleScope::File("/a.log".to_owned());
        let mut device_rule = rule(2, 0, RuleAction::DropValueIndexes { indexes: vec![1] }, None);
        device_rule.scope = RuleScope::Device("DEV_A".to_owned());
        let matcher = RuleMatcher::compile(&[file_rule, device_rule], false);

        let out = matcher.apply(
            "x",
            RuleContext {
                file_path: "/b.log",
                device: Some("DEV_A"),
            },
        );
        assert_eq!(out.applied, vec![2]);

        let out = matcher.apply("x", ctx("/a.log"));
        assert_eq!(out.applied, vec![1]);
    }

    #[test]
    fn disabled_and_draft_rules_are_skipped_unless_requested() {
        let mut disabled = rule(1, 0, RuleAction::CoerceNumeric, None);
        disabled.enabled = false;
        let mut draft = rule(2, 0, RuleAction::CoerceNumeric, None);
        draft.mode = RuleMode::Draft;

        let live = RuleMatcher::compile(&[disabled.clone(), draft.clone()], false);
        assert!(live.is_empty());

        let preview = RuleMatcher::compile(&[disabled, draft], true);
        assert_eq!(preview.len(), 1);
    }

    #[test]
    fn uncompilable_rule_is_skipped() {
        let rules = vec![
            rule(1, 0, RuleAction::IgnoreLineRegex, Some("(broken")),
            rule(2, 1, RuleAction::CoerceNumeric, None),
        ];
        let matcher = RuleMatcher::compile(&rules, false);
        assert_eq!(matcher.len(), 1);
    }
}
