#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use fieldtail_log_pipeline::rule::{
    Rule, RuleAction, RuleContext, RuleDraft, RuleMatcher, RuleScope,
};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 목록 (최대 8개로 제한)
    rules: Vec<FuzzRule>,
    line: String,
    file_path: String,
    device: Option<String>,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    kind: FuzzKind,
    pattern: String,
    replace: String,
    priority: i8,
    device_scope: Option<String>,
}

#[derive(Arbitrary, Debug)]
enum FuzzKind {
    Ignore,
    ForceHeader,
    DeviceRewrite,
    LineReplace,
    Delimiter,
    CoerceNumeric,
}

impl FuzzRule {
    fn to_rule(&self, id: i64) -> Rule {
        let action = match self.kind {
            FuzzKind::Ignore => RuleAction::IgnoreLineRegex,
            FuzzKind::ForceHeader => RuleAction::ForceHeaderRegex,
            FuzzKind::DeviceRewrite => RuleAction::DeviceRewriteRegex {
                replace: self.replace.clone(),
            },
            FuzzKind::LineReplace => RuleAction::LineReplaceRegex {
                replace: self.replace.clone(),
            },
            FuzzKind::Delimiter => RuleAction::DelimiterOverride {
                delimiter: self.replace.clone(),
            },
            FuzzKind::CoerceNumeric => RuleAction::CoerceNumeric,
        };
        let mut draft = RuleDraft::new(action, Some(&self.pattern));
        draft.priority = i64::from(self.priority);
        if let Some(device) = &self.device_scope {
            draft.scope = RuleScope::Device(device.clone());
        }
        Rule::from_draft(id, draft, chrono::Utc::now())
    }
}

fuzz_target!(|input: FuzzInput| {
    let rules: Vec<Rule> = input
        .rules
        .iter()
        .take(8)
        .enumerate()
        .map(|(i, r)| r.to_rule(i as i64 + 1))
        .collect();

    // 컴파일에 실패한 패턴은 건너뛰고, 적용은 크래시 없이 끝나야 한다
    let matcher = RuleMatcher::compile(&rules, false);
    let outcome = matcher.apply(
        &input.line,
        RuleContext {
            file_path: &input.file_path,
            device: input.device.as_deref(),
        },
    );
    assert!(outcome.applied.len() <= rules.len());
});
