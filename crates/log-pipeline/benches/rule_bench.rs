//! 규칙 엔진 벤치마크
//!
//! 규칙 수에 따른 컴파일과 라인 적용 비용을 측정합니다.

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use fieldtail_log_pipeline::rule::{
    Rule, RuleAction, RuleContext, RuleDraft, RuleMatcher, RuleScope,
};

/// 여러 종류가 섞인 규칙 `count`개를 만듭니다.
fn make_rules(count: usize) -> Vec<Rule> {
    (0..count)
        .map(|i| {
            let draft = match i % 5 {
                0 => RuleDraft::new(RuleAction::IgnoreLineRegex, Some(&format!("^#skip{i}"))),
                1 => RuleDraft::new(
                    RuleAction::LineReplaceRegex {
                        replace: "$1".to_owned(),
                    },
                    Some(&format!(r"^junk{i}:(.*)$")),
                ),
                2 => {
                    let mut d = RuleDraft::new(RuleAction::CoerceNumeric, None);
                    d.scope = RuleScope::Device(format!("DEV_{i}"));
                    d
                }
                3 => {
                    let mut d = RuleDraft::new(
                        RuleAction::DropValueIndexes { indexes: vec![0] },
                        None,
                    );
                    d.scope = RuleScope::File(format!("/data/{i}.log"));
                    d
                }
                _ => RuleDraft::new(RuleAction::ForceHeaderRegex, Some(&format!("^HDR{i}"))),
            };
            Rule::from_draft(i as i64 + 1, draft, Utc::now())
        })
        .collect()
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_compile");
    for count in [10, 100] {
        let rules = make_rules(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &rules, |b, rules| {
            b.iter(|| RuleMatcher::compile(black_box(rules), false))
        });
    }
    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let ctx = RuleContext {
        file_path: "/data/3.log",
        device: Some("DEV_2"),
    };
    let mut group = c.benchmark_group("rule_apply");
    group.throughput(Throughput::Elements(1));
    for count in [0, 10, 100] {
        let matcher = RuleMatcher::compile(&make_rules(count), false);
        group.bench_with_input(
            BenchmarkId::new("no_match", count),
            &matcher,
            |b, matcher| b.iter(|| matcher.apply(black_box("DEV_2;1;2;3;4"), ctx)),
        );
        group.bench_with_input(
            BenchmarkId::new("early_ignore", count),
            &matcher,
            |b, matcher| b.iter(|| matcher.apply(black_box("#skip0 comment"), ctx)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_apply);
criterion_main!(benches);
