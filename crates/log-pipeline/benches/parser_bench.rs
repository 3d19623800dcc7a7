//! 라인 파서 벤치마크
//!
//! 구분자별 라인 파싱과 값 추출의 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use fieldtail_log_pipeline::parser::{extract_values, parse_line, pre_scan_device};
use fieldtail_log_pipeline::rule::ParseOverrides;

/// 세미콜론 구분 데이터 라인
const SEMICOLON: &str = "DEV_A;1;2;3;4;-1; 419";

/// 탭 구분 데이터 라인
const TAB: &str = "DEV_B\t2\t3\t9\t8";

/// 공백 구분, 실수/음수 포함 긴 라인
const WHITESPACE_LONG: &str = "PLC-07 12 3 0 1 -4.25 18.5 22.75 0 0 1 1 0 100 -200 3.125 7 7 7 9999 0.001";

/// 필드 부족 라인
const SHORT: &str = "boot complete";

fn bench_parse_line(c: &mut Criterion) {
    let overrides = ParseOverrides::default();
    let mut group = c.benchmark_group("parse_line");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [
        ("semicolon", SEMICOLON),
        ("tab", TAB),
        ("whitespace_long", WHITESPACE_LONG),
        ("not_enough_fields", SHORT),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| parse_line(black_box(line), &overrides))
        });
    }

    group.finish();
}

fn bench_overrides(c: &mut Criterion) {
    let overrides = ParseOverrides {
        delimiter: Some(" ".to_owned()),
        value_count_range: Some((Some(1), Some(32))),
        drop_indexes: vec![0, 2, 4],
        coerce_numeric: true,
    };

    c.bench_function("parse_line_with_overrides", |b| {
        b.iter(|| parse_line(black_box(WHITESPACE_LONG), &overrides))
    });
}

fn bench_throughput(c: &mut Criterion) {
    let overrides = ParseOverrides::default();
    let lines: Vec<String> = (0..1000)
        .map(|i| format!("DEV_{};{};{};{};{};-{}", i % 16, i, i % 7, i * 3, i % 2, i % 5))
        .collect();

    let mut group = c.benchmark_group("parse_throughput");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("1000_lines", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(parse_line(line, &overrides));
            }
        })
    });
    group.finish();
}

fn bench_helpers(c: &mut Criterion) {
    c.bench_function("pre_scan_device", |b| {
        b.iter(|| pre_scan_device(black_box(WHITESPACE_LONG)))
    });
    let tokens: Vec<&str> = "1 -4.25 18.5 x 22.75 0 100 -200 3.125"
        .split_whitespace()
        .collect();
    c.bench_function("extract_values", |b| {
        b.iter(|| extract_values(black_box(&tokens)))
    });
}

criterion_group!(
    benches,
    bench_parse_line,
    bench_overrides,
    bench_throughput,
    bench_helpers
);
criterion_main!(benches);
