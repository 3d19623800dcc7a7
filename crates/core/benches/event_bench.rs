//! 이벤트 직렬화 벤치마크
//!
//! 저장소와 브로드캐스트가 사용하는 Event JSON 변환 성능을 측정합니다.

use std::hint::black_box;

use chrono::Utc;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use fieldtail_core::types::{Event, NumericValue, RecordKind};

fn create_event(value_count: usize) -> Event {
    let values: Vec<NumericValue> = (0..value_count)
        .map(|i| {
            if i % 3 == 0 {
                NumericValue::Float(i as f64 * 0.5)
            } else {
                NumericValue::Int(i as i64 - 2)
            }
        })
        .collect();
    Event {
        id: 0,
        file_path: "/data/field/dev_a.log".to_owned(),
        raw_line: "DEV_A;1;2;3;4;-1;419".to_owned(),
        record_kind: RecordKind::Data,
        parse_ok: true,
        parse_error: None,
        device_id: Some("DEV_A".to_owned()),
        seq: Some(1),
        grp: Some(2),
        value_count: values.len(),
        min_val: Some(-2.0),
        max_val: Some(value_count as f64),
        mean_val: Some(1.0),
        has_negative: true,
        values,
        rule_ids: vec![1, 4],
        created_at: Utc::now(),
    }
}

fn bench_event_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_serialize");
    for count in [4usize, 32, 256] {
        let event = create_event(count);
        group.throughput(Throughput::Elements(1));
        group.bench_function(format!("values_{count}"), |b| {
            b.iter(|| serde_json::to_string(black_box(&event)))
        });
    }
    group.finish();
}

fn bench_values_json(c: &mut Criterion) {
    let event = create_event(64);
    let json = serde_json::to_string(&event.values).unwrap_or_default();
    c.bench_function("values_deserialize_64", |b| {
        b.iter(|| serde_json::from_str::<Vec<NumericValue>>(black_box(&json)))
    });
}

criterion_group!(benches, bench_event_serialize, bench_values_json);
criterion_main!(benches);
