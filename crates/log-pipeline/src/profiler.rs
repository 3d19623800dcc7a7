//! 값 프로파일러 -- (장비, 그룹)별 수치 벡터 통계
//!
//! 파싱에 성공한 값 벡터를 (장비, 그룹)별로 모으고, 배치가
//! [`BATCH_SIZE`]에 도달하면 위치별 통계를 계산해 저장소에 덮어씁니다.
//! 통계는 가장 최근 배치만 반영하며 누적되지 않습니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use fieldtail_core::metrics as m;
use fieldtail_core::types::NumericValue;

use crate::error::LogPipelineError;
use crate::store::{IndexStats, Store, ValueProfile};

/// 통계를 계산하는 배치 크기
pub const BATCH_SIZE: usize = 50;

type Key = (String, i64);

/// 값 프로파일러
pub struct Profiler {
    store: Arc<dyn Store>,
    batches: Mutex<HashMap<Key, Vec<Vec<NumericValue>>>>,
}

impl Profiler {
    /// 새 프로파일러를 생성합니다.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            batches: Mutex::new(HashMap::new()),
        }
    }

    /// 값 벡터를 추가합니다. 배치가 가득 차면 플러시하고 `true`를 반환합니다.
    ///
    /// 장비 ID가 없으면 빈 문자열로 묶습니다.
    pub fn record(
        &self,
        device: Option<&str>,
        grp: i64,
        values: &[NumericValue],
    ) -> Result<bool, LogPipelineError> {
        let key = (device.unwrap_or_default().to_owned(), grp);
        let full = {
            let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
            let batch = batches.entry(key.clone()).or_default();
            batch.push(values.to_vec());
            if batch.len() >= BATCH_SIZE {
                batches.remove(&key)
            } else {
                None
            }
        };

        let Some(samples) = full else {
            return Ok(false);
        };
        let profile = compute_profile(&key.0, key.1, &samples);
        self.store.upsert_profile(&profile)?;
        metrics::counter!(m::PROFILER_FLUSHES_TOTAL).increment(1);
        tracing::debug!(
            device = %key.0,
            grp = key.1,
            typical_value_count = profile.typical_value_count,
            "value profile flushed"
        );
        Ok(true)
    }

    /// 아직 플러시되지 않은 (장비, 그룹)별 벡터 수
    pub fn pending(&self) -> HashMap<(String, i64), usize> {
        let batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.iter().map(|(k, v)| (k.clone(), v.len())).collect()
    }
}

/// 배치에서 프로파일을 계산합니다.
///
/// 길이가 다른 벡터는 자신의 길이까지만 위치별 통계에 기여합니다.
pub fn compute_profile(device: &str, grp: i64, samples: &[Vec<NumericValue>]) -> ValueProfile {
    let total_len: usize = samples.iter().map(Vec::len).sum();
    let typical_value_count = if samples.is_empty() {
        0
    } else {
        (total_len as f64 / samples.len() as f64).round_ties_even() as usize
    };

    let width = samples.iter().map(Vec::len).max().unwrap_or(0);
    let mut by_index: Vec<Vec<f64>> = vec![Vec::new(); width];
    for vector in samples {
        for (idx, value) in vector.iter().enumerate() {
            by_index[idx].push(value.as_f64());
        }
    }

    let indexes = by_index
        .iter()
        .enumerate()
        .filter(|(_, column)| !column.is_empty())
        .map(|(idx, column)| index_stats(idx, column))
        .collect();

    ValueProfile {
        device: device.to_owned(),
        grp,
        typical_value_count,
        sample_count: samples.len(),
        indexes,
        updated_at: Utc::now(),
    }
}

fn index_stats(idx: usize, column: &[f64]) -> IndexStats {
    let n = column.len() as f64;
    let min = column.iter().copied().fold(f64::INFINITY, f64::min);
    let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = column.iter().sum::<f64>() / n;
    let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    // 정수 3과 실수 3.0은 같은 값으로 취급
    let unique_count = column
        .iter()
        .map(|v| if *v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() })
        .collect::<HashSet<_>>()
        .len();
    let negatives = column.iter().filter(|v| **v < 0.0).count();

    IndexStats {
        idx,
        min,
        max,
        mean,
        std: variance.sqrt(),
        unique_count,
        is_binary: unique_count <= 2,
        is_constant: unique_count == 1,
        negative_rate: negatives as f64 / n,
    }
}
