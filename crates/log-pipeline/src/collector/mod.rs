//! 파일 수집 모듈 -- 로그 파일 탐색, 증분 읽기, 파일별 상태 추적
//!
//! # 구성
//! - [`file`]: glob 기반 파일 탐색, 오프셋 이후 바이트 읽기, 인코딩 판별
//! - [`StatusBoard`]: 파일 경로별 `ok`/`idle`/`missing` 상태 보드
//!
//! 상태 보드는 하나의 뮤텍스로 보호되며, 읽을 때는 복사본을 반환합니다.
//! 수집 루프가 쓰고 알림 엔진이 읽습니다.

pub mod file;

pub use file::{Chunk, ChunkLine, decode_chunk, discover_files, file_identity, read_from};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use fieldtail_core::types::FileStatus;

/// 파일 하나의 상태 기록
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileStatusEntry {
    /// 현재 상태
    pub status: FileStatus,
    /// 마지막 관찰 시각
    pub updated_at: DateTime<Utc>,
    /// 현재 상태로 바뀐 시각
    pub since: DateTime<Utc>,
}

/// 파일별 수집 상태 보드
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<BTreeMap<String, FileStatusEntry>>>,
}

impl StatusBoard {
    /// 빈 상태 보드를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 상태를 기록합니다. 상태가 바뀐 경우에만 `since`를 갱신합니다.
    pub fn set(&self, path: &str, status: FileStatus, now: DateTime<Utc>) {
        let mut board = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        board
            .entry(path.to_owned())
            .and_modify(|entry| {
                if entry.status != status {
                    tracing::info!(
                        path,
                        from = %entry.status,
                        to = %status,
                        "file status changed"
                    );
                    entry.status = status;
                    entry.since = now;
                }
                entry.updated_at = now;
            })
            .or_insert(FileStatusEntry {
                status,
                updated_at: now,
                since: now,
            });
    }

    /// 현재 상태의 복사본
    pub fn snapshot(&self) -> BTreeMap<String, FileStatusEntry> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 추적 중인 경로 목록
    pub fn paths(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// 경로 하나의 상태
    pub fn get(&self, path: &str) -> Option<FileStatusEntry> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
    }
}
