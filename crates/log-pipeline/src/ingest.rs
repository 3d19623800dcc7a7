//! 수집 루프 -- 파일별 증분 읽기, 규칙 적용, 파싱, 저장, 프로파일링, 발행
//!
//! [`IngestLoop::ingest_once`]는 한 번의 폴링 패스를 수행합니다. 대상 파일마다
//! 저장된 오프셋 이후 바이트만 읽고, 라인별로 다음 순서를 따릅니다.
//!
//! ```text
//! line -> RuleEngine -> (IGNORE: drop | FORCE_HEADER: header event | Parser)
//!      -> Store.insert_event -> Profiler (parse_ok && values) -> EventBroadcast
//! ```
//!
//! 파일 하나를 처리하다 저장소 오류가 나면 그 파일의 패스는 중단됩니다.
//! 오프셋은 이미 저장된 마지막 라인 끝까지만 전진하므로, 다음 패스는
//! 실패한 라인부터 다시 읽고 앞선 라인을 중복 저장하지 않습니다.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use fieldtail_core::metrics as m;
use fieldtail_core::types::{FileStatus, RecordKind};

use crate::broadcast::EventBroadcast;
use crate::collector::{StatusBoard, decode_chunk, discover_files, file_identity, read_from};
use crate::error::LogPipelineError;
use crate::parser::{self, ParsedRecord};
use crate::profiler::Profiler;
use crate::rule::{RuleContext, RuleEngine};
use crate::store::{FileState, Store};

/// 수집 대상 설정
#[derive(Debug, Clone)]
pub struct IngestTarget {
    /// 로그 디렉토리
    pub log_dir: PathBuf,
    /// 디렉토리 기준 glob 패턴
    pub include_files: Vec<String>,
}

/// 파일 하나의 패스 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// 새 라인을 처리함 (처리한 라인 수)
    Processed(usize),
    /// 새 데이터 없음
    Idle,
    /// 열기/조회 실패
    Missing,
    /// 저장소 오류로 중단 (저장된 라인까지만 오프셋 전진)
    Aborted,
}

/// 한 번의 패스 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// 확인한 파일 수
    pub files: usize,
    /// 저장된 이벤트 수
    pub events: usize,
    /// 규칙으로 버려진 라인 수
    pub ignored: usize,
    /// 중단된 파일 수
    pub aborted: usize,
}

/// 수집 루프
pub struct IngestLoop {
    target: IngestTarget,
    store: Arc<dyn Store>,
    rules: Arc<RuleEngine>,
    profiler: Arc<Profiler>,
    broadcast: Arc<EventBroadcast>,
    status: StatusBoard,
}

impl IngestLoop {
    /// 새 수집 루프를 생성합니다.
    pub fn new(
        target: IngestTarget,
        store: Arc<dyn Store>,
        rules: Arc<RuleEngine>,
        profiler: Arc<Profiler>,
        broadcast: Arc<EventBroadcast>,
        status: StatusBoard,
    ) -> Self {
        Self {
            target,
            store,
            rules,
            profiler,
            broadcast,
            status,
        }
    }

    /// 상태 보드 핸들
    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// 한 번의 폴링 패스를 수행합니다.
    ///
    /// glob에 걸린 파일과 이전에 추적하던 파일을 모두 확인하므로,
    /// 사라진 파일도 `missing`으로 드러납니다.
    pub fn ingest_once(&self) -> PassSummary {
        let started = Instant::now();
        let mut paths: Vec<String> = discover_files(&self.target.log_dir, &self.target.include_files)
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        for known in self.status.paths() {
            if !paths.contains(&known) {
                paths.push(known);
            }
        }

        let mut summary = PassSummary {
            files: paths.len(),
            ..Default::default()
        };
        for path in &paths {
            let mut ignored = 0;
            match self.ingest_file(path, &mut ignored) {
                Ok(FileOutcome::Processed(n)) => summary.events += n,
                Ok(FileOutcome::Aborted) => summary.aborted += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.aborted += 1;
                    tracing::error!(path = %path, error = %e, "file pass aborted");
                }
            }
            summary.ignored += ignored;
        }

        metrics::histogram!(m::INGEST_PASS_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        summary
    }

    /// 파일 하나를 처리합니다.
    pub fn ingest_file(&self, path: &str, ignored: &mut usize) -> Result<FileOutcome, LogPipelineError> {
        let now = Utc::now();
        let fs_path = PathBuf::from(path);

        let meta = match std::fs::metadata(&fs_path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(path, error = %e, "file unavailable");
                self.status.set(path, FileStatus::Missing, now);
                return Ok(FileOutcome::Missing);
            }
        };
        let identity = file_identity(&meta);

        let stored = self.store.file_state(path)?;
        let offset = match &stored {
            Some(state) if state.identity != identity => {
                tracing::info!(path, "file identity changed, reading from start");
                0
            }
            Some(state) if meta.len() < state.offset => {
                tracing::info!(path, size = meta.len(), offset = state.offset, "file truncated, reading from start");
                0
            }
            Some(state) => state.offset,
            None => 0,
        };

        let bytes = match read_from(&fs_path, offset) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(path, error = %e, "file read failed");
                self.status.set(path, FileStatus::Missing, now);
                return Ok(FileOutcome::Missing);
            }
        };
        if bytes.is_empty() {
            self.status.set(path, FileStatus::Idle, now);
            return Ok(FileOutcome::Idle);
        }

        let chunk = decode_chunk(bytes);
        let mut processed = 0;
        let mut committed = 0;
        for line in &chunk.lines {
            match self.process_line(path, &line.text, now) {
                Ok(LineStep::Stored) => processed += 1,
                Ok(LineStep::Ignored) => *ignored += 1,
                Err(failure) => {
                    if failure.stored {
                        committed = line.end;
                    }
                    if committed > 0 {
                        self.save_offset(path, offset + committed, &identity, now)?;
                    }
                    tracing::warn!(path, committed, error = %failure.source, "line persistence failed");
                    return Err(failure.source);
                }
            }
            committed = line.end;
        }

        self.save_offset(path, offset + chunk.consumed, &identity, now)?;
        self.status.set(path, FileStatus::Ok, now);
        tracing::debug!(path, lines = processed, bytes = chunk.consumed, legacy = chunk.legacy, "file pass complete");
        Ok(FileOutcome::Processed(processed))
    }

    fn save_offset(
        &self,
        path: &str,
        offset: u64,
        identity: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LogPipelineError> {
        self.store.upsert_file_state(&FileState {
            path: path.to_owned(),
            offset,
            identity: identity.to_owned(),
            updated_at: now,
        })
    }

    /// 라인 하나를 처리합니다.
    ///
    /// 이벤트가 저장된 뒤의 실패(프로파일 저장)는 `stored = true`로 보고되며,
    /// 이 경우에도 이벤트는 발행됩니다.
    fn process_line(&self, path: &str, line: &str, now: DateTime<Utc>) -> Result<LineStep, LineFailure> {
        let device = parser::pre_scan_device(line);
        let outcome = self.rules.apply(
            line,
            RuleContext {
                file_path: path,
                device,
            },
        );

        if outcome.is_ignored() {
            metrics::counter!(m::INGEST_LINES_IGNORED_TOTAL).increment(1);
            return Ok(LineStep::Ignored);
        }

        let record = if outcome.kind_override == Some(RecordKind::Header) {
            ParsedRecord::header(&outcome.line)
        } else {
            parser::parse_line(&outcome.line, &outcome.overrides)
        };

        let mut event = record.into_event(path, outcome.applied, now);
        event.id = self.store.insert_event(&event).map_err(|source| LineFailure {
            stored: false,
            source,
        })?;

        metrics::counter!(m::INGEST_LINES_TOTAL).increment(1);
        if let Some(code) = event.parse_error {
            metrics::counter!(m::INGEST_PARSE_FAILURES_TOTAL, m::LABEL_ERROR_CODE => code.as_str())
                .increment(1);
        }

        let mut profiled = Ok(());
        if event.parse_ok && !event.values.is_empty() {
            if let Some(grp) = event.grp {
                profiled = self
                    .profiler
                    .record(event.device_id.as_deref(), grp, &event.values)
                    .map(|_| ());
            }
        }

        self.broadcast.publish(event);
        profiled.map_err(|source| LineFailure {
            stored: true,
            source,
        })?;
        Ok(LineStep::Stored)
    }
}

/// 라인 하나의 처리 결과
enum LineStep {
    Stored,
    Ignored,
}

/// 라인 처리 실패
struct LineFailure {
    /// 실패 전에 이벤트가 저장되었는지
    stored: bool,
    source: LogPipelineError,
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use fieldtail_core::types::NumericValue;

    use super::*;
    use crate::rule::{RuleAction, RuleDraft, RuleScope};
    use crate::store::SqliteStore;

    struct Harness {
        dir: tempfile::TempDir,
        store: Arc<SqliteStore>,
        broadcast: Arc<EventBroadcast>,
        ingest: IngestLoop,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let rules = Arc::new(RuleEngine::new(store.clone(), Duration::ZERO));
        let profiler = Arc::new(Profiler::new(store.clone()));
        let broadcast = Arc::new(EventBroadcast::new(100));
        let ingest = IngestLoop::new(
            IngestTarget {
                log_dir: dir.path().to_path_buf(),
                include_files: vec!["*.log".to_owned()],
            },
            store.clone(),
            rules,
            profiler,
            broadcast.clone(),
            StatusBoard::new(),
        );
        Harness {
            dir,
            store,
            broadcast,
            ingest,
        }
    }

    fn append(path: &std::path::Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn path_str(path: &std::path::Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn reads_only_new_bytes() {
        let h = harness();
        let log = h.dir.path().join("a.log");
        append(&log, "DEV_A;1;2;3;4;-1; 419\n");

        let first = h.ingest.ingest_once();
        assert_eq!(first.events, 1);
        let event = &h.store.recent_events(10).unwrap()[0];
        assert_eq!(event.device_id.as_deref(), Some("DEV_A"));
        assert_eq!(event.value_count, 4);
        assert!(event.has_negative);

        let second = h.ingest.ingest_once();
        assert_eq!(second.events, 0);
        assert_eq!(
            h.ingest.status().get(&path_str(&log)).unwrap().status,
            FileStatus::Idle
        );

        append(&log, "DEV_B\t2\t3\t9\t8");
        assert_eq!(h.ingest.ingest_once().events, 1);
        let state = h.store.file_state(&path_str(&log)).unwrap().unwrap();
        assert_eq!(state.offset, std::fs::metadata(&log).unwrap().len());
    }

    #[test]
    fn ignored_lines_are_not_persisted() {
        let h = harness();
        h.store
            .insert_rule(
                &RuleDraft::new(RuleAction::IgnoreLineRegex, Some("^noise")),
                Utc::now(),
            )
            .unwrap();
        append(&h.dir.path().join("a.log"), "noise 1 2 3\nDEV;1;2;3\n");

        let summary = h.ingest.ingest_once();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.ignored, 1);
        assert_eq!(h.broadcast.len(), 1);
    }

    #[test]
    fn force_header_skips_parser() {
        let h = harness();
        let rule = h
            .store
            .insert_rule(
                &RuleDraft::new(RuleAction::ForceHeaderRegex, Some("^SEQ")),
                Utc::now(),
            )
            .unwrap();
        append(&h.dir.path().join("a.log"), "SEQ;GRP;V1;V2\n");
        h.ingest.ingest_once();

        let event = &h.store.recent_events(1).unwrap()[0];
        assert_eq!(event.record_kind, RecordKind::Header);
        assert!(event.parse_ok);
        assert_eq!(event.rule_ids, vec![rule.id]);
    }

    #[test]
    fn device_scoped_rule_uses_pre_scanned_device() {
        let h = harness();
        let mut draft = RuleDraft::new(RuleAction::CoerceNumeric, None);
        draft.scope = RuleScope::Device("DEV_A".to_owned());
        h.store.insert_rule(&draft, Utc::now()).unwrap();
        append(&h.dir.path().join("a.log"), "DEV_A;1;2;3\nDEV_B;1;2;3\n");
        h.ingest.ingest_once();

        let events = h.store.recent_events(10).unwrap();
        let dev_b = &events[0];
        let dev_a = &events[1];
        assert_eq!(dev_a.values, vec![NumericValue::Float(3.0)]);
        assert_eq!(dev_b.values, vec![NumericValue::Int(3)]);
    }

    #[test]
    fn truncated_file_restarts_from_zero() {
        let h = harness();
        let log = h.dir.path().join("a.log");
        append(&log, "DEV;1;2;3\nDEV;2;2;3\n");
        h.ingest.ingest_once();

        std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&log)
            .unwrap()
            .write_all(b"DEV;9;2;3\n")
            .unwrap();
        assert_eq!(h.ingest.ingest_once().events, 1);
        assert_eq!(h.store.recent_events(1).unwrap()[0].seq, Some(9));
    }

    #[cfg(unix)]
    #[test]
    fn rotated_file_restarts_from_zero() {
        let h = harness();
        let log = h.dir.path().join("a.log");
        append(&log, "DEV;1;2;3\nDEV;2;2;3\nDEV;3;2;3\n");
        h.ingest.ingest_once();

        let fresh = h.dir.path().join("a.tmp");
        std::fs::write(&fresh, "DEV;1;5;3\nDEV;2;5;3\nDEV;3;5;3\nDEV;4;5;3\n").unwrap();
        std::fs::rename(&fresh, &log).unwrap();

        assert_eq!(h.ingest.ingest_once().events, 4);
    }

    #[test]
    fn vanished_file_becomes_missing() {
        let h = harness();
        let log = h.dir.path().join("a.log");
        append(&log, "DEV;1;2;3\n");
        h.ingest.ingest_once();
        std::fs::remove_file(&log).unwrap();

        h.ingest.ingest_once();
        assert_eq!(
            h.ingest.status().get(&path_str(&log)).unwrap().status,
            FileStatus::Missing
        );
    }

    #[test]
    fn store_failure_keeps_offset() {
        let h = harness();
        let log = h.dir.path().join("a.log");
        append(&log, "DEV;1;2;3\n");
        h.store.exec_batch("DROP TABLE events").unwrap();

        let summary = h.ingest.ingest_once();
        assert_eq!(summary.aborted, 1);
        assert!(h.store.file_state(&path_str(&log)).unwrap().is_none());
    }

    #[test]
    fn partial_failure_advances_past_stored_lines() {
        let h = harness();
        let log = h.dir.path().join("a.log");
        append(&log, "DEV;1;2;3\nDEV;2;2;BAD\n");
        h.store
            .exec_batch(
                "CREATE TRIGGER reject_bad BEFORE INSERT ON events \
                 WHEN NEW.raw_line LIKE '%BAD%' \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let first = h.ingest.ingest_once();
        assert_eq!(first.aborted, 1);
        let state = h.store.file_state(&path_str(&log)).unwrap().unwrap();
        assert_eq!(state.offset, "DEV;1;2;3\n".len() as u64);

        h.store.exec_batch("DROP TRIGGER reject_bad").unwrap();
        let second = h.ingest.ingest_once();
        assert_eq!(second.events, 1);

        let mut raws: Vec<String> = h
            .store
            .recent_events(10)
            .unwrap()
            .into_iter()
            .map(|e| e.raw_line)
            .collect();
        raws.sort();
        assert_eq!(raws, vec!["DEV;1;2;3", "DEV;2;2;BAD"]);
        assert_eq!(h.broadcast.len(), 2);
    }

    #[test]
    fn carriage_return_terminates_lines() {
        let h = harness();
        append(&h.dir.path().join("a.log"), "DEV;1;2;3\rDEV;2;2;4\r\nDEV;3;2;5");
        assert_eq!(h.ingest.ingest_once().events, 3);
    }

    #[test]
    fn parse_failures_are_stored() {
        let h = harness();
        append(&h.dir.path().join("a.log"), "DEV;x;2;3\n");
        h.ingest.ingest_once();
        let event = &h.store.recent_events(1).unwrap()[0];
        assert!(!event.parse_ok);
    }
}
