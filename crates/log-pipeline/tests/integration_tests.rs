//! 통합 테스트 -- 파일 수집부터 알림 전송까지의 전체 흐름 검증

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use fieldtail_core::pipeline::Pipeline;
use fieldtail_core::types::{AlertStatus, NumericValue, ParseErrorCode, RecordKind, Severity};
use fieldtail_log_pipeline::alert::policy::FILE_MISSING;
use fieldtail_log_pipeline::alert::{AlertCandidate, DispatchResult, Dispatcher};
use fieldtail_log_pipeline::profiler::Profiler;
use fieldtail_log_pipeline::{
    AdminService, AlertEngine, AlertPolicy, EventBroadcast, IngestLoop, IngestTarget,
    LogPipelineBuilder, Notifier, NotifyOutcome, PipelineConfigBuilder, RuleAction, RuleDraft,
    RuleEngine, RuleScope, SqliteStore, StatusBoard, Store,
};

/// 응답을 순서대로 돌려주고 보낸 페이로드를 기록하는 전송기
#[derive(Default)]
struct RecordingNotifier {
    responses: Mutex<VecDeque<NotifyOutcome>>,
    sent: Mutex<Vec<serde_json::Value>>,
}

impl RecordingNotifier {
    fn with(responses: Vec<NotifyOutcome>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            sent: Mutex::default(),
        }
    }

    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|v| v["text"].as_str().unwrap_or_default().to_owned())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, payload: &serde_json::Value) -> NotifyOutcome {
        self.sent.lock().unwrap().push(payload.clone());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| http(200, None))
    }
}

fn http(code: u16, retry_after: Option<&str>) -> NotifyOutcome {
    let mut outcome = NotifyOutcome {
        ok: (200..300).contains(&code),
        status: Some(code),
        ..Default::default()
    };
    if let Some(v) = retry_after {
        outcome
            .headers
            .insert("retry-after".to_owned(), v.to_owned());
    }
    outcome
}

struct World {
    dir: tempfile::TempDir,
    store: Arc<SqliteStore>,
    status: StatusBoard,
    broadcast: Arc<EventBroadcast>,
    ingest: IngestLoop,
    admin: AdminService,
}

fn world() -> World {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("db/fieldtail.db")).unwrap());
    let logs = dir.path().join("logs");
    std::fs::create_dir(&logs).unwrap();

    let status = StatusBoard::new();
    let rules = Arc::new(RuleEngine::new(store.clone(), Duration::from_secs(3600)));
    let broadcast = Arc::new(EventBroadcast::new(100));
    let ingest = IngestLoop::new(
        IngestTarget {
            log_dir: logs,
            include_files: vec!["*.log".to_owned()],
        },
        store.clone(),
        rules.clone(),
        Arc::new(Profiler::new(store.clone())),
        broadcast.clone(),
        status.clone(),
    );
    let admin = AdminService::new(store.clone(), rules, status.clone());
    World {
        dir,
        store,
        status,
        broadcast,
        ingest,
        admin,
    }
}

impl World {
    fn log_path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join("logs").join(name)
    }

    fn append(&self, name: &str, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(name))
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }
}

fn ints(values: &[i64]) -> Vec<NumericValue> {
    values.iter().copied().map(NumericValue::Int).collect()
}

#[test]
fn semicolon_line_end_to_end() {
    let w = world();
    w.append("dev.log", "DEV_A;1;2;3;4;-1; 419\n");
    let pass = w.ingest.ingest_once();
    assert_eq!(pass.events, 1);

    let event = &w.store.recent_events(1).unwrap()[0];
    assert_eq!(event.record_kind, RecordKind::Data);
    assert!(event.parse_ok);
    assert_eq!(event.device_id.as_deref(), Some("DEV_A"));
    assert_eq!(event.seq, Some(1));
    assert_eq!(event.grp, Some(2));
    assert_eq!(event.values, ints(&[3, 4, -1, 419]));
    assert_eq!(event.value_count, 4);
    assert!(event.has_negative);
}

#[test]
fn tab_line_end_to_end() {
    let w = world();
    w.append("dev.log", "DEV_B\t2\t3\t9\t8\n");
    w.ingest.ingest_once();

    let event = &w.store.recent_events(1).unwrap()[0];
    assert_eq!(event.device_id.as_deref(), Some("DEV_B"));
    assert_eq!(event.value_count, 2);
    assert_eq!(event.values, ints(&[9, 8]));
    assert!(!event.has_negative);
}

#[test]
fn only_new_bytes_are_read() {
    let w = world();
    w.append("dev.log", "DEV_A;1;2;3\n");
    assert_eq!(w.ingest.ingest_once().events, 1);
    assert_eq!(w.ingest.ingest_once().events, 0);

    w.append("dev.log", "DEV_A;2;2;4\nDEV_A;3;2;5\n");
    assert_eq!(w.ingest.ingest_once().events, 2);
    assert_eq!(w.store.recent_events(10).unwrap().len(), 3);
}

#[test]
fn truncated_file_is_reread_from_start() {
    let w = world();
    w.append("dev.log", "DEV_A;1;2;3\nDEV_A;2;2;3\n");
    w.ingest.ingest_once();

    std::fs::write(w.log_path("dev.log"), "DEV_C;1;1;1\n").unwrap();
    assert_eq!(w.ingest.ingest_once().events, 1);
    let latest = &w.store.recent_events(1).unwrap()[0];
    assert_eq!(latest.device_id.as_deref(), Some("DEV_C"));
}

#[test]
fn admin_rules_shape_ingestion() {
    let w = world();
    w.admin
        .create_rule("test", &RuleDraft::new(RuleAction::IgnoreLineRegex, Some("^#")))
        .unwrap();
    w.admin
        .create_rule(
            "test",
            &RuleDraft::new(RuleAction::ForceHeaderRegex, Some("^time;")),
        )
        .unwrap();
    let mut coerce = RuleDraft::new(RuleAction::CoerceNumeric, None);
    coerce.scope = RuleScope::Device("DEV_A".to_owned());
    w.admin.create_rule("test", &coerce).unwrap();

    w.append(
        "dev.log",
        "# generated\ntime;seq;grp;v0\nDEV_A;1;2;3;4\nDEV_B;1;2;3;4\n",
    );
    let pass = w.ingest.ingest_once();
    assert_eq!(pass.events, 3);
    assert_eq!(pass.ignored, 1);

    let mut events = w.store.recent_events(10).unwrap();
    events.reverse();
    assert_eq!(events[0].record_kind, RecordKind::Header);
    assert_eq!(events[1].values, vec![NumericValue::Float(3.0), NumericValue::Float(4.0)]);
    assert_eq!(events[1].rule_count(), 1);
    assert_eq!(events[2].values, ints(&[3, 4]));
}

#[test]
fn parse_failures_are_stored_with_codes() {
    let w = world();
    w.append("dev.log", "boot complete\nDEV_A;x;2;3\n");
    w.ingest.ingest_once();

    let mut events = w.store.recent_events(10).unwrap();
    events.reverse();
    assert_eq!(events[0].parse_error, Some(ParseErrorCode::NotEnoughFields));
    assert_eq!(events[0].record_kind, RecordKind::Unknown);
    assert_eq!(events[1].parse_error, Some(ParseErrorCode::SeqOrGrpInvalid));
    assert!(!events[1].parse_ok);
}

#[test]
fn profile_is_flushed_after_batch() {
    let w = world();
    let lines: String = (0..50).map(|i| format!("DEV_A;{i};7;1;{}\n", i % 3)).collect();
    w.append("dev.log", &lines);
    w.ingest.ingest_once();

    let profile = w.store.get_profile("DEV_A", 7).unwrap().unwrap();
    assert_eq!(profile.typical_value_count, 2);
    assert!(profile.indexes[0].is_constant);

    let suggestions = w.admin.suggest_labels("DEV_A", 7).unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].label, "flag_0");
}

#[test]
fn preview_does_not_touch_storage() {
    let w = world();
    let preview = w
        .admin
        .preview("DEV_A;1;2;3;4;-1; 419", "/data/x.log", false)
        .unwrap();
    assert_eq!(preview.record.unwrap().value_count, 4);
    assert!(w.store.recent_events(1).unwrap().is_empty());
    assert!(w.broadcast.is_empty());
}

#[tokio::test]
async fn subscribers_receive_ingested_events() {
    let w = world();
    let mut stream = w.broadcast.subscribe();
    w.append("dev.log", "DEV_A;1;2;3\n");
    w.ingest.ingest_once();

    let event = stream.next_event().await.unwrap();
    assert_eq!(event.device_id.as_deref(), Some("DEV_A"));
    assert_eq!(w.broadcast.snapshot().len(), 1);
}

#[tokio::test]
async fn parse_fail_rate_raises_one_alert() {
    let w = world();
    w.append("dev.log", "boot\nstill booting\nDEV_A;1;2;3\n");
    w.ingest.ingest_once();

    let notifier = Arc::new(RecordingNotifier::default());
    let engine = AlertEngine::new(w.store.clone(), w.status.clone(), notifier.clone(), 60);
    engine.seed_default_policies().unwrap();

    let first = engine.tick().await;
    assert_eq!(first.sent, 1);
    let second = engine.tick().await;
    assert_eq!(second.sent, 0);
    assert_eq!(second.suppressed, 1);

    let texts = notifier.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("@here [WARN] PARSE_FAIL_RATE"));
    assert!(texts[0].contains("- boot"));

    let alerts = w.store.list_alerts(10).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].status, AlertStatus::Sent);
}

#[tokio::test]
async fn missing_file_raises_critical_alert() {
    let w = world();
    w.append("dev.log", "DEV_A;1;2;3\n");
    w.ingest.ingest_once();
    std::fs::remove_file(w.log_path("dev.log")).unwrap();
    w.ingest.ingest_once();

    let notifier = Arc::new(RecordingNotifier::default());
    let engine = AlertEngine::new(w.store.clone(), w.status.clone(), notifier.clone(), 60);
    engine.seed_default_policies().unwrap();
    engine.tick().await;

    let alerts = w.store.list_alerts(10).unwrap();
    let missing: Vec<_> = alerts.iter().filter(|a| a.policy == FILE_MISSING).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, Severity::Critical);
    assert!(missing[0].dedup_key.ends_with("dev.log"));
    assert!(notifier.texts()[0].starts_with("@channel "));
}

#[tokio::test]
async fn cooldown_suppresses_within_window() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = Dispatcher::new(store.clone(), notifier.clone(), 60);
    let policy = AlertPolicy::new(FILE_MISSING, Severity::Critical, 60);
    let candidate = AlertCandidate::for_file("/data/a.log", "file missing");

    let t0 = Utc::now();
    let at = |secs| t0 + ChronoDuration::seconds(secs);
    assert_eq!(
        dispatcher.dispatch_at(&policy, &candidate, at(0)).await.unwrap(),
        DispatchResult::Sent
    );
    assert_eq!(
        dispatcher.dispatch_at(&policy, &candidate, at(30)).await.unwrap(),
        DispatchResult::Suppressed
    );
    assert_eq!(
        dispatcher.dispatch_at(&policy, &candidate, at(61)).await.unwrap(),
        DispatchResult::Sent
    );
    assert_eq!(store.list_alerts(10).unwrap().len(), 2);
    assert_eq!(notifier.texts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_send_is_retried_once_after_retry_after() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let notifier = Arc::new(RecordingNotifier::with(vec![
        http(429, Some("2")),
        http(429, Some("2")),
        http(200, None),
    ]));
    let dispatcher = Dispatcher::new(store.clone(), notifier.clone(), 60);
    let policy = AlertPolicy::new(FILE_MISSING, Severity::Critical, 60);

    let started = tokio::time::Instant::now();
    let result = dispatcher
        .dispatch(&policy, &AlertCandidate::for_file("/data/a.log", "file missing"))
        .await
        .unwrap();

    assert_eq!(result, DispatchResult::Failed);
    assert_eq!(notifier.texts().len(), 2);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(store.list_alerts(1).unwrap()[0].status, AlertStatus::Failed);
}

#[tokio::test]
async fn pipeline_runs_against_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dev.log"), "DEV_A;1;2;3;4;-1; 419\n").unwrap();

    let store: Arc<dyn Store> =
        Arc::new(SqliteStore::open(&dir.path().join("state/data.db")).unwrap());
    let config = PipelineConfigBuilder::new()
        .log_dir(dir.path())
        .include_files(vec!["*.log".to_owned()])
        .poll_interval_ms(20)
        .eval_interval_secs(1)
        .build()
        .unwrap();
    let mut pipeline = LogPipelineBuilder::new()
        .config(config)
        .store(store.clone())
        .notifier(Arc::new(RecordingNotifier::default()))
        .build()
        .unwrap();

    let mut stream = pipeline.broadcast().subscribe();
    pipeline.start().await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), stream.next_event())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.value_count, 4);
    assert!(pipeline.health_check().await.is_healthy());
    pipeline.stop().await.unwrap();

    assert_eq!(store.list_policies().unwrap().len(), 4);
    assert!(dir.path().join("state/data.db").exists());
}
