//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `fieldtail_`
//! - 모듈명: `ingest_`, `profiler_`, `alerts_`, `broadcast_`, `rules_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(fieldtail_core::metrics::INGEST_LINES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 정책 이름 레이블 키
pub const LABEL_POLICY: &str = "policy";

/// 파싱 실패 코드 레이블 키
pub const LABEL_ERROR_CODE: &str = "code";

// ─── Ingest 메트릭 ────────────────────────────────────────────────

/// Ingest: 처리된 라인 수 (counter)
pub const INGEST_LINES_TOTAL: &str = "fieldtail_ingest_lines_total";

/// Ingest: 파싱 실패 라인 수 (counter, label: code)
pub const INGEST_PARSE_FAILURES_TOTAL: &str = "fieldtail_ingest_parse_failures_total";

/// Ingest: 규칙으로 무시된 라인 수 (counter)
pub const INGEST_LINES_IGNORED_TOTAL: &str = "fieldtail_ingest_lines_ignored_total";

/// Ingest: 한 번의 폴링 패스 소요 시간 (histogram, 초)
pub const INGEST_PASS_DURATION_SECONDS: &str = "fieldtail_ingest_pass_duration_seconds";

// ─── Profiler / Rules 메트릭 ───────────────────────────────────────

/// Profiler: 통계 플러시 수 (counter)
pub const PROFILER_FLUSHES_TOTAL: &str = "fieldtail_profiler_flushes_total";

/// Rules: 캐시에 로드된 활성 규칙 수 (gauge)
pub const RULES_LOADED: &str = "fieldtail_rules_loaded";

// ─── Alert 메트릭 ─────────────────────────────────────────────────

/// Alerts: 전송 시도된 알림 수 (counter, label: policy)
pub const ALERTS_DISPATCHED_TOTAL: &str = "fieldtail_alerts_dispatched_total";

/// Alerts: 쿨다운으로 억제된 알림 수 (counter, label: policy)
pub const ALERTS_SUPPRESSED_TOTAL: &str = "fieldtail_alerts_suppressed_total";

/// Alerts: 전송 실패한 알림 수 (counter, label: policy)
pub const ALERTS_FAILED_TOTAL: &str = "fieldtail_alerts_failed_total";

// ─── Broadcast 메트릭 ─────────────────────────────────────────────

/// Broadcast: 용량 초과로 버려진 이벤트 수 (counter)
pub const BROADCAST_DROPPED_TOTAL: &str = "fieldtail_broadcast_dropped_total";

/// Broadcast: 현재 구독자 수 (gauge)
pub const BROADCAST_SUBSCRIBERS: &str = "fieldtail_broadcast_subscribers";

// ─── Daemon 메트릭 ────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "fieldtail_daemon_uptime_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 폴링 패스 소요 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 10s 범위, 파일 I/O와 저장소 쓰기 포함
pub const PASS_DURATION_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

/// 등록된 모든 메트릭 이름
pub const ALL_METRIC_NAMES: &[&str] = &[
    INGEST_LINES_TOTAL,
    INGEST_PARSE_FAILURES_TOTAL,
    INGEST_LINES_IGNORED_TOTAL,
    INGEST_PASS_DURATION_SECONDS,
    PROFILER_FLUSHES_TOTAL,
    RULES_LOADED,
    ALERTS_DISPATCHED_TOTAL,
    ALERTS_SUPPRESSED_TOTAL,
    ALERTS_FAILED_TOTAL,
    BROADCAST_DROPPED_TOTAL,
    BROADCAST_SUBSCRIBERS,
    DAEMON_UPTIME_SECONDS,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `fieldtail-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Ingest
    describe_counter!(
        INGEST_LINES_TOTAL,
        "Total number of log lines read from tailed files"
    );
    describe_counter!(
        INGEST_PARSE_FAILURES_TOTAL,
        "Lines stored with a parse error, by error code"
    );
    describe_counter!(
        INGEST_LINES_IGNORED_TOTAL,
        "Lines dropped by an IGNORE rule before parsing"
    );
    describe_histogram!(
        INGEST_PASS_DURATION_SECONDS,
        "Duration of one ingestion pass over all tracked files"
    );

    // Profiler / Rules
    describe_counter!(
        PROFILER_FLUSHES_TOTAL,
        "Number of per-device/group profile recomputations"
    );
    describe_gauge!(RULES_LOADED, "Enabled ACTIVE rules in the rule cache");

    // Alerts
    describe_counter!(
        ALERTS_DISPATCHED_TOTAL,
        "Alerts created and handed to the notifier, by policy"
    );
    describe_counter!(
        ALERTS_SUPPRESSED_TOTAL,
        "Alerts suppressed by the dedup cooldown, by policy"
    );
    describe_counter!(
        ALERTS_FAILED_TOTAL,
        "Alerts whose webhook delivery failed, by policy"
    );

    // Broadcast
    describe_counter!(
        BROADCAST_DROPPED_TOTAL,
        "Events evicted from the broadcast history because it was full"
    );
    describe_gauge!(BROADCAST_SUBSCRIBERS, "Currently attached live subscribers");

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
}
