//! SQLite 저장소 구현
//!
//! 하나의 [`rusqlite::Connection`]을 `Mutex`로 감싸 모든 쓰기를 직렬화합니다.
//! 시각은 UTC epoch 밀리초 정수로, 값 목록과 규칙 ID 목록은 JSON 텍스트로 저장합니다.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use fieldtail_core::types::{AlertStatus, Event, NumericValue, ParseErrorCode, RecordKind, Severity};

use super::{
    AlertRecord, AuditEntry, FileState, IndexStats, NewAlert, PurgeReport, Store, ValueLabel,
    ValueProfile, WindowStats,
};
use crate::admin::{audit_action, label_audit_detail, rule_audit_detail};
use crate::alert::policy::{AlertPolicy, PolicyThreshold};
use crate::error::LogPipelineError;
use crate::rule::types::{Rule, RuleAction, RuleDraft, RuleMode, RuleScope};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    raw_line TEXT NOT NULL,
    record_kind TEXT NOT NULL,
    parse_ok INTEGER NOT NULL,
    parse_error TEXT,
    device_id TEXT,
    seq INTEGER,
    grp INTEGER,
    values_json TEXT NOT NULL DEFAULT '[]',
    value_count INTEGER NOT NULL DEFAULT 0,
    min_val REAL,
    max_val REAL,
    mean_val REAL,
    has_negative INTEGER NOT NULL DEFAULT 0,
    rule_ids_json TEXT NOT NULL DEFAULT '[]',
    rule_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at);

CREATE TABLE IF NOT EXISTS file_state (
    path TEXT PRIMARY KEY,
    offset INTEGER NOT NULL,
    identity TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS parse_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    enabled INTEGER NOT NULL DEFAULT 1,
    priority INTEGER NOT NULL DEFAULT 100,
    mode TEXT NOT NULL DEFAULT 'ACTIVE',
    scope_type TEXT NOT NULL DEFAULT 'GLOBAL',
    scope_value TEXT,
    rule_type TEXT NOT NULL,
    pattern TEXT,
    action_json TEXT,
    note TEXT NOT NULL DEFAULT '',
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS value_labels (
    device TEXT NOT NULL,
    grp INTEGER NOT NULL,
    idx INTEGER NOT NULL,
    label TEXT NOT NULL,
    unit TEXT,
    note TEXT,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (device, grp, idx)
);

CREATE TABLE IF NOT EXISTS value_profile (
    device TEXT NOT NULL,
    grp INTEGER NOT NULL,
    typical_value_count INTEGER NOT NULL,
    sample_count INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (device, grp)
);

CREATE TABLE IF NOT EXISTS value_profile_index (
    device TEXT NOT NULL,
    grp INTEGER NOT NULL,
    idx INTEGER NOT NULL,
    min_val REAL NOT NULL,
    max_val REAL NOT NULL,
    mean_val REAL NOT NULL,
    std_val REAL NOT NULL,
    unique_count INTEGER NOT NULL,
    is_binary INTEGER NOT NULL,
    is_constant INTEGER NOT NULL,
    negative_rate REAL NOT NULL,
    PRIMARY KEY (device, grp, idx)
);

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at INTEGER NOT NULL,
    actor TEXT NOT NULL,
    action TEXT NOT NULL,
    detail TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_created_at ON audit_log(created_at);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at INTEGER NOT NULL,
    policy TEXT NOT NULL,
    severity TEXT NOT NULL,
    status TEXT NOT NULL,
    dedup_key TEXT NOT NULL,
    summary TEXT NOT NULL,
    detail_json TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_alerts_dedup ON alerts(dedup_key, created_at);
CREATE INDEX IF NOT EXISTS idx_alerts_created_at ON alerts(created_at);

CREATE TABLE IF NOT EXISTS alert_policies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    threshold_json TEXT NOT NULL DEFAULT '{}',
    cooldown_sec INTEGER,
    severity TEXT NOT NULL
);
";

const EVENT_COLUMNS: &str = "id, created_at, file_path, raw_line, record_kind, parse_ok, \
     parse_error, device_id, seq, grp, values_json, value_count, min_val, max_val, mean_val, \
     has_negative, rule_ids_json";

const RULE_COLUMNS: &str = "id, enabled, priority, mode, scope_type, scope_value, rule_type, \
     pattern, action_json, note, updated_at";

const ALERT_COLUMNS: &str =
    "id, created_at, policy, severity, status, dedup_key, summary, detail_json";

/// SQLite 저장소
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// 파일 데이터베이스를 열고 스키마를 준비합니다.
    ///
    /// 상위 디렉토리가 없으면 생성합니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogPipelineError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn)
    }

    /// 메모리 데이터베이스를 엽니다 (테스트, 미리보기용).
    pub fn open_in_memory() -> Result<Self, LogPipelineError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, LogPipelineError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 임의 SQL 실행 (장애 주입 테스트용)
    #[cfg(test)]
    pub(crate) fn exec_batch(&self, sql: &str) -> Result<(), LogPipelineError> {
        self.conn().execute_batch(sql)?;
        Ok(())
    }
}

// --- 트랜잭션 공용 쓰기 ---

fn insert_rule_on(
    conn: &Connection,
    draft: &RuleDraft,
    now: DateTime<Utc>,
) -> Result<Rule, LogPipelineError> {
    let (scope_type, scope_value) = draft.scope.to_parts();
    let action_json = serde_json::to_string(&draft.action.payload_json())?;
    conn.execute(
        "INSERT INTO parse_rules (enabled, priority, mode, scope_type, scope_value, \
         rule_type, pattern, action_json, note, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            draft.enabled,
            draft.priority,
            draft.mode.as_str(),
            scope_type,
            scope_value,
            draft.action.type_name(),
            draft.pattern,
            action_json,
            draft.note,
            to_millis(now),
        ],
    )?;
    Ok(Rule::from_draft(conn.last_insert_rowid(), draft.clone(), now))
}

fn upsert_label_on(
    conn: &Connection,
    label: &ValueLabel,
    now: DateTime<Utc>,
) -> Result<(), LogPipelineError> {
    conn.execute(
        "INSERT INTO value_labels (device, grp, idx, label, unit, note, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT(device, grp, idx) DO UPDATE SET label = excluded.label, \
         unit = excluded.unit, note = excluded.note, updated_at = excluded.updated_at",
        params![
            label.device,
            label.grp,
            as_i64(label.idx),
            label.label,
            label.unit,
            label.note,
            to_millis(now),
        ],
    )?;
    Ok(())
}

fn append_audit_on(
    conn: &Connection,
    actor: &str,
    action: &str,
    detail: &str,
    now: DateTime<Utc>,
) -> Result<(), LogPipelineError> {
    conn.execute(
        "INSERT INTO audit_log (created_at, actor, action, detail) VALUES (?1, ?2, ?3, ?4)",
        params![to_millis(now), actor, action, detail],
    )?;
    Ok(())
}

// --- 변환 헬퍼 ---

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn conversion_err(idx: usize, reason: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, reason.into().into())
}

fn from_millis(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| conversion_err(idx, format!("timestamp out of range: {ms}")))
}

fn parse_col<T: std::str::FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn json_col<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e.to_string()))
}

fn usize_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    let raw: i64 = row.get(idx)?;
    usize::try_from(raw).map_err(|e| conversion_err(idx, e.to_string()))
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let parse_error: Option<String> = row.get(6)?;
    let parse_error = parse_error
        .map(|code| code.parse::<ParseErrorCode>())
        .transpose()
        .map_err(|e| conversion_err(6, e))?;
    let values: Vec<NumericValue> = json_col(row, 10)?;
    Ok(Event {
        id: row.get(0)?,
        created_at: from_millis(row, 1)?,
        file_path: row.get(2)?,
        raw_line: row.get(3)?,
        record_kind: parse_col::<RecordKind>(row, 4)?,
        parse_ok: row.get(5)?,
        parse_error,
        device_id: row.get(7)?,
        seq: row.get(8)?,
        grp: row.get(9)?,
        values,
        value_count: usize_col(row, 11)?,
        min_val: row.get(12)?,
        max_val: row.get(13)?,
        mean_val: row.get(14)?,
        has_negative: row.get(15)?,
        rule_ids: json_col(row, 16)?,
    })
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<Rule> {
    let mode = match row.get::<_, String>(3)?.as_str() {
        "ACTIVE" => RuleMode::Active,
        "DRAFT" => RuleMode::Draft,
        other => return Err(conversion_err(3, format!("unknown rule mode: {other}"))),
    };
    let scope_kind: String = row.get(4)?;
    let scope = RuleScope::from_parts(&scope_kind, row.get(5)?).map_err(|e| conversion_err(4, e))?;
    let rule_type: String = row.get(6)?;
    let payload: Option<String> = row.get(8)?;
    let payload = match payload {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| conversion_err(8, e.to_string()))?,
        None => serde_json::Value::Null,
    };
    let action =
        RuleAction::from_parts(&rule_type, payload).map_err(|e| conversion_err(6, e.to_string()))?;

    Ok(Rule {
        id: row.get(0)?,
        enabled: row.get(1)?,
        priority: row.get(2)?,
        mode,
        scope,
        pattern: row.get(7)?,
        action,
        note: row.get(9)?,
        updated_at: from_millis(row, 10)?,
    })
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<AlertRecord> {
    Ok(AlertRecord {
        id: row.get(0)?,
        created_at: from_millis(row, 1)?,
        policy: row.get(2)?,
        severity: parse_col::<Severity>(row, 3)?,
        status: parse_col::<AlertStatus>(row, 4)?,
        dedup_key: row.get(5)?,
        summary: row.get(6)?,
        detail: json_col(row, 7)?,
    })
}

fn policy_from_row(row: &Row<'_>) -> rusqlite::Result<AlertPolicy> {
    let threshold: PolicyThreshold = json_col(row, 2)?;
    let cooldown: Option<i64> = row.get(3)?;
    Ok(AlertPolicy {
        name: row.get(0)?,
        enabled: row.get(1)?,
        threshold,
        cooldown_sec: cooldown.and_then(|c| u64::try_from(c).ok()),
        severity: parse_col::<Severity>(row, 4)?,
    })
}

fn index_from_row(row: &Row<'_>) -> rusqlite::Result<IndexStats> {
    Ok(IndexStats {
        idx: usize_col(row, 0)?,
        min: row.get(1)?,
        max: row.get(2)?,
        mean: row.get(3)?,
        std: row.get(4)?,
        unique_count: usize_col(row, 5)?,
        is_binary: row.get(6)?,
        is_constant: row.get(7)?,
        negative_rate: row.get(8)?,
    })
}

fn load_profile_indexes(
    conn: &Connection,
    device: &str,
    grp: i64,
) -> rusqlite::Result<Vec<IndexStats>> {
    let mut stmt = conn.prepare_cached(
        "SELECT idx, min_val, max_val, mean_val, std_val, unique_count, is_binary, \
         is_constant, negative_rate FROM value_profile_index \
         WHERE device = ?1 AND grp = ?2 ORDER BY idx",
    )?;
    let rows = stmt.query_map(params![device, grp], index_from_row)?;
    rows.collect()
}

fn as_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl Store for SqliteStore {
    fn insert_event(&self, event: &Event) -> Result<i64, LogPipelineError> {
        let values_json = serde_json::to_string(&event.values)?;
        let rule_ids_json = serde_json::to_string(&event.rule_ids)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO events (created_at, file_path, raw_line, record_kind, parse_ok, \
             parse_error, device_id, seq, grp, values_json, value_count, min_val, max_val, \
             mean_val, has_negative, rule_ids_json, rule_count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                to_millis(event.created_at),
                event.file_path,
                event.raw_line,
                event.record_kind.as_str(),
                event.parse_ok,
                event.parse_error.map(|c| c.as_str()),
                event.device_id,
                event.seq,
                event.grp,
                values_json,
                as_i64(event.value_count),
                event.min_val,
                event.max_val,
                event.mean_val,
                event.has_negative,
                rule_ids_json,
                as_i64(event.rule_count()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, LogPipelineError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![as_i64(limit)], event_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn event_window_stats(&self, since: DateTime<Utc>) -> Result<WindowStats, LogPipelineError> {
        let conn = self.conn();
        let since = to_millis(since);
        let (total, failed): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), SUM(CASE WHEN parse_ok = 0 THEN 1 ELSE 0 END) \
             FROM events WHERE created_at >= ?1",
            params![since],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let mut stmt = conn.prepare_cached(
            "SELECT raw_line FROM events WHERE created_at >= ?1 AND parse_ok = 0 \
             ORDER BY id DESC LIMIT 3",
        )?;
        let samples = stmt
            .query_map(params![since], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(WindowStats {
            total: u64::try_from(total).unwrap_or(0),
            failed: u64::try_from(failed.unwrap_or(0)).unwrap_or(0),
            failed_samples: samples,
        })
    }

    fn file_state(&self, path: &str) -> Result<Option<FileState>, LogPipelineError> {
        let conn = self.conn();
        let state = conn
            .query_row(
                "SELECT path, offset, identity, updated_at FROM file_state WHERE path = ?1",
                params![path],
                |row| {
                    let offset: i64 = row.get(1)?;
                    Ok(FileState {
                        path: row.get(0)?,
                        offset: u64::try_from(offset).map_err(|e| conversion_err(1, e.to_string()))?,
                        identity: row.get(2)?,
                        updated_at: from_millis(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    fn upsert_file_state(&self, state: &FileState) -> Result<(), LogPipelineError> {
        let offset = i64::try_from(state.offset).map_err(|e| LogPipelineError::Store(e.to_string()))?;
        self.conn().execute(
            "INSERT INTO file_state (path, offset, identity, updated_at) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(path) DO UPDATE SET offset = excluded.offset, \
             identity = excluded.identity, updated_at = excluded.updated_at",
            params![state.path, offset, state.identity, to_millis(state.updated_at)],
        )?;
        Ok(())
    }

    fn list_rules(&self) -> Result<Vec<Rule>, LogPipelineError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM parse_rules ORDER BY priority, id"
        ))?;
        let rows = stmt.query_map([], rule_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn active_rules(&self) -> Result<Vec<Rule>, LogPipelineError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM parse_rules \
             WHERE enabled = 1 AND mode = 'ACTIVE' ORDER BY priority, id"
        ))?;
        let rows = stmt.query_map([], rule_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_rule(&self, id: i64) -> Result<Option<Rule>, LogPipelineError> {
        let conn = self.conn();
        let rule = conn
            .query_row(
                &format!("SELECT {RULE_COLUMNS} FROM parse_rules WHERE id = ?1"),
                params![id],
                rule_from_row,
            )
            .optional()?;
        Ok(rule)
    }

    fn insert_rule(&self, draft: &RuleDraft, now: DateTime<Utc>) -> Result<Rule, LogPipelineError> {
        insert_rule_on(&self.conn(), draft, now)
    }

    fn update_rule(
        &self,
        id: i64,
        draft: &RuleDraft,
        now: DateTime<Utc>,
    ) -> Result<Option<Rule>, LogPipelineError> {
        let (scope_type, scope_value) = draft.scope.to_parts();
        let action_json = serde_json::to_string(&draft.action.payload_json())?;
        let changed = self.conn().execute(
            "UPDATE parse_rules SET enabled = ?1, priority = ?2, mode = ?3, scope_type = ?4, \
             scope_value = ?5, rule_type = ?6, pattern = ?7, action_json = ?8, note = ?9, \
             updated_at = ?10 WHERE id = ?11",
            params![
                draft.enabled,
                draft.priority,
                draft.mode.as_str(),
                scope_type,
                scope_value,
                draft.action.type_name(),
                draft.pattern,
                action_json,
                draft.note,
                to_millis(now),
                id,
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(Rule::from_draft(id, draft.clone(), now)))
    }

    fn delete_rule(&self, id: i64) -> Result<bool, LogPipelineError> {
        let changed = self
            .conn()
            .execute("DELETE FROM parse_rules WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn upsert_label(&self, label: &ValueLabel, now: DateTime<Utc>) -> Result<(), LogPipelineError> {
        upsert_label_on(&self.conn(), label, now)
    }

    fn import_bundle(
        &self,
        actor: &str,
        rules: &[RuleDraft],
        labels: &[ValueLabel],
        now: DateTime<Utc>,
    ) -> Result<Vec<Rule>, LogPipelineError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut created = Vec::with_capacity(rules.len());
        for draft in rules {
            let rule = insert_rule_on(&tx, draft, now)?;
            append_audit_on(&tx, actor, audit_action::RULE_CREATE, &rule_audit_detail(&rule), now)?;
            created.push(rule);
        }
        for label in labels {
            upsert_label_on(&tx, label, now)?;
            append_audit_on(&tx, actor, audit_action::LABEL_UPSERT, &label_audit_detail(label), now)?;
        }
        append_audit_on(
            &tx,
            actor,
            audit_action::BUNDLE_IMPORT,
            &format!("rules={} labels={}", created.len(), labels.len()),
            now,
        )?;
        tx.commit()?;
        Ok(created)
    }

    fn list_labels(&self) -> Result<Vec<ValueLabel>, LogPipelineError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT device, grp, idx, label, unit, note, updated_at FROM value_labels \
             ORDER BY device, grp, idx",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ValueLabel {
                device: row.get(0)?,
                grp: row.get(1)?,
                idx: usize_col(row, 2)?,
                label: row.get(3)?,
                unit: row.get(4)?,
                note: row.get(5)?,
                updated_at: Some(from_millis(row, 6)?),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn upsert_profile(&self, profile: &ValueProfile) -> Result<(), LogPipelineError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let updated_at = to_millis(profile.updated_at);
        tx.execute(
            "INSERT INTO value_profile (device, grp, typical_value_count, sample_count, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(device, grp) DO UPDATE SET \
             typical_value_count = excluded.typical_value_count, \
             sample_count = excluded.sample_count, updated_at = excluded.updated_at",
            params![
                profile.device,
                profile.grp,
                as_i64(profile.typical_value_count),
                as_i64(profile.sample_count),
                updated_at,
            ],
        )?;
        tx.execute(
            "DELETE FROM value_profile_index WHERE device = ?1 AND grp = ?2",
            params![profile.device, profile.grp],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO value_profile_index (device, grp, idx, min_val, max_val, mean_val, \
                 std_val, unique_count, is_binary, is_constant, negative_rate) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for stats in &profile.indexes {
                stmt.execute(params![
                    profile.device,
                    profile.grp,
                    as_i64(stats.idx),
                    stats.min,
                    stats.max,
                    stats.mean,
                    stats.std,
                    as_i64(stats.unique_count),
                    stats.is_binary,
                    stats.is_constant,
                    stats.negative_rate,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_profile(&self, device: &str, grp: i64) -> Result<Option<ValueProfile>, LogPipelineError> {
        let conn = self.conn();
        let header = conn
            .query_row(
                "SELECT typical_value_count, sample_count, updated_at FROM value_profile \
                 WHERE device = ?1 AND grp = ?2",
                params![device, grp],
                |row| Ok((usize_col(row, 0)?, usize_col(row, 1)?, from_millis(row, 2)?)),
            )
            .optional()?;
        let Some((typical_value_count, sample_count, updated_at)) = header else {
            return Ok(None);
        };
        let indexes = load_profile_indexes(&conn, device, grp)?;
        Ok(Some(ValueProfile {
            device: device.to_owned(),
            grp,
            typical_value_count,
            sample_count,
            indexes,
            updated_at,
        }))
    }

    fn list_profiles(&self) -> Result<Vec<ValueProfile>, LogPipelineError> {
        let conn = self.conn();
        let headers = {
            let mut stmt = conn.prepare(
                "SELECT device, grp, typical_value_count, sample_count, updated_at \
                 FROM value_profile ORDER BY device, grp",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    usize_col(row, 2)?,
                    usize_col(row, 3)?,
                    from_millis(row, 4)?,
                ))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut profiles = Vec::with_capacity(headers.len());
        for (device, grp, typical_value_count, sample_count, updated_at) in headers {
            let indexes = load_profile_indexes(&conn, &device, grp)?;
            profiles.push(ValueProfile {
                device,
                grp,
                typical_value_count,
                sample_count,
                indexes,
                updated_at,
            });
        }
        Ok(profiles)
    }

    fn append_audit(
        &self,
        actor: &str,
        action: &str,
        detail: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LogPipelineError> {
        append_audit_on(&self.conn(), actor, action, detail, now)
    }

    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, LogPipelineError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, actor, action, detail FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![as_i64(limit)], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                created_at: from_millis(row, 1)?,
                actor: row.get(2)?,
                action: row.get(3)?,
                detail: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn seed_policy(&self, policy: &AlertPolicy) -> Result<bool, LogPipelineError> {
        let threshold = serde_json::to_string(&policy.threshold)?;
        let changed = self.conn().execute(
            "INSERT OR IGNORE INTO alert_policies (name, enabled, threshold_json, cooldown_sec, severity) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                policy.name,
                policy.enabled,
                threshold,
                policy.cooldown_sec.and_then(|c| i64::try_from(c).ok()),
                policy.severity.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn upsert_policy(&self, policy: &AlertPolicy) -> Result<(), LogPipelineError> {
        let threshold = serde_json::to_string(&policy.threshold)?;
        self.conn().execute(
            "INSERT INTO alert_policies (name, enabled, threshold_json, cooldown_sec, severity) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(name) DO UPDATE SET enabled = excluded.enabled, \
             threshold_json = excluded.threshold_json, cooldown_sec = excluded.cooldown_sec, \
             severity = excluded.severity",
            params![
                policy.name,
                policy.enabled,
                threshold,
                policy.cooldown_sec.and_then(|c| i64::try_from(c).ok()),
                policy.severity.as_str(),
            ],
        )?;
        Ok(())
    }

    fn list_policies(&self) -> Result<Vec<AlertPolicy>, LogPipelineError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, enabled, threshold_json, cooldown_sec, severity FROM alert_policies ORDER BY id",
        )?;
        let rows = stmt.query_map([], policy_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn latest_alert_at(&self, dedup_key: &str) -> Result<Option<DateTime<Utc>>, LogPipelineError> {
        let conn = self.conn();
        let latest = conn
            .query_row(
                "SELECT created_at FROM alerts WHERE dedup_key = ?1 \
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![dedup_key],
                |row| from_millis(row, 0),
            )
            .optional()?;
        Ok(latest)
    }

    fn insert_alert(&self, alert: &NewAlert) -> Result<i64, LogPipelineError> {
        let detail = serde_json::to_string(&alert.detail)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO alerts (created_at, policy, severity, status, dedup_key, summary, detail_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                to_millis(alert.created_at),
                alert.policy,
                alert.severity.as_str(),
                alert.status.as_str(),
                alert.dedup_key,
                alert.summary,
                detail,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn resolve_pending_alerts(
        &self,
        dedup_key: &str,
        status: AlertStatus,
    ) -> Result<usize, LogPipelineError> {
        let changed = self.conn().execute(
            "UPDATE alerts SET status = ?1 WHERE dedup_key = ?2 AND status = 'PENDING'",
            params![status.as_str(), dedup_key],
        )?;
        Ok(changed)
    }

    fn list_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, LogPipelineError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![as_i64(limit)], alert_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn ack_alert(&self, id: i64) -> Result<bool, LogPipelineError> {
        let changed = self
            .conn()
            .execute("UPDATE alerts SET status = 'ACK' WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<PurgeReport, LogPipelineError> {
        let cutoff = to_millis(cutoff);
        let conn = self.conn();
        let events = conn.execute("DELETE FROM events WHERE created_at < ?1", params![cutoff])?;
        let alerts = conn.execute("DELETE FROM alerts WHERE created_at < ?1", params![cutoff])?;
        let audit = conn.execute("DELETE FROM audit_log WHERE created_at < ?1", params![cutoff])?;
        Ok(PurgeReport {
            events,
            alerts,
            audit,
        })
    }
}
