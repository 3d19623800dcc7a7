//! 관리 작업 -- 규칙/라벨 변경, 알림 확인, 미리보기, 번들 입출력
//!
//! [`AdminService`]는 외부 표면(CLI 등)이 호출하는 관리 작업을 모읍니다.
//! 모든 변경 작업은 감사 로그에 (actor, action, detail)로 기록되고,
//! 규칙 변경은 즉시 규칙 캐시를 무효화합니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use fieldtail_core::types::{Event, RecordKind};

use crate::collector::{FileStatusEntry, StatusBoard};
use crate::error::LogPipelineError;
use crate::parser::{self, ParsedRecord};
use crate::rule::{Rule, RuleContext, RuleDraft, RuleEngine};
use crate::store::{AlertRecord, AuditEntry, Store, ValueLabel, ValueProfile};

/// 기본 최근 이벤트 조회 개수
pub const DEFAULT_EVENT_LIMIT: usize = 200;
/// 기본 알림 조회 개수
pub const DEFAULT_ALERT_LIMIT: usize = 50;

/// 감사 로그 action 이름
pub mod audit_action {
    pub const RULE_CREATE: &str = "RULE_CREATE";
    pub const RULE_UPDATE: &str = "RULE_UPDATE";
    pub const RULE_DELETE: &str = "RULE_DELETE";
    pub const LABEL_UPSERT: &str = "LABEL_UPSERT";
    pub const ALERT_ACK: &str = "ALERT_ACK";
    pub const BUNDLE_IMPORT: &str = "BUNDLE_IMPORT";
}

/// 규칙과 라벨 번들
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// 규칙 목록
    #[serde(default)]
    pub rules: Vec<RuleDraft>,
    /// 라벨 목록
    #[serde(default)]
    pub labels: Vec<ValueLabel>,
}

/// 번들 가져오기 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// 생성된 규칙 수
    pub rules: usize,
    /// 반영된 라벨 수
    pub labels: usize,
}

/// 라인 미리보기 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    /// IGNORE 규칙으로 버려졌는지
    pub ignored: bool,
    /// 규칙 적용 후 라인
    pub line: String,
    /// 적용된 규칙 ID
    pub applied_rules: Vec<i64>,
    /// 파싱 결과 (버려진 경우 없음)
    pub record: Option<ParsedRecord>,
}

/// 라벨 제안
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelSuggestion {
    /// 값 위치
    pub idx: usize,
    /// 제안 라벨
    pub label: String,
}

/// 관리 작업 서비스
pub struct AdminService {
    store: Arc<dyn Store>,
    rules: Arc<RuleEngine>,
    status: StatusBoard,
}

impl AdminService {
    /// 새 관리 서비스를 생성합니다.
    pub fn new(store: Arc<dyn Store>, rules: Arc<RuleEngine>, status: StatusBoard) -> Self {
        Self {
            store,
            rules,
            status,
        }
    }

    fn audit(&self, actor: &str, action: &str, detail: &str) -> Result<(), LogPipelineError> {
        self.store.append_audit(actor, action, detail, Utc::now())?;
        tracing::info!(actor = %actor, action = %action, detail = %detail, "admin mutation");
        Ok(())
    }

    // --- 규칙 ---

    /// 전체 규칙을 (priority, id) 순서로 조회합니다.
    pub fn list_rules(&self) -> Result<Vec<Rule>, LogPipelineError> {
        self.store.list_rules()
    }

    /// 규칙을 생성합니다.
    pub fn create_rule(&self, actor: &str, draft: &RuleDraft) -> Result<Rule, LogPipelineError> {
        draft.validate("new")?;
        let rule = self.store.insert_rule(draft, Utc::now())?;
        self.audit(actor, audit_action::RULE_CREATE, &rule_audit_detail(&rule))?;
        self.rules.invalidate();
        Ok(rule)
    }

    /// 규칙을 수정합니다.
    pub fn update_rule(
        &self,
        actor: &str,
        id: i64,
        draft: &RuleDraft,
    ) -> Result<Rule, LogPipelineError> {
        draft.validate(&id.to_string())?;
        let rule = self
            .store
            .update_rule(id, draft, Utc::now())?
            .ok_or(LogPipelineError::RuleNotFound(id))?;
        self.audit(
            actor,
            audit_action::RULE_UPDATE,
            &format!("id={id} type={}", rule.action.type_name()),
        )?;
        self.rules.invalidate();
        Ok(rule)
    }

    /// 규칙을 삭제합니다.
    pub fn delete_rule(&self, actor: &str, id: i64) -> Result<(), LogPipelineError> {
        if !self.store.delete_rule(id)? {
            return Err(LogPipelineError::RuleNotFound(id));
        }
        self.audit(actor, audit_action::RULE_DELETE, &format!("id={id}"))?;
        self.rules.invalidate();
        Ok(())
    }

    // --- 라벨 ---

    /// 전체 라벨을 조회합니다.
    pub fn list_labels(&self) -> Result<Vec<ValueLabel>, LogPipelineError> {
        self.store.list_labels()
    }

    /// 라벨을 생성하거나 갱신합니다.
    pub fn set_label(&self, actor: &str, label: &ValueLabel) -> Result<(), LogPipelineError> {
        validate_label(label)?;
        self.store.upsert_label(label, Utc::now())?;
        self.audit(actor, audit_action::LABEL_UPSERT, &label_audit_detail(label))
    }

    /// 프로파일의 대표 값 개수로 라벨을 제안합니다.
    ///
    /// 프로파일이 없으면 빈 목록을 반환합니다.
    pub fn suggest_labels(
        &self,
        device: &str,
        grp: i64,
    ) -> Result<Vec<LabelSuggestion>, LogPipelineError> {
        let Some(profile) = self.store.get_profile(device, grp)? else {
            return Ok(Vec::new());
        };
        Ok(suggestions(profile.typical_value_count))
    }

    // --- 알림 ---

    /// 최근 알림을 최신순으로 조회합니다.
    pub fn list_alerts(&self, limit: Option<usize>) -> Result<Vec<AlertRecord>, LogPipelineError> {
        self.store
            .list_alerts(limit.unwrap_or(DEFAULT_ALERT_LIMIT))
    }

    /// 알림을 확인(ACK) 처리합니다.
    pub fn ack_alert(&self, actor: &str, id: i64) -> Result<(), LogPipelineError> {
        if !self.store.ack_alert(id)? {
            return Err(LogPipelineError::AlertNotFound(id));
        }
        self.audit(actor, audit_action::ALERT_ACK, &format!("id={id}"))
    }

    // --- 조회 ---

    /// 최근 이벤트를 조회합니다.
    pub fn recent_events(&self, limit: Option<usize>) -> Result<Vec<Event>, LogPipelineError> {
        self.store
            .recent_events(limit.unwrap_or(DEFAULT_EVENT_LIMIT))
    }

    /// 파일 상태 스냅샷
    pub fn file_status(&self) -> BTreeMap<String, FileStatusEntry> {
        self.status.snapshot()
    }

    /// 값 프로파일 목록
    pub fn profiles(&self) -> Result<Vec<ValueProfile>, LogPipelineError> {
        self.store.list_profiles()
    }

    /// 최근 감사 로그
    pub fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, LogPipelineError> {
        self.store.recent_audit(limit)
    }

    // --- 미리보기 ---

    /// 라인 하나를 규칙과 파서에 통과시킵니다. 아무것도 저장하지 않습니다.
    ///
    /// `include_drafts`이면 DRAFT 모드 규칙도 함께 적용합니다.
    pub fn preview(
        &self,
        line: &str,
        file_path: &str,
        include_drafts: bool,
    ) -> Result<Preview, LogPipelineError> {
        let ctx = RuleContext {
            file_path,
            device: parser::pre_scan_device(line),
        };
        let outcome = if include_drafts {
            self.rules.preview_matcher(true)?.apply(line, ctx)
        } else {
            self.rules.apply(line, ctx)
        };

        let record = if outcome.is_ignored() {
            None
        } else if outcome.kind_override == Some(RecordKind::Header) {
            Some(ParsedRecord::header(&outcome.line))
        } else {
            Some(parser::parse_line(&outcome.line, &outcome.overrides))
        };

        Ok(Preview {
            ignored: outcome.is_ignored(),
            line: outcome.line,
            applied_rules: outcome.applied,
            record,
        })
    }

    // --- 번들 ---

    /// 전체 규칙과 라벨을 번들로 내보냅니다.
    pub fn export_bundle(&self) -> Result<Bundle, LogPipelineError> {
        let rules = self
            .store
            .list_rules()?
            .iter()
            .map(Rule::to_draft)
            .collect();
        Ok(Bundle {
            rules,
            labels: self.store.list_labels()?,
        })
    }

    /// 번들을 가져옵니다.
    ///
    /// 모든 규칙과 라벨을 먼저 검증한 뒤 하나의 트랜잭션으로 반영하므로,
    /// 검증이나 저장 중 하나라도 실패하면 아무것도 반영하지 않습니다.
    /// 규칙은 새 ID로 생성됩니다.
    pub fn import_bundle(
        &self,
        actor: &str,
        bundle: &Bundle,
    ) -> Result<ImportReport, LogPipelineError> {
        for (i, draft) in bundle.rules.iter().enumerate() {
            draft
                .validate(&format!("import#{i}"))
                .map_err(|e| LogPipelineError::Import(e.to_string()))?;
        }
        for label in &bundle.labels {
            validate_label(label).map_err(|e| LogPipelineError::Import(e.to_string()))?;
        }

        let created = self
            .store
            .import_bundle(actor, &bundle.rules, &bundle.labels, Utc::now())?;
        let report = ImportReport {
            rules: created.len(),
            labels: bundle.labels.len(),
        };
        tracing::info!(
            actor = %actor,
            rules = report.rules,
            labels = report.labels,
            "bundle imported"
        );
        self.rules.invalidate();
        Ok(report)
    }
}

/// 규칙 생성 감사 로그 내용
pub(crate) fn rule_audit_detail(rule: &Rule) -> String {
    format!("id={} type={}", rule.id, rule.action.type_name())
}

/// 라벨 upsert 감사 로그 내용
pub(crate) fn label_audit_detail(label: &ValueLabel) -> String {
    format!(
        "device={} grp={} idx={} label={}",
        label.device, label.grp, label.idx, label.label
    )
}

fn validate_label(label: &ValueLabel) -> Result<(), LogPipelineError> {
    let field = if label.device.is_empty() {
        "device"
    } else if label.label.trim().is_empty() {
        "label"
    } else {
        return Ok(());
    };
    Err(LogPipelineError::Config {
        field: field.to_owned(),
        reason: "must not be empty".to_owned(),
    })
}

/// `0..count` 위치에 대한 기본 라벨 (0번은 `flag_0`)
pub fn suggestions(count: usize) -> Vec<LabelSuggestion> {
    (0..count)
        .map(|idx| LabelSuggestion {
            idx,
            label: if idx == 0 {
                "flag_0".to_owned()
            } else {
                format!("v{idx}")
            },
        })
        .collect()
}
