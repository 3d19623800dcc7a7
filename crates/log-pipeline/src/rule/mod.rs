//! 파싱 규칙 엔진 -- 저장소 기반 규칙 캐시와 라인 변환
//!
//! 운영자가 관리하는 규칙으로 라인을 버리거나, 헤더로 분류하거나,
//! 치환하거나, 파서 동작을 조정합니다.
//!
//! # 아키텍처
//! - [`RuleEngine`]: 캐시 갱신 및 적용 코디네이터
//! - [`matcher`]: 컴파일된 규칙 스냅샷과 적용 로직
//! - [`types`]: 규칙 데이터 구조 및 검증
//!
//! # 캐시
//! 활성화된 ACTIVE 규칙만 (priority, id) 순서로 캐시합니다.
//! 캐시는 `reload_interval`이 지나면 다음 접근 시 통째로 교체되며,
//! 관리 작업 후에는 [`RuleEngine::invalidate`]로 즉시 무효화됩니다.

pub mod matcher;
pub mod types;

pub use matcher::{ParseOverrides, RuleContext, RuleMatcher, RuleOutcome};
pub use types::{Rule, RuleAction, RuleDraft, RuleMode, RuleScope};

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use fieldtail_core::metrics as m;

use crate::error::LogPipelineError;
use crate::store::Store;

struct Cache {
    matcher: Arc<RuleMatcher>,
    loaded_at: Option<Instant>,
}

/// 규칙 엔진 -- 주기적으로 갱신되는 불변 규칙 스냅샷
///
/// # 사용 예시
/// ```ignore
/// let engine = RuleEngine::new(store.clone(), Duration::from_secs(10));
/// let outcome = engine.apply(line, RuleContext { file_path: &path, device: None });
/// if outcome.is_ignored() {
///     // 라인 버림
/// }
/// ```
pub struct RuleEngine {
    store: Arc<dyn Store>,
    reload_interval: Duration,
    cache: RwLock<Cache>,
}

impl RuleEngine {
    /// 새 규칙 엔진을 생성합니다. 첫 접근 시 규칙을 로드합니다.
    pub fn new(store: Arc<dyn Store>, reload_interval: Duration) -> Self {
        Self {
            store,
            reload_interval,
            cache: RwLock::new(Cache {
                matcher: Arc::new(RuleMatcher::new()),
                loaded_at: None,
            }),
        }
    }

    /// 저장소에서 규칙을 다시 읽어 스냅샷을 교체합니다.
    pub fn reload(&self) -> Result<Arc<RuleMatcher>, LogPipelineError> {
        let rules = self.store.active_rules()?;
        let matcher = Arc::new(RuleMatcher::compile(&rules, false));
        metrics::gauge!(m::RULES_LOADED).set(matcher.len() as f64);
        tracing::debug!(rules = matcher.len(), "rule cache reloaded");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.matcher = Arc::clone(&matcher);
        cache.loaded_at = Some(Instant::now());
        Ok(matcher)
    }

    /// 캐시를 무효화합니다. 다음 접근 시 다시 로드됩니다.
    pub fn invalidate(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.loaded_at = None;
    }

    /// 현재 스냅샷을 반환합니다. 오래되었으면 먼저 갱신합니다.
    ///
    /// 갱신에 실패하면 경고를 남기고 이전 스냅샷을 계속 사용합니다.
    pub fn snapshot(&self) -> Arc<RuleMatcher> {
        let (matcher, fresh) = {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            let fresh = cache
                .loaded_at
                .is_some_and(|at| at.elapsed() <= self.reload_interval);
            (Arc::clone(&cache.matcher), fresh)
        };
        if fresh {
            return matcher;
        }

        match self.reload() {
            Ok(reloaded) => reloaded,
            Err(e) => {
                tracing::warn!(error = %e, "rule reload failed, keeping previous snapshot");
                matcher
            }
        }
    }

    /// 라인에 현재 규칙을 적용합니다.
    pub fn apply(&self, line: &str, ctx: RuleContext<'_>) -> RuleOutcome {
        self.snapshot().apply(line, ctx)
    }

    /// 미리보기용 매처를 캐시와 별도로 만듭니다.
    ///
    /// `include_drafts`이면 DRAFT 모드 규칙도 포함합니다.
    pub fn preview_matcher(&self, include_drafts: bool) -> Result<RuleMatcher, LogPipelineError> {
        let rules = if include_drafts {
            self.store.list_rules()?
        } else {
            self.store.active_rules()?
        };
        Ok(RuleMatcher::compile(&rules, include_drafts))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::SqliteStore;

    fn ctx() -> RuleContext<'static> {
        RuleContext {
            file_path: "/data/a.log",
            device: None,
        }
    }

    fn setup(reload: Duration) -> (Arc<SqliteStore>, RuleEngine) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = RuleEngine::new(store.clone(), reload);
        (store, engine)
    }

    #[test]
    fn first_access_loads_rules() {
        let (store, engine) = setup(Duration::from_secs(60));
        store
            .insert_rule(&RuleDraft::new(RuleAction::IgnoreLineRegex, Some("^#")), Utc::now())
            .unwrap();
        assert!(engine.apply("# x", ctx()).is_ignored());
    }

    #[test]
    fn stale_cache_is_kept_until_invalidated() {
        let (store, engine) = setup(Duration::from_secs(3600));
        assert!(engine.snapshot().is_empty());

        store
            .insert_rule(&RuleDraft::new(RuleAction::CoerceNumeric, None), Utc::now())
            .unwrap();
        assert!(engine.snapshot().is_empty());

        engine.invalidate();
        assert_eq!(engine.snapshot().len(), 1);
    }

    #[test]
    fn zero_interval_reloads_every_access() {
        let (store, engine) = setup(Duration::ZERO);
        engine.snapshot();
        store
            .insert_rule(&RuleDraft::new(RuleAction::CoerceNumeric, None), Utc::now())
            .unwrap();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(engine.snapshot().len(), 1);
    }

    #[test]
    fn preview_matcher_can_include_drafts() {
        let (store, engine) = setup(Duration::from_secs(60));
        let mut draft = RuleDraft::new(RuleAction::CoerceNumeric, None);
        draft.mode = RuleMode::Draft;
        store.insert_rule(&draft, Utc::now()).unwrap();

        assert!(engine.snapshot().is_empty());
        assert!(engine.preview_matcher(false).unwrap().is_empty());
        assert_eq!(engine.preview_matcher(true).unwrap().len(), 1);
    }
}
