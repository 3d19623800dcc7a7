//! 파이프라인 trait -- 장기 실행 모듈의 생명주기 정의

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::FieldtailError;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 여부
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 시작/정지 가능한 파이프라인
///
/// 데몬 오케스트레이터가 이 trait을 통해 모듈을 구동합니다.
pub trait Pipeline: Send + Sync {
    /// 백그라운드 태스크를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), FieldtailError>> + Send;

    /// 모든 태스크를 정지하고 종료를 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), FieldtailError>> + Send;

    /// 현재 건강 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_serializes_with_reason() {
        let json = serde_json::to_string(&HealthStatus::Degraded("store slow".to_owned())).unwrap();
        assert_eq!(json, r#"{"state":"degraded","reason":"store slow"}"#);
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Unhealthy("x".to_owned()).is_healthy());
        assert!(HealthStatus::Unhealthy("x".to_owned()).is_unhealthy());
        assert!(!HealthStatus::Degraded("x".to_owned()).is_unhealthy());
    }
}
