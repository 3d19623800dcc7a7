//! fieldtail 공통 크레이트
//!
//! 모든 크레이트가 공유하는 설정, 에러, 도메인 타입, 파이프라인 trait,
//! 메트릭 이름을 제공합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, FieldtailError, PipelineError, StorageError};

// 설정
pub use config::FieldtailConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};

// 도메인 타입
pub use types::{
    AlertStatus, Event, FileStatus, NumericValue, ParseErrorCode, RecordKind, Severity,
};
