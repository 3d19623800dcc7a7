//! fieldtail 로그 파이프라인
//!
//! 장비 로그 파일을 폴링으로 따라가며 라인 단위로 규칙을 적용하고,
//! 파싱한 이벤트를 저장/프로파일링/실시간 발행하며, 정책에 따라
//! 채팅 웹훅 알림을 보냅니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: 파일 탐색, 증분 읽기, 인코딩 폴백, 파일 상태 보드
//! - [`ingest`]: 파일별 폴링 패스 (읽기 -> 규칙 -> 파싱 -> 저장 -> 발행)
//! - [`rule`]: 저장소 기반 파싱 규칙 캐시와 매처
//! - [`parser`]: 구분자 감지, 장비/seq/grp 추출, 값 요약
//! - [`profiler`]: (장비, 그룹)별 값 통계 배치 계산
//! - [`broadcast`]: 최근 이벤트 링 버퍼와 구독자 팬아웃
//! - [`alert`]: 정책 평가, 쿨다운, 웹훅 전송과 재시도
//! - [`notify`]: 웹훅 전송 trait과 구현
//! - [`store`]: 영속화 trait과 SQLite 구현
//! - [`admin`]: 규칙/라벨/알림 관리 작업과 감사 로그
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! files -> IngestLoop -> RuleEngine -> Parser -> Store -> Profiler
//!                                                  |
//!                                                  +--> EventBroadcast -> subscribers
//!
//! AlertEngine (tick) -> policies -> Dispatcher -> Notifier (webhook)
//! ```

pub mod admin;
pub mod alert;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod profiler;
pub mod store;

pub mod collector;
pub mod parser;
pub mod rule;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 관리 작업
pub use admin::{AdminService, Bundle, Preview};

// 규칙 엔진
pub use rule::{Rule, RuleAction, RuleDraft, RuleEngine, RuleMode, RuleScope};

// 파서
pub use parser::{ParsedRecord, parse_line};

// 수집
pub use collector::StatusBoard;
pub use ingest::{IngestLoop, IngestTarget};

// 알림
pub use alert::{AlertEngine, AlertPolicy};
pub use notify::{Notifier, NotifyOutcome, WebhookNotifier};

// 저장소
pub use store::{SqliteStore, Store};

// 브로드캐스트
pub use broadcast::{EventBroadcast, EventStream};
