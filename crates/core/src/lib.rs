//! tint 공통 크레이트
//!
//! 모든 tint 크레이트가 공유하는 에러, 설정, 도메인 타입, 실행 이벤트를 정의합니다.

pub mod config;
pub mod error;
pub mod event;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ExecutionError, PlanError, TintError};

// 설정
pub use config::TintConfig;

// 이벤트
pub use event::RunEvent;

// 도메인 타입
pub use types::{DiffKind, DiffLine, Phase, ProvisionStep, StepKey, StepResult, UnitId};
