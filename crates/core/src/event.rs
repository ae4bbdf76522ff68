//! 실행 이벤트: 오케스트레이터에서 콘솔 출력으로 가는 메시지
//!
//! 러너는 사용자에게 보여줄 진행 상황(페이즈 배너, 쿼리 결과, diff 등)을
//! [`RunEvent`]로 만들어 `mpsc` 채널로 보냅니다. 출력 형식은 수신 측(CLI)이 결정합니다.

use serde::Serialize;

use crate::types::{DiffLine, Phase, UnitId};

/// 러너가 보내는 진행 이벤트
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// 실행 계획 확정
    PlanResolved { units: Vec<UnitId> },

    /// 유닛의 페이즈 시작 (setup 배너는 선행 테스트 목록 포함)
    PhaseStarted {
        unit: UnitId,
        phase: Phase,
        prereqs: Vec<UnitId>,
    },

    /// 테스트 환경 파일 또는 외부에서 주입된 사용자 정의 환경변수
    CustomEnv { name: String, value: String },

    /// provisioner 실행 시작
    ProvisionStarted { unit: UnitId, phase: Phase },

    /// provisioner 실패로 쿼리를 건너뜀
    ProvisionFailed { unit: UnitId, phase: Phase },

    /// 외부 프로세스의 stderr 출력
    ProcessStderr { program: String, text: String },

    /// 쿼리 실행 시작
    QueryStarted {
        unit: UnitId,
        phase: Phase,
        file: String,
    },

    /// 쿼리 결과 (불일치 시 diff 포함)
    QueryFinished {
        unit: UnitId,
        phase: Phase,
        name: String,
        passed: bool,
        diff: Vec<DiffLine>,
    },

    /// 실행 중단 에러로 forward 단계를 멈추고 teardown으로 전환
    Aborted {
        unit: Option<UnitId>,
        phase: Option<Phase>,
        message: String,
    },

    /// teardown 중 무시된 문제
    TeardownWarning { unit: UnitId, message: String },
}

impl RunEvent {
    /// 이벤트가 가리키는 유닛 (있다면)
    pub fn unit(&self) -> Option<&UnitId> {
        match self {
            Self::PhaseStarted { unit, .. }
            | Self::ProvisionStarted { unit, .. }
            | Self::ProvisionFailed { unit, .. }
            | Self::QueryStarted { unit, .. }
            | Self::QueryFinished { unit, .. }
            | Self::TeardownWarning { unit, .. } => Some(unit),
            Self::Aborted { unit, .. } => unit.as_ref(),
            Self::PlanResolved { .. } | Self::CustomEnv { .. } | Self::ProcessStderr { .. } => {
                None
            }
        }
    }
}
