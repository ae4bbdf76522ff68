//! 에러 타입: 설정, 계획, 실행 에러
//!
//! 테스트 실행 중 발생하는 실패는 두 종류로 나뉩니다.
//!
//! - **실행 중단 에러**: 이 모듈의 타입들. `?`로 전파되어 forward 단계를 중단시키고,
//!   오케스트레이터가 한 번 잡아서 teardown 단계로 넘어갑니다.
//! - **유닛 실패**: provisioner 비정상 종료, 쿼리 결과 불일치 등. 에러로 전파되지 않고
//!   테스트 유닛의 `failed` 플래그에 기록됩니다.

/// tint 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TintError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 실행 계획(대상 해석, 의존성 그래프) 에러
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    /// 페이즈 실행 에러
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 실행 계획 에러
///
/// 대상 디렉토리 열거 또는 선행 테스트 해석 중 발생합니다.
/// 부분 결과 없이 실행 전체가 중단됩니다.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// 대상 최상위 디렉토리가 존재하지 않음
    #[error("target directory not found: {path}")]
    DirectoryNotFound { path: String },

    /// 디렉토리 열거 실패
    #[error("failed to read directory {path}: {reason}")]
    ReadDir { path: String, reason: String },

    /// 잘못된 glob 패턴
    #[error("invalid target pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// 선행 테스트 선언 파일 읽기 실패
    #[error("failed to read prerequisites of {path}: {reason}")]
    ReadDependencies { path: String, reason: String },

    /// 작업 디렉토리 밖을 가리키는 대상 또는 선행 테스트 경로
    #[error("test path escapes the working directory: {path}")]
    OutsideWorkspace { path: String },

    /// 선행 테스트 순환
    #[error("circular prerequisite: {}", chain.join(" -> "))]
    CircularPrerequisite { chain: Vec<String> },
}

/// 페이즈 실행 에러
///
/// 모든 variant가 실행 중단 에러입니다.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// 템플릿 렌더링 실패
    #[error("template rendering failed for {path}: {reason}")]
    Template { path: String, reason: String },

    /// 외부 프로세스 실행 실패
    #[error("failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// 기대 결과 문서가 JSON이 아님
    #[error("expected result {path} is not valid JSON: {reason}")]
    Expected { path: String, reason: String },

    /// 테스트별 환경 파일 파싱 실패
    #[error("failed to load env file {path}: {reason}")]
    EnvFile { path: String, reason: String },

    /// 스크래치 디렉토리 등 파일시스템 작업 실패
    #[error("io error at {path}: {reason}")]
    Io { path: String, reason: String },
}

impl ExecutionError {
    /// 경로와 `std::io::Error`로 `Io` variant를 만듭니다.
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }

    /// forward 단계를 중단시키는 에러인지 여부
    ///
    /// 유닛 실패는 에러가 아니라 유닛에 기록되므로 현재 모든 variant가 해당됩니다.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Template { .. }
            | Self::Spawn { .. }
            | Self::Expected { .. }
            | Self::EnvFile { .. }
            | Self::Io { .. } => true,
        }
    }
}
