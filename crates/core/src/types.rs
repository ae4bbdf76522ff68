//! 도메인 타입: 테스트 단위, 단계, 단계 결과
//!
//! 테스트 유닛 식별자, 라이프사이클 페이즈, 단계별 결과 레코드를 정의합니다.

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// 테스트 유닛 식별자
///
/// 테스트 디렉토리 경로(`tests/foo` 형식, `/` 구분)이며 실행 전체에서 고유합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// 경로 문자열로 식별자를 생성합니다.
    pub fn new(dir: impl Into<String>) -> Self {
        Self(dir.into())
    }

    /// 식별자 문자열
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 테스트 디렉토리 경로
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// 작업 디렉토리 안쪽을 가리키는 상대 경로인지 여부
    ///
    /// 스크래치 디렉토리가 이 경로로 만들어지므로, `..`나 절대 경로를 가진
    /// 식별자는 스크래치 루트 밖을 가리킵니다.
    pub fn is_contained(&self) -> bool {
        is_contained_path(self.as_path())
    }
}

/// `.`과 일반 구성 요소로만 이루어진 상대 경로인지 검사합니다.
pub fn is_contained_path(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 테스트 라이프사이클 페이즈
///
/// ```text
/// setup → pretest → test → posttest → (역순) teardown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Setup,
    Pretest,
    Test,
    Posttest,
    Teardown,
}

impl Phase {
    /// provisioning과 쿼리를 수행하는 페이즈 (실행 순서)
    pub const PROVISIONING: [Phase; 3] = [Phase::Pretest, Phase::Test, Phase::Posttest];

    /// 전체 페이즈 (라이프사이클 순서)
    pub const ALL: [Phase; 5] = [
        Phase::Setup,
        Phase::Pretest,
        Phase::Test,
        Phase::Posttest,
        Phase::Teardown,
    ];

    /// 소문자 이름 (파일 접두사로도 사용)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Pretest => "pretest",
            Self::Test => "test",
            Self::Posttest => "posttest",
            Self::Teardown => "teardown",
        }
    }

    /// 파일 이름 접두사 (`pretest-`)
    pub fn file_prefix(&self) -> String {
        format!("{}-", self.as_str())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}

/// provisioner 하위 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProvisionStep {
    Init,
    Apply,
    Output,
    Destroy,
}

impl ProvisionStep {
    /// 소문자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Apply => "apply",
            Self::Output => "output",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 페이즈 안의 단계 키
///
/// (페이즈, 단계) 쌍으로 결과 레코드를 식별합니다.
/// 직렬화 시 `provision.apply`, `query.<name>`, `destroy.test` 형태의 문자열이 됩니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepKey {
    /// 해당 페이즈의 provisioner 단계
    Provision(ProvisionStep),
    /// teardown에서 수행한 특정 페이즈의 destroy
    Destroy(Phase),
    /// 쿼리 (test 페이즈 기본 쿼리는 빈 이름)
    Query(String),
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provision(step) => write!(f, "provision.{step}"),
            Self::Destroy(phase) => write!(f, "destroy.{phase}"),
            Self::Query(name) if name.is_empty() => f.write_str("query"),
            Self::Query(name) => write!(f, "query.{name}"),
        }
    }
}

impl Serialize for StepKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 단계 결과 레코드
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    /// 종료 코드 (시그널 종료는 -1, 결과 불일치는 1)
    pub status: i32,
    /// 캡처된 stdout
    pub stdout: String,
    /// 캡처된 stderr
    pub stderr: String,
    /// 파싱된 출력 (없으면 `null`)
    pub output: Value,
}

impl StepResult {
    /// 프로세스를 실행하지 않고 실패로 기록하는 결과
    pub fn synthetic_failure() -> Self {
        Self {
            status: 1,
            stdout: String::new(),
            stderr: String::new(),
            output: Value::Null,
        }
    }

    /// 상태 코드가 정확히 0인지 여부
    pub fn succeeded(&self) -> bool {
        self.status == 0
    }
}

/// 줄 단위 diff의 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// 기대 결과에만 있는 줄
    Added,
    /// 실제 결과에만 있는 줄
    Removed,
    /// 양쪽에 같은 줄
    Unchanged,
}

/// 줄 단위 diff 조각
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub kind: DiffKind,
    pub text: String,
}
