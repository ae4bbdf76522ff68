//! 설정 관리: tint.toml 파싱 및 런타임 설정
//!
//! [`TintConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TINT_RUN_TESTS_ROOT=tests` 형식)
//! 3. 설정 파일 (`tint.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tint_core::error::TintError> {
//! use tint_core::config::TintConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TintConfig::load("tint.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TintConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TintError};

/// tint 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TintConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 실행 설정
    #[serde(default)]
    pub run: RunConfig,
    /// provisioner 설정
    #[serde(default)]
    pub provisioner: ProvisionerConfig,
    /// 쿼리 러너 설정
    #[serde(default)]
    pub query: QueryConfig,
}

impl TintConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TintError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작하여 설정을 로드합니다.
    ///
    /// 기본 경로(`tint.toml`)를 사용할 때처럼 설정 파일이 선택 사항인 경우에 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, TintError> {
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(TintError::Config(ConfigError::FileNotFound { .. })) => Self::default(),
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TintError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TintError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TintError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TintError> {
        toml::from_str(toml_str).map_err(|e| {
            TintError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TINT_{SECTION}_{FIELD}`
    /// 예: `TINT_PROVISIONER_COMMAND=tofu`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TINT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TINT_GENERAL_LOG_FORMAT");
        override_bool(&mut self.general.color, "TINT_GENERAL_COLOR");

        // Run
        override_string(&mut self.run.tests_root, "TINT_RUN_TESTS_ROOT");
        override_string(&mut self.run.scratch_root, "TINT_RUN_SCRATCH_ROOT");
        override_string(
            &mut self.run.resource_name_prefix,
            "TINT_RUN_RESOURCE_NAME_PREFIX",
        );
        override_string(&mut self.run.env_prefix, "TINT_RUN_ENV_PREFIX");
        override_string(&mut self.run.env_file, "TINT_RUN_ENV_FILE");

        // Provisioner
        override_string(&mut self.provisioner.command, "TINT_PROVISIONER_COMMAND");
        override_csv(
            &mut self.provisioner.extensions,
            "TINT_PROVISIONER_EXTENSIONS",
        );

        // Query
        override_string(&mut self.query.command, "TINT_QUERY_COMMAND");
        override_string(&mut self.query.subcommand, "TINT_QUERY_SUBCOMMAND");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TintError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        // 대상 디렉토리 열거는 패턴의 첫 경로 구성요소 기준이므로 단일 구성요소여야 함
        if self.run.tests_root.is_empty() || self.run.tests_root.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "run.tests_root".to_owned(),
                reason: "must be a single, non-empty directory name".to_owned(),
            }
            .into());
        }

        if self.run.resource_name_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "run.resource_name_prefix".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.provisioner.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "provisioner.command".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.provisioner.extensions.is_empty()
            || self.provisioner.extensions.iter().any(|e| e.is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "provisioner.extensions".to_owned(),
                reason: "must list at least one non-empty extension".to_owned(),
            }
            .into());
        }

        if self.query.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "query.command".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// 실행 결과 전체를 JSON으로 덤프할지 여부 (debug 로그 레벨)
    pub fn debug_enabled(&self) -> bool {
        matches!(self.general.log_level.as_str(), "debug" | "trace")
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 콘솔 출력 색상 사용 여부
    pub color: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_owned(),
            log_format: "pretty".to_owned(),
            color: true,
        }
    }
}

/// 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 경로 구분자가 없는 대상 인자의 기준 디렉토리
    pub tests_root: String,
    /// 유닛별 스크래치 디렉토리의 상위 경로 (비어 있으면 시스템 임시 디렉토리)
    pub scratch_root: String,
    /// 생성되는 리소스 이름의 접두사
    pub resource_name_prefix: String,
    /// 외부에서 주입되는 테스트 환경변수의 접두사
    pub env_prefix: String,
    /// 테스트 디렉토리 안의 환경 파일 이름
    pub env_file: String,
}

impl RunConfig {
    /// 실제 스크래치 루트 경로
    pub fn scratch_root(&self) -> PathBuf {
        if self.scratch_root.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&self.scratch_root)
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tests_root: "tests".to_owned(),
            scratch_root: String::new(),
            resource_name_prefix: "steampipetest".to_owned(),
            env_prefix: "TURBOT_TEST_".to_owned(),
            env_file: ".env.staging".to_owned(),
        }
    }
}

/// provisioner 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// 실행 파일 이름 또는 경로
    pub command: String,
    /// 페이즈 설정 파일로 인식할 확장자 (점 제외)
    pub extensions: Vec<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            command: "terraform".to_owned(),
            extensions: vec!["tf".to_owned(), "tfvars".to_owned()],
        }
    }
}

/// 쿼리 러너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// 실행 파일 이름 또는 경로
    pub command: String,
    /// 쿼리 문자열 앞에 오는 하위 명령 (비어 있으면 생략)
    pub subcommand: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            command: "steampipe".to_owned(),
            subcommand: "query".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split(',').map(|s| s.trim().to_owned()).collect();
    }
}
