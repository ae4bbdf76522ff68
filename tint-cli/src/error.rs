//! CLI-specific error types and exit code mapping

use tint_core::error::{PlanError, TintError};

/// CLI-specific error type.
///
/// A run that completes is never an error, whatever its outcome: its exit
/// code comes from the summary. These variants cover what stops tint before
/// or outside a run.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Target resolution or prerequisite expansion failed.
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    /// Logging setup or another command-level failure.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (working directory, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                        |
    /// |------|--------------------------------|
    /// | 1    | General / command error        |
    /// | 2    | Configuration error            |
    /// | 3    | Target or prerequisite error   |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Plan(_) => 3,
            Self::Command(_) | Self::JsonSerialize(_) | Self::Io(_) => 1,
        }
    }
}

impl From<TintError> for CliError {
    fn from(e: TintError) -> Self {
        match e {
            TintError::Config(e) => Self::Config(e.to_string()),
            TintError::Plan(e) => Self::Plan(e),
            TintError::Io(e) => Self::Io(e),
            TintError::Execution(e) => Self::Command(e.to_string()),
        }
    }
}
