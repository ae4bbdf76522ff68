//! Provisioner abstraction.
//!
//! The [`Provisioner`] trait covers the four lifecycle calls the executor
//! makes in a phase's scratch directory. [`TerraformProvisioner`] shells out
//! to the configured binary; tests use `MockProvisioner`.
//!
//! Every call resolves to a [`StepResult`]. A nonzero exit is a normal result
//! that fails the unit; only a failure to start the process is an
//! [`ExecutionError`].

use std::future::Future;
use std::path::Path;

use serde_json::Value;

use tint_core::config::ProvisionerConfig;
use tint_core::error::ExecutionError;
use tint_core::types::StepResult;

use crate::process::{self, CommandOutput, CommandSpec};

/// Infrastructure provisioning operations.
///
/// `env` carries the resource-name variables and per-test overrides layered
/// over the inherited process environment.
pub trait Provisioner: Send + Sync + 'static {
    /// Program name, used in diagnostics.
    fn program(&self) -> &str;

    /// Initialise the working directory.
    fn init(
        &self,
        dir: &Path,
        env: &[(String, String)],
    ) -> impl Future<Output = Result<StepResult, ExecutionError>> + Send;

    /// Create or update resources without prompting.
    fn apply(
        &self,
        dir: &Path,
        env: &[(String, String)],
    ) -> impl Future<Output = Result<StepResult, ExecutionError>> + Send;

    /// Read outputs as JSON.
    ///
    /// `StepResult::output` holds the parsed document, or `null` when stdout
    /// is not JSON.
    fn output(
        &self,
        dir: &Path,
        env: &[(String, String)],
    ) -> impl Future<Output = Result<StepResult, ExecutionError>> + Send;

    /// Destroy everything created in the directory without prompting.
    fn destroy(
        &self,
        dir: &Path,
        env: &[(String, String)],
    ) -> impl Future<Output = Result<StepResult, ExecutionError>> + Send;
}

/// Provisioner backed by the `terraform` CLI (or a compatible binary).
#[derive(Debug, Clone)]
pub struct TerraformProvisioner {
    command: String,
}

impl TerraformProvisioner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &ProvisionerConfig) -> Self {
        Self::new(config.command.clone())
    }

    async fn invoke(
        &self,
        dir: &Path,
        env: &[(String, String)],
        args: &[&str],
    ) -> Result<CommandOutput, ExecutionError> {
        let spec = CommandSpec::new(&self.command, dir)
            .args(args.iter().copied())
            .envs(env);
        process::run(&spec).await
    }
}

impl Provisioner for TerraformProvisioner {
    fn program(&self) -> &str {
        &self.command
    }

    async fn init(
        &self,
        dir: &Path,
        env: &[(String, String)],
    ) -> Result<StepResult, ExecutionError> {
        self.invoke(dir, env, &["init"]).await.map(into_step)
    }

    async fn apply(
        &self,
        dir: &Path,
        env: &[(String, String)],
    ) -> Result<StepResult, ExecutionError> {
        self.invoke(dir, env, &["apply", "-auto-approve", "-no-color"])
            .await
            .map(into_step)
    }

    async fn output(
        &self,
        dir: &Path,
        env: &[(String, String)],
    ) -> Result<StepResult, ExecutionError> {
        let out = self.invoke(dir, env, &["output", "--json"]).await?;
        let parsed = serde_json::from_str::<Value>(&out.stdout).unwrap_or(Value::Null);
        let mut step = into_step(out);
        step.output = parsed;
        Ok(step)
    }

    async fn destroy(
        &self,
        dir: &Path,
        env: &[(String, String)],
    ) -> Result<StepResult, ExecutionError> {
        self.invoke(dir, env, &["destroy", "-auto-approve", "-no-color"])
            .await
            .map(into_step)
    }
}

pub(crate) fn into_step(out: CommandOutput) -> StepResult {
    StepResult {
        status: out.status,
        stdout: out.stdout,
        stderr: out.stderr,
        output: Value::Null,
    }
}

/// Mock provisioner for tests.
///
/// Per-step exit codes and the `output` document are configurable; every
/// call is recorded.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MockProvisioner {
    pub init_status: i32,
    pub apply_status: i32,
    pub outputs: Value,
    pub fail_spawn: bool,
    pub calls: std::sync::Mutex<Vec<(tint_core::types::ProvisionStep, std::path::PathBuf)>>,
}

#[cfg(test)]
impl MockProvisioner {
    pub fn calls(&self) -> Vec<(tint_core::types::ProvisionStep, std::path::PathBuf)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn call(
        &self,
        step: tint_core::types::ProvisionStep,
        dir: &Path,
        status: i32,
        output: Value,
    ) -> Result<StepResult, ExecutionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((step, dir.to_path_buf()));
        }
        if self.fail_spawn {
            return Err(ExecutionError::Spawn {
                program: "mock".to_owned(),
                reason: "not found".to_owned(),
            });
        }
        Ok(StepResult {
            status,
            stdout: String::new(),
            stderr: String::new(),
            output,
        })
    }
}

#[cfg(test)]
impl Provisioner for MockProvisioner {
    fn program(&self) -> &str {
        "mock"
    }

    async fn init(&self, dir: &Path, _: &[(String, String)]) -> Result<StepResult, ExecutionError> {
        self.call(
            tint_core::types::ProvisionStep::Init,
            dir,
            self.init_status,
            Value::Null,
        )
    }

    async fn apply(
        &self,
        dir: &Path,
        _: &[(String, String)],
    ) -> Result<StepResult, ExecutionError> {
        self.call(
            tint_core::types::ProvisionStep::Apply,
            dir,
            self.apply_status,
            Value::Null,
        )
    }

    async fn output(
        &self,
        dir: &Path,
        _: &[(String, String)],
    ) -> Result<StepResult, ExecutionError> {
        self.call(
            tint_core::types::ProvisionStep::Output,
            dir,
            0,
            self.outputs.clone(),
        )
    }

    async fn destroy(
        &self,
        dir: &Path,
        _: &[(String, String)],
    ) -> Result<StepResult, ExecutionError> {
        self.call(tint_core::types::ProvisionStep::Destroy, dir, 0, Value::Null)
    }
}
