//! External process invocation.
//!
//! Every provisioner and query-runner call goes through [`run`]: one awaitable
//! call that drains stdout and stderr to exit and resolves exactly once,
//! either with the captured output or with a spawn error.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use tint_core::error::ExecutionError;

/// A fully described invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Extra variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &[(String, String)]) -> Self {
        self.env.extend_from_slice(env);
        self
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run a process to completion.
///
/// A nonzero exit is not an error. Failing to start the process is.
pub async fn run(spec: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
    debug!(
        program = %spec.program,
        args = ?spec.args,
        cwd = %spec.cwd.display(),
        "spawning process"
    );

    let output = Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ExecutionError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

    let status = output.status.code().unwrap_or(-1);
    debug!(program = %spec.program, status, "process exited");

    Ok(CommandOutput {
        status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
