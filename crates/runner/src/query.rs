//! Query runner abstraction.
//!
//! [`SteampipeRunner`] passes the rendered query as a single argument after
//! the configured subcommand and asks for JSON output. Unparseable stdout is
//! treated as an empty result (`{}`), which then fails the comparison.

use std::future::Future;
use std::path::PathBuf;

use serde_json::{Map, Value};

use tint_core::config::QueryConfig;
use tint_core::error::ExecutionError;
use tint_core::types::StepResult;

use crate::process::{self, CommandSpec};
use crate::provisioner::into_step;

/// Executes one query and returns its parsed output.
pub trait QueryRunner: Send + Sync + 'static {
    /// Program name, used in diagnostics.
    fn program(&self) -> &str;

    /// Run a normalized query. `StepResult::output` is always set.
    fn run(
        &self,
        query: &str,
        env: &[(String, String)],
    ) -> impl Future<Output = Result<StepResult, ExecutionError>> + Send;
}

/// Query runner backed by the `steampipe` CLI.
#[derive(Debug, Clone)]
pub struct SteampipeRunner {
    command: String,
    subcommand: String,
    cwd: PathBuf,
}

impl SteampipeRunner {
    pub fn new(
        command: impl Into<String>,
        subcommand: impl Into<String>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            command: command.into(),
            subcommand: subcommand.into(),
            cwd: cwd.into(),
        }
    }

    /// Runner working in `cwd` (normally the directory `tint` was started in).
    pub fn from_config(config: &QueryConfig, cwd: impl Into<PathBuf>) -> Self {
        Self::new(config.command.clone(), config.subcommand.clone(), cwd)
    }

    fn command_spec(&self, query: &str, env: &[(String, String)]) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.command, &self.cwd);
        if !self.subcommand.is_empty() {
            spec = spec.arg(&self.subcommand);
        }
        spec.args(["--output", "json", query]).envs(env)
    }
}

impl QueryRunner for SteampipeRunner {
    fn program(&self) -> &str {
        &self.command
    }

    async fn run(
        &self,
        query: &str,
        env: &[(String, String)],
    ) -> Result<StepResult, ExecutionError> {
        let out = process::run(&self.command_spec(query, env)).await?;
        let parsed = parse_output(&out.stdout);
        let mut step = into_step(out);
        step.output = parsed;
        Ok(step)
    }
}

/// Parse runner stdout; anything that is not JSON becomes `{}`.
pub fn parse_output(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap_or_else(|_| Value::Object(Map::new()))
}

/// Collapse a rendered query onto one line.
///
/// Line feeds become spaces and carriage returns are dropped.
pub fn normalize_query(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\r')
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

/// Mock query runner for tests.
///
/// Answers every query with the same stdout and records the query text.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MockQueryRunner {
    pub stdout: String,
    pub queries: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockQueryRunner {
    pub fn returning(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_owned(),
            queries: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl QueryRunner for MockQueryRunner {
    fn program(&self) -> &str {
        "mock"
    }

    async fn run(&self, query: &str, _: &[(String, String)]) -> Result<StepResult, ExecutionError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_owned());
        }
        Ok(StepResult {
            status: 0,
            stdout: self.stdout.clone(),
            stderr: String::new(),
            output: parse_output(&self.stdout),
        })
    }
}
