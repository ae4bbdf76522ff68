//! Phase executor: the five-phase lifecycle for one test unit.
//!
//! # Phases
//!
//! ```text
//! setup     env file, resource names, scratch dir
//! pretest   render config -> init -> apply -> output -> queries
//! test      (same)
//! posttest  (same)
//! teardown  destroy each provisioned phase, remove scratch dir
//! ```
//!
//! Every forward phase takes the unit by value and hands back the next
//! snapshot. A unit that is already failed comes back untouched, with no
//! processes started and no result slot added.
//!
//! # Failures
//!
//! A nonzero provisioner exit or a query mismatch fails the unit and is
//! recorded in it; a mismatch also skips the phase's remaining queries.
//! Template, spawn and filesystem errors abort the run: the partial phase
//! is still applied, the unit is marked failed, and the snapshot travels
//! back inside [`Aborted`] so teardown can clean it up.
//! Teardown never fails; problems become warnings.

use std::path::Path;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tint_core::error::ExecutionError;
use tint_core::event::RunEvent;
use tint_core::types::{Phase, ProvisionStep, StepKey, StepResult, UnitId};

use crate::diff::compare;
use crate::env::{ResourceNames, RunEnvironment};
use crate::layout::{QuerySpec, TestLayout};
use crate::provisioner::Provisioner;
use crate::query::{QueryRunner, normalize_query};
use crate::template::{TemplateRenderer, render_to_file};
use crate::unit::{PhaseBuilder, TestUnit};

/// Default content for a query's missing variables file.
const DEFAULT_VARIABLES: &str = "{}";

/// A run-fatal error, with the unit snapshot it interrupted.
#[derive(Debug)]
pub struct Aborted {
    /// The unit with the partial phase applied and `failed` set.
    pub unit: TestUnit,
    pub phase: Phase,
    pub error: ExecutionError,
}

/// Runs lifecycle phases against external collaborators.
pub struct PhaseExecutor<P, Q, T> {
    provisioner: P,
    runner: Q,
    renderer: T,
    layout: TestLayout,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl<P, Q, T> PhaseExecutor<P, Q, T>
where
    P: Provisioner,
    Q: QueryRunner,
    T: TemplateRenderer,
{
    pub fn new(provisioner: P, runner: Q, renderer: T, layout: TestLayout) -> Self {
        Self {
            provisioner,
            runner,
            renderer,
            layout,
            events: None,
        }
    }

    /// Attach a channel for progress events.
    pub fn with_events(mut self, events: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    pub fn runner(&self) -> &Q {
        &self.runner
    }

    pub(crate) async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.send(event).await {
                debug!(error = %e, "event receiver closed");
            }
        }
    }

    /// Setup: load the test's env file, fix the run-wide resource names on
    /// first use, and create the scratch directory.
    pub async fn run_setup(
        &self,
        unit: TestUnit,
        env: &mut RunEnvironment,
        names: &ResourceNames,
    ) -> Result<TestUnit, Box<Aborted>> {
        if unit.failed() {
            return Ok(unit);
        }
        self.emit(RunEvent::PhaseStarted {
            unit: unit.id().clone(),
            phase: Phase::Setup,
            prereqs: unit.prereqs().to_vec(),
        })
        .await;

        let outcome = self.prepare(&unit, env, names).await;
        let report = PhaseBuilder::new(&unit, Phase::Setup).finish();
        let unit = unit.apply(report);
        match outcome {
            Ok(()) => Ok(unit),
            Err(error) => Err(self.abort(unit, Phase::Setup, error)),
        }
    }

    async fn prepare(
        &self,
        unit: &TestUnit,
        env: &mut RunEnvironment,
        names: &ResourceNames,
    ) -> Result<(), ExecutionError> {
        if !unit.owns_scratch_dir() {
            return Err(ExecutionError::Io {
                path: unit.tmp_dir().display().to_string(),
                reason: "scratch directory is outside the scratch root".to_owned(),
            });
        }

        let env_file = self.layout.env_file_path(unit.id());
        env.load_env_file(&env_file)?;
        for (name, value) in env.custom_vars() {
            info!(unit = %unit.id(), name = %name, "custom env variable");
            self.emit(RunEvent::CustomEnv { name, value }).await;
        }

        let established = env.establish_resource_names(names.clone());
        debug!(
            resource_name = %established.resource_name,
            resource_name_1 = %established.resource_name_1,
            resource_name_2 = %established.resource_name_2,
            "resource names"
        );

        tokio::fs::create_dir_all(unit.tmp_dir())
            .await
            .map_err(|e| ExecutionError::io(unit.tmp_dir(), e))
    }

    /// Run one of pretest, test or posttest.
    pub async fn run_phase(
        &self,
        unit: TestUnit,
        phase: Phase,
        env: &RunEnvironment,
    ) -> Result<TestUnit, Box<Aborted>> {
        if unit.failed() {
            debug!(unit = %unit.id(), phase = %phase, "unit failed, skipping phase");
            return Ok(unit);
        }
        self.emit(RunEvent::PhaseStarted {
            unit: unit.id().clone(),
            phase,
            prereqs: Vec::new(),
        })
        .await;

        let mut builder = PhaseBuilder::new(&unit, phase);
        let outcome = self.drive_phase(&mut builder, env).await;
        let report = builder.finish();
        let unit = unit.apply(report);
        match outcome {
            Ok(()) => {
                info!(
                    unit = %unit.id(),
                    phase = %phase,
                    failed = unit.failed(),
                    "phase finished"
                );
                Ok(unit)
            }
            Err(error) => Err(self.abort(unit, phase, error)),
        }
    }

    async fn drive_phase(
        &self,
        builder: &mut PhaseBuilder<'_>,
        env: &RunEnvironment,
    ) -> Result<(), ExecutionError> {
        let provisioned = self.provision(builder, env).await?;
        if !provisioned {
            builder.mark_failed();
        }
        self.run_queries(builder, env, provisioned).await
    }

    /// Render and apply the phase's provisioner configuration.
    ///
    /// Returns whether provisioning succeeded; a phase without
    /// configuration counts as success.
    async fn provision(
        &self,
        builder: &mut PhaseBuilder<'_>,
        env: &RunEnvironment,
    ) -> Result<bool, ExecutionError> {
        let phase = builder.phase();
        let id = builder.unit().id().clone();
        let files = self.layout.config_files(&id, phase).await?;
        if files.is_empty() {
            debug!(unit = %id, phase = %phase, "no provisioner configuration");
            return Ok(true);
        }

        let dir = builder.unit().phase_dir(phase);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ExecutionError::io(&dir, e))?;
        let context = builder.context();
        for file in &files {
            if let Err(e) = render_to_file(&self.renderer, file, &context, &dir, None).await {
                error!(
                    unit = %id,
                    phase = %phase,
                    path = %file.display(),
                    error = %e,
                    "configuration rendering failed"
                );
                return Err(e);
            }
        }

        self.emit(RunEvent::ProvisionStarted {
            unit: id.clone(),
            phase,
        })
        .await;
        let vars = env.provisioning_vars();

        let init = self.provisioner.init(&dir, &vars).await?;
        self.forward_stderr(self.provisioner.program(), &init).await;
        let initialized = init.succeeded();
        builder.record(StepKey::Provision(ProvisionStep::Init), init);

        if initialized {
            let apply = self.provisioner.apply(&dir, &vars).await?;
            self.forward_stderr(self.provisioner.program(), &apply).await;
            builder.record(StepKey::Provision(ProvisionStep::Apply), apply);

            let output = self.provisioner.output(&dir, &vars).await?;
            self.forward_stderr(self.provisioner.program(), &output).await;
            merge_provisioner_output(builder, &output.output);
            builder.record(StepKey::Provision(ProvisionStep::Output), output);
        }

        let succeeded = initialized
            && builder
                .step(&StepKey::Provision(ProvisionStep::Apply))
                .is_none_or(StepResult::succeeded);
        if !succeeded {
            warn!(unit = %id, phase = %phase, "provisioning failed");
        }
        Ok(succeeded)
    }

    async fn run_queries(
        &self,
        builder: &mut PhaseBuilder<'_>,
        env: &RunEnvironment,
        provisioned: bool,
    ) -> Result<(), ExecutionError> {
        let phase = builder.phase();
        let id = builder.unit().id().clone();
        let queries = self.layout.queries(&id, phase).await?;

        if !provisioned {
            self.emit(RunEvent::ProvisionFailed {
                unit: id.clone(),
                phase,
            })
            .await;
        }

        for query in &queries {
            let result = if provisioned {
                self.run_query(builder, query, env).await?
            } else {
                self.emit(RunEvent::QueryFinished {
                    unit: id.clone(),
                    phase,
                    name: query.name.clone(),
                    passed: false,
                    diff: Vec::new(),
                })
                .await;
                StepResult::synthetic_failure()
            };

            let succeeded = result.succeeded();
            if !succeeded {
                builder.mark_failed();
            }
            builder.merge_output(&result.output);
            builder.record(StepKey::Query(query.name.clone()), result);

            if provisioned && !succeeded {
                debug!(
                    unit = %id,
                    phase = %phase,
                    query = %query.name,
                    "query failed, skipping remaining queries"
                );
                break;
            }
        }
        Ok(())
    }

    async fn run_query(
        &self,
        builder: &PhaseBuilder<'_>,
        query: &QuerySpec,
        env: &RunEnvironment,
    ) -> Result<StepResult, ExecutionError> {
        let unit = builder.unit();
        let context = builder.context();
        let tmp_dir = unit.tmp_dir();

        let rendered = async {
            let query_path =
                render_to_file(&self.renderer, &query.query, &context, tmp_dir, None).await?;
            render_to_file(
                &self.renderer,
                &query.variables,
                &context,
                tmp_dir,
                Some(DEFAULT_VARIABLES),
            )
            .await?;
            let expected_path =
                render_to_file(&self.renderer, &query.expected, &context, tmp_dir, None).await?;
            Ok::<_, ExecutionError>((query_path, expected_path))
        }
        .await;
        let (query_path, expected_path) = rendered.inspect_err(|e| {
            error!(unit = %unit.id(), error = %e, "query rendering failed");
        })?;

        let file = file_name(&query.query);
        self.emit(RunEvent::QueryStarted {
            unit: unit.id().clone(),
            phase: query.phase,
            file: file.clone(),
        })
        .await;

        let text = read(&query_path).await?;
        let mut result = self
            .runner
            .run(&normalize_query(&text), &env.process_vars())
            .await?;
        self.forward_stderr(self.runner.program(), &result).await;

        let expected: Value =
            serde_json::from_str(&read(&expected_path).await?).map_err(|e| {
                ExecutionError::Expected {
                    path: query.expected.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
        let comparison = compare(&result.output, &expected);
        if !comparison.matches {
            result.status = 1;
        }

        let passed = result.succeeded();
        info!(unit = %unit.id(), phase = %query.phase, query = %file, passed, "query finished");
        self.emit(RunEvent::QueryFinished {
            unit: unit.id().clone(),
            phase: query.phase,
            name: query.name.clone(),
            passed,
            diff: if comparison.matches {
                Vec::new()
            } else {
                comparison.lines
            },
        })
        .await;
        Ok(result)
    }

    /// Destroy whatever each provisioning phase created, then remove the
    /// scratch directory. Runs whether or not the unit failed.
    pub async fn run_teardown(&self, unit: TestUnit, env: &RunEnvironment) -> TestUnit {
        let id = unit.id().clone();
        self.emit(RunEvent::PhaseStarted {
            unit: id.clone(),
            phase: Phase::Teardown,
            prereqs: Vec::new(),
        })
        .await;

        if !unit.owns_scratch_dir() {
            self.teardown_warning(
                &id,
                format!(
                    "scratch directory {} is outside the scratch root, leaving it in place",
                    unit.tmp_dir().display()
                ),
            )
            .await;
            let report = PhaseBuilder::new(&unit, Phase::Teardown).finish();
            return unit.apply(report);
        }

        let vars = env.provisioning_vars();
        let mut builder = PhaseBuilder::new(&unit, Phase::Teardown);
        for phase in Phase::PROVISIONING {
            if unit.phase(phase).is_none_or(|record| record.is_empty()) {
                continue;
            }
            let dir = unit.phase_dir(phase);
            if !is_dir(&dir).await {
                self.teardown_warning(&id, format!("no {phase} directory to destroy, skipping"))
                    .await;
                continue;
            }
            match self.provisioner.destroy(&dir, &vars).await {
                Ok(result) => {
                    self.forward_stderr(self.provisioner.program(), &result).await;
                    if !result.succeeded() {
                        self.teardown_warning(
                            &id,
                            format!("destroy for {phase} exited with status {}", result.status),
                        )
                        .await;
                    }
                    builder.record(StepKey::Destroy(phase), result);
                }
                Err(e) => {
                    self.teardown_warning(&id, format!("destroy for {phase} failed: {e}"))
                        .await;
                }
            }
        }
        let report = builder.finish();

        match tokio::fs::remove_dir_all(unit.tmp_dir()).await {
            Ok(()) => debug!(unit = %id, "scratch directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                self.teardown_warning(
                    &id,
                    format!(
                        "failed to remove scratch directory {}: {e}",
                        unit.tmp_dir().display()
                    ),
                )
                .await;
            }
        }

        unit.apply(report)
    }

    fn abort(&self, unit: TestUnit, phase: Phase, error: ExecutionError) -> Box<Aborted> {
        error!(unit = %unit.id(), phase = %phase, error = %error, "run aborted");
        Box::new(Aborted {
            unit: unit.into_failed(),
            phase,
            error,
        })
    }

    async fn teardown_warning(&self, unit: &UnitId, message: String) {
        warn!(unit = %unit, "{message}");
        self.emit(RunEvent::TeardownWarning {
            unit: unit.clone(),
            message,
        })
        .await;
    }

    async fn forward_stderr(&self, program: &str, result: &StepResult) {
        if !result.stderr.is_empty() {
            self.emit(RunEvent::ProcessStderr {
                program: program.to_owned(),
                text: result.stderr.clone(),
            })
            .await;
        }
    }
}

/// Merge `output --json` into the unit, lifting the well-known identifiers.
fn merge_provisioner_output(builder: &mut PhaseBuilder<'_>, output: &Value) {
    if !output.is_object() {
        return;
    }
    let lifted = |key: &str| {
        output
            .pointer(&format!("/{key}/value"))
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    };
    let resource_id = lifted("resource_id");
    let resource_name = lifted("resource_name");
    builder.merge_output(&json!({
        "resourceId": resource_id,
        "resourceName": resource_name,
    }));
    builder.set_resource(resource_id, resource_name);
    builder.merge_output(output);
}

async fn read(path: &Path) -> Result<String, ExecutionError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ExecutionError::io(path, e))
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
