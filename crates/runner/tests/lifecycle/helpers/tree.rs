//! Temporary test tree and run wiring.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::sync::mpsc;

use tint_core::event::RunEvent;
use tint_runner::{
    BraceTemplate, ExecutionPlan, Orchestrator, PhaseExecutor, PlanBuilder, RunEnvironment,
    RunResults, TargetResolver, TestLayout,
};

use super::collaborators::{ScriptedProvisioner, ScriptedQueryRunner};

pub type TestOrchestrator = Orchestrator<ScriptedProvisioner, ScriptedQueryRunner, BraceTemplate>;

/// A working directory with a `tests/` root and a separate scratch root.
pub struct TestTree {
    work: TempDir,
    scratch: TempDir,
}

#[allow(dead_code)]
impl TestTree {
    pub fn new() -> Self {
        let work = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(work.path().join("tests")).unwrap();
        Self {
            work,
            scratch: tempfile::tempdir().unwrap(),
        }
    }

    /// Create an empty test directory (`tests/<name>`).
    pub fn test(&self, name: &str) -> &Self {
        std::fs::create_dir_all(self.work.path().join("tests").join(name)).unwrap();
        self
    }

    /// Write a file into `tests/<name>`, creating the test if needed.
    pub fn file(&self, name: &str, file: &str, content: &str) -> &Self {
        self.test(name);
        std::fs::write(self.work.path().join("tests").join(name).join(file), content).unwrap();
        self
    }

    pub fn work(&self) -> &Path {
        self.work.path()
    }

    pub fn scratch(&self) -> &Path {
        self.scratch.path()
    }

    /// Scratch directory of a unit's phase (`<scratch>/tests/<name>/provision/<phase>`).
    pub fn phase_dir(&self, name: &str, phase: &str) -> PathBuf {
        self.scratch
            .path()
            .join("tests")
            .join(name)
            .join("provision")
            .join(phase)
    }

    pub fn layout(&self) -> TestLayout {
        TestLayout::new(
            self.work.path(),
            vec!["tf".to_owned(), "tfvars".to_owned()],
            ".env.staging",
        )
    }

    /// Resolve targets and build the plan, as the CLI does.
    pub async fn plan(&self, args: &[&str]) -> ExecutionPlan {
        let args: Vec<String> = args.iter().map(|a| (*a).to_owned()).collect();
        let selected = TargetResolver::new(self.work(), "tests")
            .resolve(&args)
            .await
            .unwrap();
        PlanBuilder::new(self.work()).build(&selected).await.unwrap()
    }

    pub fn orchestrator(
        &self,
        provisioner: ScriptedProvisioner,
        runner: ScriptedQueryRunner,
    ) -> TestOrchestrator {
        let executor = PhaseExecutor::new(provisioner, runner, BraceTemplate, self.layout());
        Orchestrator::new(executor, "steampipetest")
    }

    /// Same as [`orchestrator`](Self::orchestrator) with an event channel attached.
    pub fn orchestrator_with_events(
        &self,
        provisioner: ScriptedProvisioner,
        runner: ScriptedQueryRunner,
    ) -> (TestOrchestrator, mpsc::Receiver<RunEvent>) {
        let (tx, rx) = mpsc::channel(1024);
        let executor =
            PhaseExecutor::new(provisioner, runner, BraceTemplate, self.layout()).with_events(tx);
        (Orchestrator::new(executor, "steampipetest"), rx)
    }

    /// Plan and run the given targets with an empty inherited environment.
    pub async fn run(&self, orchestrator: &TestOrchestrator, args: &[&str]) -> RunResults {
        self.run_with_env(orchestrator, args, Vec::new()).await
    }

    pub async fn run_with_env(
        &self,
        orchestrator: &TestOrchestrator,
        args: &[&str],
        inherited: Vec<(String, String)>,
    ) -> RunResults {
        let plan = self.plan(args).await;
        let env = RunEnvironment::new("TURBOT_TEST_", inherited);
        orchestrator.run(plan.into_units(self.scratch()), env).await
    }
}

/// Drain every event sent so far. The orchestrator must have been dropped.
#[allow(dead_code)]
pub async fn drain(mut rx: mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
