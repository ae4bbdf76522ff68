//! Reverse-order teardown, including after a fatal error.

use tint_core::event::RunEvent;
use tint_core::types::{Phase, StepKey, UnitId};
use tint_runner::Summary;

use crate::helpers::collaborators::{Call, CallLog, ScriptedProvisioner, ScriptedQueryRunner};
use crate::helpers::tree::{TestTree, drain};

const BUCKET_TF: &str = "resource \"aws_s3_bucket\" \"named_test_resource\" {}\n";

#[tokio::test]
async fn test_teardown_runs_in_reverse_plan_order() {
    // Given: foo depends on bar and both provision
    let tree = TestTree::new();
    tree.file("bar", "variables.tf", BUCKET_TF)
        .file("foo", "variables.tf", BUCKET_TF)
        .file("foo", "dependencies.txt", "../bar");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    // When
    let results = tree.run(&orchestrator, &["foo"]).await;

    // Then: foo is destroyed before bar, after every forward step
    assert_eq!(
        results.teardown_order,
        vec![UnitId::new("tests/foo"), UnitId::new("tests/bar")]
    );
    assert_eq!(
        log.destroyed(),
        vec![tree.phase_dir("foo", "test"), tree.phase_dir("bar", "test")]
    );
    let last_forward = log
        .calls()
        .iter()
        .rposition(|c| !c.is_destroy())
        .unwrap();
    let first_destroy = log.position(Call::is_destroy).unwrap();
    assert!(last_forward < first_destroy);

    for name in ["bar", "foo"] {
        let unit = results.get(&UnitId::new(format!("tests/{name}"))).unwrap();
        let teardown = unit.phase(Phase::Teardown).unwrap();
        assert_eq!(teardown.get(&StepKey::Destroy(Phase::Test)).unwrap().status, 0);
        assert!(!unit.tmp_dir().exists());
    }
}

#[tokio::test]
async fn test_failed_unit_is_still_destroyed() {
    let tree = TestTree::new();
    tree.file("foo", "variables.tf", BUCKET_TF);
    let log = CallLog::new();
    let orchestrator = tree.orchestrator(
        ScriptedProvisioner::new(&log).failing_apply("tests/foo"),
        ScriptedQueryRunner::new(&log),
    );

    let results = tree.run(&orchestrator, &["foo"]).await;

    assert!(results.get(&UnitId::new("tests/foo")).unwrap().failed());
    assert_eq!(log.destroyed(), vec![tree.phase_dir("foo", "test")]);
}

#[tokio::test]
async fn test_fatal_error_stops_forward_pass_but_tears_down_everything() {
    // Given: b's provisioner cannot be started
    let tree = TestTree::new();
    tree.file("a", "variables.tf", BUCKET_TF)
        .file("b", "variables.tf", BUCKET_TF)
        .file("c", "variables.tf", BUCKET_TF);
    let log = CallLog::new();
    let (orchestrator, events) = tree.orchestrator_with_events(
        ScriptedProvisioner::new(&log).unstartable("tests/b"),
        ScriptedQueryRunner::new(&log),
    );

    // When
    let results = tree.run(&orchestrator, &[]).await;
    drop(orchestrator);
    let events = drain(events).await;

    // Then: c was never started, yet every unit went through teardown
    assert!(
        !log.calls()
            .iter()
            .filter_map(Call::dir)
            .any(|d| d.starts_with(tree.scratch().join("tests").join("c")))
    );
    assert_eq!(
        results.teardown_order,
        vec![
            UnitId::new("tests/c"),
            UnitId::new("tests/b"),
            UnitId::new("tests/a")
        ]
    );
    assert_eq!(log.destroyed(), vec![tree.phase_dir("a", "test")]);

    let aborted = results.aborted.as_ref().unwrap();
    assert_eq!(aborted.unit, UnitId::new("tests/b"));
    assert_eq!(aborted.phase, Phase::Test);
    assert!(aborted.message.contains("scripted-provisioner"));

    assert!(results.get(&UnitId::new("tests/b")).unwrap().failed());
    assert!(!results.get(&UnitId::new("tests/c")).unwrap().failed());

    let summary = Summary::from_results(&results);
    assert_eq!(summary.failing, vec![UnitId::new("tests/b")]);
    assert_eq!(summary.exit_code(), 1);

    assert!(matches!(events.first(), Some(RunEvent::PlanResolved { units }) if units.len() == 3));
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::Aborted { unit: Some(unit), phase: Some(Phase::Test), .. }
            if unit.as_str() == "tests/b"
    )));
}

#[tokio::test]
async fn test_teardown_problems_do_not_stop_other_units() {
    // Given: three provisioned tests; c's destroy exits 1 and b's cannot start
    let tree = TestTree::new();
    tree.file("a", "variables.tf", BUCKET_TF)
        .file("b", "variables.tf", BUCKET_TF)
        .file("c", "variables.tf", BUCKET_TF);
    let log = CallLog::new();
    let (orchestrator, events) = tree.orchestrator_with_events(
        ScriptedProvisioner::new(&log)
            .failing_destroy("tests/c")
            .undestroyable("tests/b"),
        ScriptedQueryRunner::new(&log),
    );

    // When
    let results = tree.run(&orchestrator, &[]).await;
    drop(orchestrator);
    let events = drain(events).await;

    // Then: every unit was still destroyed in reverse order and cleaned up
    assert_eq!(
        log.destroyed(),
        vec![
            tree.phase_dir("c", "test"),
            tree.phase_dir("b", "test"),
            tree.phase_dir("a", "test")
        ]
    );
    for name in ["a", "b", "c"] {
        let unit = results.get(&UnitId::new(format!("tests/{name}"))).unwrap();
        assert!(!unit.tmp_dir().exists(), "{name} scratch left behind");
    }

    let teardown = |name: &str| {
        results
            .get(&UnitId::new(format!("tests/{name}")))
            .unwrap()
            .phase(Phase::Teardown)
            .unwrap()
            .get(&StepKey::Destroy(Phase::Test))
            .map(|r| r.status)
    };
    assert_eq!(teardown("c"), Some(1));
    assert_eq!(teardown("b"), None);
    assert_eq!(teardown("a"), Some(0));

    // teardown problems are warnings, not failures
    assert!(results.aborted.is_none());
    assert_eq!(Summary::from_results(&results).exit_code(), 0);
    let warned: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::TeardownWarning { unit, .. } => Some(unit.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(warned, vec!["tests/c", "tests/b"]);
}

#[tokio::test]
async fn test_invalid_expected_document_aborts_the_run() {
    let tree = TestTree::new();
    tree.file("a", "query.sql", "select 1")
        .file("a", "expected.json", "{ not json")
        .file("b", "query.sql", "select 2")
        .file("b", "expected.json", "{}");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    let results = tree.run(&orchestrator, &[]).await;

    assert_eq!(log.queries(), vec!["select 1"]);
    let aborted = results.aborted.unwrap();
    assert_eq!(aborted.unit, UnitId::new("tests/a"));
    assert_eq!(results.teardown_order.len(), 2);
}
