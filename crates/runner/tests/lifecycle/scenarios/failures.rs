//! Failure propagation within and across units.

use tint_core::types::{Phase, ProvisionStep, StepKey, UnitId};
use tint_runner::Summary;

use crate::helpers::collaborators::{Call, CallLog, ScriptedProvisioner, ScriptedQueryRunner};
use crate::helpers::tree::TestTree;

const BUCKET_TF: &str = "resource \"aws_s3_bucket\" \"named_test_resource\" {}\n";

#[tokio::test]
async fn test_failed_apply_fails_queries_without_running_them() {
    // Given: apply exits 1 and the test phase has three queries
    let tree = TestTree::new();
    tree.file("foo", "variables.tf", BUCKET_TF)
        .file("foo", "query.sql", "select 1")
        .file("foo", "expected.json", "{}")
        .file("foo", "test-by_arn-query.sql", "select 2")
        .file("foo", "test-by_arn-expected.json", "{}")
        .file("foo", "test-by_tag-query.sql", "select 3")
        .file("foo", "test-by_tag-expected.json", "{}");
    let log = CallLog::new();
    let orchestrator = tree.orchestrator(
        ScriptedProvisioner::new(&log).failing_apply("tests/foo"),
        ScriptedQueryRunner::new(&log),
    );

    // When
    let results = tree.run(&orchestrator, &["foo"]).await;

    // Then: the runner was never invoked and every query is recorded as failed
    assert!(log.queries().is_empty());
    let unit = results.get(&UnitId::new("tests/foo")).unwrap();
    assert!(unit.failed());
    let record = unit.phase(Phase::Test).unwrap();
    assert_eq!(
        record
            .get(&StepKey::Provision(ProvisionStep::Apply))
            .map(|r| r.status),
        Some(1)
    );
    for name in ["", "by_arn", "by_tag"] {
        let step = record.get(&StepKey::Query(name.to_owned())).unwrap();
        assert_eq!(step.status, 1, "query {name:?}");
    }
    assert_eq!(Summary::from_results(&results).exit_code(), 1);
}

#[tokio::test]
async fn test_failed_apply_without_queries_still_fails_unit() {
    let tree = TestTree::new();
    tree.file("foo", "variables.tf", BUCKET_TF);
    let log = CallLog::new();
    let orchestrator = tree.orchestrator(
        ScriptedProvisioner::new(&log).failing_apply("tests/foo"),
        ScriptedQueryRunner::new(&log),
    );

    let results = tree.run(&orchestrator, &["foo"]).await;

    assert!(results.get(&UnitId::new("tests/foo")).unwrap().failed());
}

#[tokio::test]
async fn test_failed_unit_makes_no_further_invocations() {
    // Given: the pretest query mismatches
    let tree = TestTree::new();
    tree.file("foo", "pretest-check-query.sql", "select 'pre'")
        .file("foo", "pretest-check-expected.json", r#"{"ok": true}"#)
        .file("foo", "variables.tf", BUCKET_TF)
        .file("foo", "query.sql", "select 'main'")
        .file("foo", "expected.json", "{}")
        .file("foo", "posttest-gone-query.sql", "select 'post'")
        .file("foo", "posttest-gone-expected.json", "{}");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    // When
    let results = tree.run(&orchestrator, &["foo"]).await;

    // Then: nothing after pretest was provisioned or queried
    assert_eq!(log.queries(), vec!["select 'pre'"]);
    assert!(!log.calls().iter().any(|c| matches!(c, Call::Init(_))));
    let unit = results.get(&UnitId::new("tests/foo")).unwrap();
    assert!(unit.failed());
    assert!(unit.phase(Phase::Test).is_none());
    assert!(unit.phase(Phase::Posttest).is_none());
}

#[tokio::test]
async fn test_mismatch_skips_remaining_queries_in_phase() {
    let tree = TestTree::new();
    tree.file("foo", "test-a-query.sql", "select 'a'")
        .file("foo", "test-a-expected.json", r#"{"a": 1}"#)
        .file("foo", "test-b-query.sql", "select 'b'")
        .file("foo", "test-b-expected.json", "{}");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    let results = tree.run(&orchestrator, &["foo"]).await;

    assert_eq!(log.queries(), vec!["select 'a'"]);
    let unit = results.get(&UnitId::new("tests/foo")).unwrap();
    assert!(unit.failed());
    let record = unit.phase(Phase::Test).unwrap();
    assert_eq!(record.get(&StepKey::Query("a".to_owned())).unwrap().status, 1);
    assert!(record.get(&StepKey::Query("b".to_owned())).is_none());
}

#[tokio::test]
async fn test_one_failing_unit_does_not_stop_the_others() {
    let tree = TestTree::new();
    tree.file("bad", "query.sql", "select 'bad'")
        .file("bad", "expected.json", r#"{"never": "matches"}"#)
        .file("good", "query.sql", "select 'good'")
        .file("good", "expected.json", "{}");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    let results = tree.run(&orchestrator, &[]).await;

    assert_eq!(log.queries(), vec!["select 'bad'", "select 'good'"]);
    let summary = Summary::from_results(&results);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failing, vec![UnitId::new("tests/bad")]);
    assert!(summary.aborted.is_none());
}
