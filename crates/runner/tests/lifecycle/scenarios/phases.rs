//! Per-unit phase behavior: provisioning, queries, comparison.

use serde_json::json;

use tint_core::types::{Phase, ProvisionStep, StepKey, UnitId};
use tint_runner::Summary;

use crate::helpers::collaborators::{Call, CallLog, ScriptedProvisioner, ScriptedQueryRunner};
use crate::helpers::tree::TestTree;

const BUCKET_TF: &str = "resource \"aws_s3_bucket\" \"named_test_resource\" {}\n";

#[tokio::test]
async fn test_matching_query_passes() {
    // Given: a test whose query returns exactly the expected document
    let tree = TestTree::new();
    tree.file("foo", "variables.tf", BUCKET_TF)
        .file("foo", "query.sql", "select name from aws_s3_bucket")
        .file("foo", "expected.json", r#"[{"name": "bucket"}]"#);
    let log = CallLog::new();
    let orchestrator = tree.orchestrator(
        ScriptedProvisioner::new(&log),
        ScriptedQueryRunner::new(&log).answer("aws_s3_bucket", r#"[{"name":"bucket"}]"#),
    );

    // When
    let results = tree.run(&orchestrator, &["foo"]).await;

    // Then: the query step records status 0 and the unit passes
    let unit = results.get(&UnitId::new("tests/foo")).unwrap();
    assert!(!unit.failed());
    let query = unit
        .phase(Phase::Test)
        .and_then(|r| r.get(&StepKey::Query(String::new())))
        .unwrap();
    assert_eq!(query.status, 0);
    assert_eq!(query.output, json!([{"name": "bucket"}]));

    let summary = Summary::from_results(&results);
    assert!(summary.all_passed());
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_mismatching_query_fails_unit() {
    let tree = TestTree::new();
    tree.file("foo", "query.sql", "select name from aws_s3_bucket")
        .file("foo", "expected.json", r#"[{"name": "bucket"}]"#);
    let log = CallLog::new();
    let orchestrator = tree.orchestrator(
        ScriptedProvisioner::new(&log),
        ScriptedQueryRunner::new(&log).answer("aws_s3_bucket", r#"[{"name":"other"}]"#),
    );

    let results = tree.run(&orchestrator, &["foo"]).await;

    let unit = results.get(&UnitId::new("tests/foo")).unwrap();
    assert!(unit.failed());
    let query = unit
        .phase(Phase::Test)
        .and_then(|r| r.get(&StepKey::Query(String::new())))
        .unwrap();
    assert_eq!(query.status, 1);

    let summary = Summary::from_results(&results);
    assert_eq!(summary.failing, vec![UnitId::new("tests/foo")]);
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn test_zero_config_files_skips_provisioning() {
    // Given: queries but no provisioner configuration
    let tree = TestTree::new();
    tree.file("foo", "query.sql", "select 1")
        .file("foo", "expected.json", "{}");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    // When
    let results = tree.run(&orchestrator, &["foo"]).await;

    // Then: only the query ran, and it passed
    assert!(log.calls().iter().all(Call::is_query));
    assert_eq!(log.queries(), vec!["select 1"]);
    let unit = results.get(&UnitId::new("tests/foo")).unwrap();
    assert!(!unit.failed());
    let record = unit.phase(Phase::Test).unwrap();
    assert!(record.get(&StepKey::Provision(ProvisionStep::Init)).is_none());
}

#[tokio::test]
async fn test_phase_files_are_routed_to_their_phase() {
    let tree = TestTree::new();
    tree.file("foo", "pretest-variables.tf", BUCKET_TF)
        .file("foo", "pretest-check-query.sql", "select 'pre'")
        .file("foo", "pretest-check-expected.json", "{}")
        .file("foo", "posttest-gone-query.sql", "select 'post'")
        .file("foo", "posttest-gone-expected.json", "{}")
        .file("foo", "query.sql", "select 'main'")
        .file("foo", "expected.json", "{}");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    let results = tree.run(&orchestrator, &["foo"]).await;

    // Provisioned in pretest only, queries in phase order
    let inits: Vec<Call> = log
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Init(_)))
        .collect();
    assert_eq!(inits, vec![Call::Init(tree.phase_dir("foo", "pretest"))]);
    assert_eq!(
        log.queries(),
        vec!["select 'pre'", "select 'main'", "select 'post'"]
    );

    let unit = results.get(&UnitId::new("tests/foo")).unwrap();
    assert!(!unit.failed());
    assert!(
        unit.phase(Phase::Pretest)
            .unwrap()
            .get(&StepKey::Query("check".to_owned()))
            .is_some()
    );
    assert!(
        unit.phase(Phase::Posttest)
            .unwrap()
            .get(&StepKey::Query("gone".to_owned()))
            .is_some()
    );
}

#[tokio::test]
async fn test_provisioner_outputs_feed_query_templates() {
    // Given: the provisioner reports a resource name
    let tree = TestTree::new();
    tree.file("foo", "variables.tf", BUCKET_TF)
        .file(
            "foo",
            "query.sql",
            "select name from aws_s3_bucket\nwhere name = '{{ resourceName }}'",
        )
        .file("foo", "expected.json", r#"[{"name": "{{ output.bucket.value }}"}]"#);
    let log = CallLog::new();
    let outputs = json!({
        "resource_id": {"value": "arn:aws:s3:::bucket-42"},
        "resource_name": {"value": "bucket-42"},
        "bucket": {"value": "bucket-42"}
    });
    let orchestrator = tree.orchestrator(
        ScriptedProvisioner::new(&log).with_outputs(outputs),
        ScriptedQueryRunner::new(&log).answer("bucket-42", r#"[{"name":"bucket-42"}]"#),
    );

    // When
    let results = tree.run(&orchestrator, &["foo"]).await;

    // Then: the rendered single-line query reached the runner and matched
    assert_eq!(
        log.queries(),
        vec!["select name from aws_s3_bucket where name = 'bucket-42'"]
    );
    let unit = results.get(&UnitId::new("tests/foo")).unwrap();
    assert!(!unit.failed());
    assert_eq!(unit.resource_id(), Some(&json!("arn:aws:s3:::bucket-42")));
    assert_eq!(unit.resource_name(), Some(&json!("bucket-42")));
}

#[tokio::test]
async fn test_every_unit_shares_the_run_resource_names() {
    let tree = TestTree::new();
    tree.file("bar", "variables.tf", BUCKET_TF)
        .file("foo", "variables.tf", BUCKET_TF)
        .file("foo", "dependencies.txt", "../bar");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    tree.run(&orchestrator, &["foo"]).await;

    let resource_name = |n: usize| {
        log.env_of(n)
            .into_iter()
            .find(|(k, _)| k == "TF_VAR_resource_name")
            .map(|(_, v)| v)
            .unwrap()
    };
    let first = log.position(|c| matches!(c, Call::Apply(_))).unwrap();
    let last = log
        .calls()
        .iter()
        .rposition(|c| matches!(c, Call::Apply(_)))
        .unwrap();
    assert_ne!(first, last);
    assert!(resource_name(first).starts_with("steampipetest"));
    assert_eq!(resource_name(first), resource_name(last));
}
