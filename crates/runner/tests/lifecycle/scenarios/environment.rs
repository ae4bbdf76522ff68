//! Run environment: resource names and per-test env files.

use tint_core::event::RunEvent;

use crate::helpers::collaborators::{Call, CallLog, ScriptedProvisioner, ScriptedQueryRunner};
use crate::helpers::tree::{TestTree, drain};

const BUCKET_TF: &str = "resource \"aws_s3_bucket\" \"named_test_resource\" {}\n";

fn lookup<'a>(env: &'a [(String, String)], name: &str) -> Option<&'a str> {
    env.iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[tokio::test]
async fn test_external_resource_name_wins_over_generated() {
    // Given: the caller pins the primary resource name
    let tree = TestTree::new();
    tree.file("foo", "variables.tf", BUCKET_TF);
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    // When
    tree.run_with_env(
        &orchestrator,
        &["foo"],
        vec![("TURBOT_TEST_RESOURCE_NAME".to_owned(), "pinned".to_owned())],
    )
    .await;

    // Then: the pinned name is passed on, the others are generated
    let apply = log.position(|c| matches!(c, Call::Apply(_))).unwrap();
    let env = log.env_of(apply);
    assert_eq!(lookup(&env, "TF_VAR_resource_name"), Some("pinned"));
    assert_eq!(lookup(&env, "TURBOT_TEST_RESOURCE_NAME"), Some("pinned"));
    assert!(
        lookup(&env, "TF_VAR_resource_name_1")
            .unwrap()
            .starts_with("steampipetest")
    );
}

#[tokio::test]
async fn test_env_file_variables_reach_queries() {
    let tree = TestTree::new();
    tree.file("foo", ".env.staging", "TURBOT_TEST_REGION=us-east-1\n")
        .file("foo", "query.sql", "select 1")
        .file("foo", "expected.json", "{}");
    let log = CallLog::new();
    let (orchestrator, events) =
        tree.orchestrator_with_events(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    tree.run(&orchestrator, &["foo"]).await;
    drop(orchestrator);
    let events = drain(events).await;

    let env = log.env_of(0);
    assert_eq!(lookup(&env, "TURBOT_TEST_REGION"), Some("us-east-1"));
    assert!(lookup(&env, "TF_VAR_resource_name").is_none());
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::CustomEnv { name, value }
            if name == "TURBOT_TEST_REGION" && value == "us-east-1"
    )));
}

#[tokio::test]
async fn test_env_file_does_not_override_inherited_values() {
    let tree = TestTree::new();
    tree.file("foo", ".env.staging", "TURBOT_TEST_REGION=us-east-1\n")
        .file("foo", "query.sql", "select 1")
        .file("foo", "expected.json", "{}");
    let log = CallLog::new();
    let orchestrator =
        tree.orchestrator(ScriptedProvisioner::new(&log), ScriptedQueryRunner::new(&log));

    tree.run_with_env(
        &orchestrator,
        &["foo"],
        vec![("TURBOT_TEST_REGION".to_owned(), "eu-west-1".to_owned())],
    )
    .await;

    // Inherited variables reach children through the process environment,
    // so only an override would show up here.
    let env = log.env_of(0);
    assert!(lookup(&env, "TURBOT_TEST_REGION").is_none());
}
