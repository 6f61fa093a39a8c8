//! `run_verification` end to end against the fake cloud.

use std::future;

use tfprobe_cli::application::services::harness::ScopeOptions;
use tfprobe_cli::application::services::verify::{LIVE_CASE, run_verification};
use tfprobe_cli::domain::config::HarnessConfig;
use tfprobe_cli::domain::coordinates::AmbientEnv;
use tfprobe_common::{FieldValue, RunPhase, SENSITIVE_PLACEHOLDER, TeardownStatus};

use crate::mocks::FakeCloud;

const CONFIG: &str = r"
template_dir: /repo
var_files: [/repo/tests/demo.tfvars]
resource:
  subscription: ''
  resource_group: deb-test-devops
  server: demo-eus-dev-000-dbs-001
  database: demo-eus-dev-000-db-002
expect:
  id: { output: database_id }
  name: { output: database_name }
  zone_redundant: false
outputs:
  database_name: demo-eus-dev-000-db-002
report: [type, zone_redundant]
";

fn config(yaml: &str) -> HarnessConfig {
    serde_yaml::from_str(yaml).expect("valid config")
}

#[tokio::test]
async fn test_matching_deployment_passes() {
    let cloud = FakeCloud::new();
    let h = cloud.harness(AmbientEnv::with_subscription("sub-123"));

    let summary = run_verification(&h, &config(CONFIG), ScopeOptions::default(), future::pending()).await;

    assert!(summary.succeeded(), "{summary:?}");
    assert_eq!(summary.reached, RunPhase::Verified);
    assert_eq!(summary.report.checks.len(), 4);
    assert_eq!(summary.teardown, TeardownStatus::Destroyed);
    assert_eq!(
        summary.snapshot.as_ref().map(|s| s.name.as_str()),
        Some("demo-eus-dev-000-db-002")
    );
    assert_eq!(cloud.inspector.queried()[0].subscription, "sub-123");
    assert!(!cloud.exists());
}

#[tokio::test]
async fn test_field_mismatch_fails_but_tears_down() {
    let cloud = FakeCloud::new();
    let h = cloud.harness(AmbientEnv::with_subscription("sub-123"));
    let cfg = config(&CONFIG.replace("zone_redundant: false", "zone_redundant: true"));

    let summary = run_verification(&h, &cfg, ScopeOptions::default(), future::pending()).await;

    assert!(!summary.succeeded());
    assert!(summary.error.is_none());
    let failed: Vec<&str> = summary.report.mismatches().map(|c| c.field.as_str()).collect();
    assert_eq!(failed, vec!["zone_redundant"]);
    assert_eq!(summary.teardown, TeardownStatus::Destroyed);
}

#[tokio::test]
async fn test_output_literal_mismatch_is_reported() {
    let cloud = FakeCloud::new();
    let h = cloud.harness(AmbientEnv::with_subscription("sub-123"));
    let cfg = config(&CONFIG.replace(
        "database_name: demo-eus-dev-000-db-002",
        "database_name: some-other-db",
    ));

    let summary = run_verification(&h, &cfg, ScopeOptions::default(), future::pending()).await;

    assert!(!summary.succeeded());
    let failed: Vec<&str> = summary.report.mismatches().map(|c| c.field.as_str()).collect();
    assert_eq!(failed, vec!["output.database_name"]);
}

#[tokio::test]
async fn test_staging_failure_provisions_nothing() {
    let mut cloud = FakeCloud::new();
    cloud.stager.fail = true;
    let h = cloud.harness(AmbientEnv::with_subscription("sub-123"));

    let summary = run_verification(&h, &config(CONFIG), ScopeOptions::default(), future::pending()).await;

    assert_eq!(summary.reached, RunPhase::Unstaged);
    assert_eq!(summary.teardown, TeardownStatus::NotRequired);
    assert!(summary.error.as_deref().is_some_and(|e| e.contains("not readable")));
    assert!(cloud.tool.calls().is_empty());
}

#[tokio::test]
async fn test_missing_subscription_fails_live_case_only() {
    let cloud = FakeCloud::new();
    let h = cloud.harness(AmbientEnv::default());

    let summary = run_verification(&h, &config(CONFIG), ScopeOptions::default(), future::pending()).await;

    let error = summary.error.as_deref().expect("live case error");
    assert!(error.starts_with(LIVE_CASE), "got: {error}");
    assert!(error.contains("No subscription configured"), "got: {error}");
    // The outputs case still ran and passed.
    assert_eq!(summary.report.checks.len(), 1);
    assert_eq!(summary.reached, RunPhase::Provisioned);
    assert_eq!(summary.teardown, TeardownStatus::Destroyed);
    assert!(cloud.inspector.queried().is_empty());
}

#[tokio::test]
async fn test_undeclared_output_reference_is_an_error() {
    let cloud = FakeCloud::new();
    let h = cloud.harness(AmbientEnv::with_subscription("sub-123"));
    let cfg = config(&CONFIG.replace("{ output: database_id }", "{ output: db_id }"));

    let summary = run_verification(&h, &cfg, ScopeOptions::default(), future::pending()).await;

    let error = summary.error.as_deref().expect("undeclared output");
    assert!(error.contains("db_id"), "got: {error}");
    assert_eq!(summary.teardown, TeardownStatus::Destroyed);
}

#[tokio::test]
async fn test_report_fields_are_logged_without_checks() {
    let cloud = FakeCloud::new();
    let h = cloud.harness(AmbientEnv::with_subscription("sub-123"));
    let cfg = config(
        r"
template_dir: /repo
resource:
  subscription: sub-explicit
  resource_group: deb-test-devops
  server: demo-eus-dev-000-dbs-001
  database: demo-eus-dev-000-db-002
outputs:
  database_name: demo-eus-dev-000-db-002
report: [type]
",
    );

    let summary = run_verification(&h, &cfg, ScopeOptions::default(), future::pending()).await;

    assert!(summary.succeeded(), "{summary:?}");
    assert!(summary.snapshot.is_some(), "report-only fields still query the API");
    assert_eq!(summary.report.checks.len(), 1);
    assert_eq!(cloud.inspector.queried()[0].subscription, "sub-explicit");
}

#[tokio::test]
async fn test_sensitive_outputs_are_masked_in_every_check() {
    let mut cloud = FakeCloud::new();
    cloud.tool.sensitive = vec!["database_name".into()];
    let h = cloud.harness(AmbientEnv::with_subscription("sub-123"));
    let cfg = config(&CONFIG.replace(
        "database_name: demo-eus-dev-000-db-002",
        "database_name: some-other-db",
    ));

    let summary = run_verification(&h, &cfg, ScopeOptions::default(), future::pending()).await;

    let masked = FieldValue::from(SENSITIVE_PLACEHOLDER);
    let by_field = |name: &str| {
        summary
            .report
            .checks
            .iter()
            .find(|c| c.field == name)
            .expect("check present")
    };
    let output_check = by_field("output.database_name");
    assert!(!output_check.passed, "verdict survives masking");
    assert_eq!(output_check.expected, masked);
    assert_eq!(output_check.actual.as_ref(), Some(&masked));
    let live_check = by_field("name");
    assert!(live_check.passed);
    assert_eq!(live_check.expected, masked);
    assert_ne!(by_field("id").expected, masked);

    assert_eq!(summary.outputs["database_name"], SENSITIVE_PLACEHOLDER);
    let json = serde_json::to_value(live_check).expect("serializes");
    assert_eq!(json["expected"], SENSITIVE_PLACEHOLDER);
    assert_eq!(json["actual"], SENSITIVE_PLACEHOLDER);
    let report = serde_json::to_string(&summary.report).expect("serializes");
    assert!(!report.contains("some-other-db"), "got: {report}");
}
