//! `VerificationHarness` lifecycle tests against the fake cloud.
//!
//! The central guarantee: once staging succeeds, teardown runs exactly once
//! whatever the body does.

use std::future;
use std::path::PathBuf;
use std::time::Duration;

use tfprobe_cli::application::ports::StagedTemplate;
use tfprobe_cli::application::services::harness::{ProvisionedEnvironment, ScopeOptions};
use tfprobe_cli::domain::comparison::Expectation;
use tfprobe_cli::domain::coordinates::{AmbientEnv, ResourceCoordinates};
use tfprobe_cli::domain::error::{ConfigError, Interrupted, LiveQueryError, ProvisionError};
use tfprobe_common::{RunPhase, SnapshotField, TeardownStatus};

use crate::mocks::{DB_ID, DB_NAME, FailAt, FakeCloud, FakeHarness};

fn coords() -> ResourceCoordinates {
    ResourceCoordinates {
        subscription: String::new(),
        resource_group: "deb-test-devops".into(),
        server: "demo-eus-dev-000-dbs-001".into(),
        database: DB_NAME.into(),
    }
}

fn harness(cloud: &FakeCloud) -> FakeHarness<'_> {
    cloud.harness(AmbientEnv::with_subscription("sub-123"))
}

fn template() -> StagedTemplate {
    StagedTemplate::unmanaged(PathBuf::from("/tmp/tfprobe-fake"))
}

fn never() -> future::Pending<()> {
    future::pending()
}

#[tokio::test]
async fn test_happy_path_verifies_then_destroys_once() {
    let cloud = FakeCloud::new();
    let h = harness(&cloud);

    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), never(), |env| async move {
            let first = env.output("database_id")?;
            let second = env.output("database_id")?;
            assert_eq!(first, second, "outputs must be stable");
            Ok(first)
        })
        .await;

    assert_eq!(outcome.result.expect("body should succeed"), DB_ID);
    assert_eq!(outcome.reached, RunPhase::Verified);
    assert_eq!(outcome.teardown, TeardownStatus::Destroyed);
    assert_eq!(cloud.tool.calls(), vec!["init", "apply", "plan", "output", "destroy"]);
    assert_eq!(outcome.outputs.get("database_name").map(String::as_str), Some(DB_NAME));
}

#[tokio::test]
async fn test_resource_is_gone_after_teardown() {
    let cloud = FakeCloud::new();
    let h = harness(&cloud);

    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), never(), |_env| async {
            Err::<(), _>(anyhow::anyhow!("assertion failed on purpose"))
        })
        .await;
    assert!(outcome.result.is_err());
    assert_eq!(cloud.tool.count("destroy"), 1);

    let err = h.fetch_live(&coords()).await.expect_err("database should be gone");
    assert!(matches!(
        err.downcast_ref::<LiveQueryError>(),
        Some(LiveQueryError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn test_panicking_body_still_tears_down() {
    let cloud = FakeCloud::new();
    let h = harness(&cloud);

    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), never(), |env| async move {
            assert!(env.output("server_name").is_ok(), "boom in test body");
            Ok(())
        })
        .await;

    let err = outcome.result.expect_err("panic must surface as an error");
    assert!(format!("{err:#}").contains("boom in test body"), "got: {err:#}");
    assert_eq!(outcome.teardown, TeardownStatus::Destroyed);
    assert!(!cloud.exists());
}

#[tokio::test]
async fn test_failed_apply_still_attempts_destroy() {
    let cloud = FakeCloud::failing_at(FailAt::Apply);
    let h = harness(&cloud);

    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), never(), |_env| async { Ok(()) })
        .await;

    let err = outcome.result.expect_err("apply failure must propagate");
    assert!(format!("{err:#}").contains("apply exploded"), "diagnostics must be kept: {err:#}");
    assert_eq!(outcome.reached, RunPhase::Staged);
    assert_eq!(outcome.teardown, TeardownStatus::Destroyed);
    assert_eq!(cloud.tool.count("destroy"), 1);
    assert!(!cloud.exists());
}

#[tokio::test]
async fn test_failed_init_skips_destroy() {
    let cloud = FakeCloud::failing_at(FailAt::Init);
    let h = harness(&cloud);

    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), never(), |_env| async { Ok(()) })
        .await;

    assert!(outcome.result.is_err());
    assert_eq!(outcome.teardown, TeardownStatus::NotRequired);
    assert_eq!(cloud.tool.count("destroy"), 0);
    assert!(outcome.outputs.is_empty());
}

#[tokio::test]
async fn test_pending_changes_after_apply_fail_the_run() {
    let mut cloud = FakeCloud::new();
    cloud.tool.pending_plan = Some("~ update in-place".into());
    let h = harness(&cloud);

    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), never(), |_env| async { Ok(()) })
        .await;

    let err = outcome.result.expect_err("non-idempotent apply must fail");
    assert!(matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::NotIdempotent { .. })
    ));
    assert_eq!(outcome.teardown, TeardownStatus::Destroyed);
}

#[tokio::test]
async fn test_idempotency_check_can_be_disabled() {
    let mut cloud = FakeCloud::new();
    cloud.tool.pending_plan = Some("~ update in-place".into());
    let h = harness(&cloud);
    let opts = ScopeOptions {
        check_idempotent: false,
        ..ScopeOptions::default()
    };

    let outcome = h
        .with_environment(template(), vec![], &opts, never(), |_env| async { Ok(()) })
        .await;

    assert!(outcome.result.is_ok());
    assert_eq!(cloud.tool.count("plan"), 0);
}

#[tokio::test]
async fn test_timeout_bounds_body_but_not_teardown() {
    let cloud = FakeCloud::new();
    let h = harness(&cloud);
    let opts = ScopeOptions {
        verify_timeout: Some(Duration::from_millis(50)),
        ..ScopeOptions::default()
    };

    let outcome = h
        .with_environment(template(), vec![], &opts, never(), |_env| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;

    let err = outcome.result.expect_err("body should time out");
    assert!(err.to_string().contains("timed out"), "got: {err}");
    assert_eq!(outcome.reached, RunPhase::Provisioned);
    assert_eq!(outcome.teardown, TeardownStatus::Destroyed);
}

#[tokio::test]
async fn test_cancellation_still_tears_down() {
    let cloud = FakeCloud::new();
    let h = harness(&cloud);

    // Fires once provisioning (instant with fakes) is done and the body is parked.
    let cancel = tokio::time::sleep(Duration::from_millis(20));
    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), cancel, |_env| async {
            future::pending::<()>().await;
            Ok(())
        })
        .await;

    let err = outcome.result.expect_err("cancelled run must fail");
    assert!(err.to_string().contains("cancelled"), "got: {err}");
    assert_eq!(outcome.teardown, TeardownStatus::Destroyed);
    assert!(!cloud.exists());
}

#[tokio::test]
async fn test_timeout_during_apply_lets_apply_finish_before_destroy() {
    let mut cloud = FakeCloud::new();
    cloud.tool.apply_duration = Some(Duration::from_millis(100));
    let h = harness(&cloud);
    let opts = ScopeOptions {
        verify_timeout: Some(Duration::from_millis(10)),
        ..ScopeOptions::default()
    };

    let outcome = h
        .with_environment(template(), vec![], &opts, never(), |_env| async { Ok(()) })
        .await;

    let err = outcome.result.expect_err("deadline passed during apply");
    assert!(matches!(
        err.downcast_ref::<Interrupted>(),
        Some(Interrupted::TimedOut(_))
    ));
    assert_eq!(cloud.tool.calls(), vec!["init", "apply", "apply-finished", "destroy"]);
    assert_eq!(outcome.reached, RunPhase::Staged);
    assert_eq!(outcome.teardown, TeardownStatus::Destroyed);
    assert!(!cloud.exists());
}

#[tokio::test]
async fn test_cancel_during_apply_lets_apply_finish_before_destroy() {
    let mut cloud = FakeCloud::new();
    cloud.tool.apply_duration = Some(Duration::from_millis(100));
    let h = harness(&cloud);

    let cancel = tokio::time::sleep(Duration::from_millis(10));
    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), cancel, |_env| async { Ok(()) })
        .await;

    let err = outcome.result.expect_err("cancelled during apply");
    assert!(matches!(err.downcast_ref::<Interrupted>(), Some(Interrupted::Cancelled)));
    assert_eq!(cloud.tool.calls(), vec!["init", "apply", "apply-finished", "destroy"]);
    assert_eq!(outcome.teardown, TeardownStatus::Destroyed);
}

#[tokio::test]
async fn test_teardown_runs_at_most_once() {
    let cloud = FakeCloud::new();
    let h = harness(&cloud);
    let mut env = ProvisionedEnvironment::new(template(), vec![]);

    h.provision(&mut env, true).await.expect("provision");
    let first = h.teardown(&mut env).await;
    let second = h.teardown(&mut env).await;

    assert_eq!(first, TeardownStatus::Destroyed);
    assert_eq!(second, first);
    assert_eq!(cloud.tool.count("destroy"), 1);
}

#[tokio::test]
async fn test_failed_destroy_is_reported_with_diagnostics() {
    let cloud = FakeCloud::failing_at(FailAt::Destroy);
    let h = harness(&cloud);

    let outcome = h
        .with_environment(template(), vec![], &ScopeOptions::default(), never(), |_env| async { Ok(()) })
        .await;

    assert!(outcome.result.is_ok());
    match outcome.teardown {
        TeardownStatus::Failed { diagnostics } => assert!(diagnostics.contains("destroy exploded")),
        other => panic!("expected failed teardown, got {other:?}"),
    }
    assert!(cloud.exists(), "resources remain after a failed destroy");
}

#[tokio::test]
async fn test_output_lookup_reports_missing_key() {
    let cloud = FakeCloud::new();
    let h = harness(&cloud);
    let mut env = ProvisionedEnvironment::new(template(), vec![]);

    assert!(h.output(&env, "database_id").is_err(), "not provisioned yet");
    h.provision(&mut env, true).await.expect("provision");
    assert_eq!(h.output(&env, "database_name").expect("declared"), DB_NAME);

    let err = h.output(&env, "server_name").expect_err("undeclared output");
    assert!(err.to_string().contains("server_name"), "got: {err}");
    h.teardown(&mut env).await;
}

#[tokio::test]
async fn test_ambient_subscription_wins_over_explicit_empty() {
    let cloud = FakeCloud::new();
    *cloud.exists.lock().expect("mutex poisoned") = true;
    let h = harness(&cloud);

    h.fetch_live(&coords()).await.expect("database exists");
    let queried = cloud.inspector.queried();
    assert_eq!(queried.len(), 1);
    assert_eq!(queried[0].subscription, "sub-123");
}

#[tokio::test]
async fn test_explicit_subscription_wins_over_ambient() {
    let cloud = FakeCloud::new();
    *cloud.exists.lock().expect("mutex poisoned") = true;
    let h = harness(&cloud);
    let explicit = ResourceCoordinates {
        subscription: "sub-explicit".into(),
        ..coords()
    };

    h.fetch_live(&explicit).await.expect("database exists");
    assert_eq!(cloud.inspector.queried()[0].subscription, "sub-explicit");
}

#[tokio::test]
async fn test_missing_subscription_fails_before_querying() {
    let cloud = FakeCloud::new();
    let h = cloud.harness(AmbientEnv::default());

    let err = h.fetch_live(&coords()).await.expect_err("no subscription anywhere");
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::MissingSubscription)
    ));
    assert!(cloud.inspector.queried().is_empty());
}

#[tokio::test]
async fn test_exact_match_semantics() {
    let cloud = FakeCloud::new();
    *cloud.exists.lock().expect("mutex poisoned") = true;
    let h = harness(&cloud);
    let snapshot = h.fetch_live(&coords()).await.expect("database exists");

    let matching = h.assert(&[Expectation::new(SnapshotField::Name, DB_NAME)], &snapshot);
    assert_eq!(matching.mismatch_count(), 0);

    let mut other = snapshot.clone();
    other.name = "Y".into();
    let report = h.assert(&[Expectation::new(SnapshotField::Name, "X")], &other);
    assert_eq!(report.mismatch_count(), 1);
    assert_eq!(report.mismatches().next().map(|c| c.field.as_str()), Some("name"));
}

#[tokio::test]
async fn test_progress_is_reported_through_the_port() {
    let cloud = FakeCloud::new();
    let h = harness(&cloud);

    let _ = h
        .with_environment(template(), vec![], &ScopeOptions::default(), never(), |_env| async { Ok(()) })
        .await;

    let events = cloud.reporter.events();
    assert!(events.iter().any(|e| e == "ok: template applied"), "got: {events:?}");
    assert!(events.iter().any(|e| e == "ok: resources destroyed"), "got: {events:?}");
}
