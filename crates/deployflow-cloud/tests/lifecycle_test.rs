//! Lifecycle integration tests against an in-memory control plane

mod common;

use common::{Fault, Fixture, Harness, ManualClock};
use deployflow_cloud::{
    ApiError, DeploymentError, FileStateStore, LifecycleState, RetryConfig, StateStore,
};
use deployflow_core::Block;
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "prod";

fn single_attempt() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_search_with_apm() {
    let h = Harness::new();
    h.api.set_pending_polls(2);

    let state = h
        .controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();

    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(state.id.as_deref(), Some("d1"));
    let flat = &state.attributes;
    assert_eq!(flat.attr("name").as_deref(), Some("test-1"));
    assert_eq!(flat.attr("elasticsearch.#").as_deref(), Some("1"));
    assert_eq!(flat.attr("apm.#").as_deref(), Some("1"));
    assert_eq!(
        flat.attr("elasticsearch.0.topology.0.memory_per_node").as_deref(),
        Some("1g")
    );
    for kind in ["elasticsearch", "apm"] {
        assert!(flat.attr(&format!("{}.0.http_endpoint", kind)).is_some());
        assert!(flat.attr(&format!("{}.0.https_endpoint", kind)).is_some());
    }

    assert_eq!(flat.attr("elasticsearch_username").as_deref(), Some("elastic"));
    assert_eq!(flat.attr("elasticsearch_password").as_deref(), Some("secret-d1"));
    assert_eq!(flat.attr("apm_secret_token").as_deref(), Some("token-d1"));
    assert_eq!(state.request_id(), None);

    assert_eq!(h.api.calls().create, 1);
    assert_eq!(
        h.clock.sleeps(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert_eq!(h.store.load(KEY).await.unwrap(), Some(state));
}

#[tokio::test]
async fn test_update_topology_debug_flag() {
    let h = Harness::new();
    let fixture = Fixture::default();
    h.controller
        .create(KEY, &fixture.apm_debug("test-1", false, false))
        .await
        .unwrap();

    let desired = fixture.apm_debug("test-1", false, true);
    let state = h.controller.update(KEY, &desired).await.unwrap();

    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(
        state.attributes.attr("apm.0.config.0.debug_enabled").as_deref(),
        Some("false")
    );
    assert_eq!(
        state
            .attributes
            .attr("apm.0.topology.0.config.0.debug_enabled")
            .as_deref(),
        Some("true")
    );
    assert_eq!(h.api.calls().update, 1);
    assert!(h.api.last_update().unwrap().prune_orphans);

    // Credentials survive the read that follows the update
    assert_eq!(
        state.attributes.attr("elasticsearch_password").as_deref(),
        Some("secret-d1")
    );

    let again = h.controller.update(KEY, &desired).await.unwrap();
    assert_eq!(h.api.calls().update, 1);
    assert_eq!(again.attributes, state.attributes);
}

#[tokio::test]
async fn test_update_timeout_guides_resuming_the_update() {
    let h = Harness::new();
    let fixture = Fixture::default();
    h.controller
        .create(KEY, &fixture.apm_debug("test-1", false, false))
        .await
        .unwrap();

    h.api.set_pending_polls(1000);
    let err = h
        .controller
        .update(KEY, &fixture.apm_debug("test-1", false, true))
        .await
        .unwrap_err();
    assert_eq!(err.prefix(), "failed tracking update progress");

    let request_id = err.resume_request_id().unwrap().to_string();
    let message = err.to_string();
    assert!(message.contains(&format!(
        "set \"request_id\" to \"{}\" to resume the pending update",
        request_id
    )));
    assert!(!message.contains("recreate"));
}

#[tokio::test]
async fn test_reformatted_json_settings_need_no_update() {
    let h = Harness::new();
    let fixture = Fixture::default();
    let mut desired = fixture.apm_debug("test-1", false, false);
    desired
        .set_path("apm.0.config.0.user_settings_json", r#"{ "b": 1,  "a": 2 }"#)
        .unwrap();

    let state = h.controller.create(KEY, &desired).await.unwrap();
    assert_eq!(
        state.attributes.attr("apm.0.config.0.user_settings_json").as_deref(),
        Some(r#"{"a":2,"b":1}"#)
    );

    desired
        .set_path("apm.0.config.0.user_settings_json", r#"{"a":2,"b":1}"#)
        .unwrap();
    h.controller.update(KEY, &desired).await.unwrap();
    assert_eq!(h.api.calls().update, 0);
}

#[tokio::test]
async fn test_create_resumes_accepted_request() {
    let h = Harness::with_retry(single_attempt());
    h.api.fail_create(Fault::AfterAccept(ApiError::Unavailable(
        "connection reset".into(),
    )));
    let desired = Fixture::default().search_with_apm("test-1");

    let err = h.controller.create(KEY, &desired).await.unwrap_err();
    assert_eq!(err.prefix(), "failed creating deployment");
    let request_id = err.resume_request_id().unwrap().to_string();
    assert_eq!(request_id.len(), 64);
    assert!(err
        .to_string()
        .contains(&format!("set \"request_id\" to \"{}\"", request_id)));

    let failed = h.controller.state(KEY).await.unwrap();
    assert_eq!(failed.lifecycle, LifecycleState::Failed);
    assert_eq!(failed.id, None);
    assert_eq!(failed.request_id(), Some(request_id.as_str()));
    assert_eq!(h.api.deployment_count(), 1);

    let state = h.controller.create(KEY, &desired).await.unwrap();
    assert_eq!(state.id.as_deref(), Some("d1"));
    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(h.api.deployment_count(), 1);
    assert_eq!(h.api.calls().create, 2);
    assert_eq!(
        state.attributes.attr("elasticsearch_password").as_deref(),
        Some("secret-d1")
    );
}

#[tokio::test]
async fn test_explicit_request_id_reaches_existing_deployment() {
    let h = Harness::with_retry(single_attempt());
    h.api.fail_create(Fault::AfterAccept(ApiError::Server {
        status: 502,
        message: "bad gateway".into(),
    }));
    let mut desired = Fixture::default().search_with_apm("test-1");
    let err = h.controller.create(KEY, &desired).await.unwrap_err();
    let request_id = err.resume_request_id().unwrap().to_string();

    // Local state lost, the caller supplies the request ID instead
    let store = Arc::new(deployflow_cloud::MemoryStateStore::new());
    let controller = common::controller(h.api.clone(), store, ManualClock::new());
    desired.insert("request_id", request_id.as_str());

    let state = controller.create(KEY, &desired).await.unwrap();
    assert_eq!(state.id.as_deref(), Some("d1"));
    assert_eq!(h.api.deployment_count(), 1);
}

#[tokio::test]
async fn test_read_missing_deployment_marks_deleted() {
    let h = Harness::new();
    h.controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();
    h.api.forget("d1");

    let state = h.controller.read(KEY).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Deleted);
    assert_eq!(state.id, None);
    assert!(state.attributes.is_empty());
}

#[tokio::test]
async fn test_read_stopped_deployment_marks_deleted() {
    let h = Harness::new();
    h.controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();
    h.api.stop("d1");

    let state = h.controller.read(KEY).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Deleted);
    assert!(state.attributes.is_empty());
}

#[tokio::test]
async fn test_read_without_deployment_is_noop() {
    let h = Harness::new();
    let state = h.controller.read(KEY).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Absent);
    assert_eq!(h.api.calls().get, 0);
}

#[tokio::test]
async fn test_read_waits_out_rate_limit() {
    let h = Harness::new();
    h.controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();
    h.api.fail_get(ApiError::RateLimited {
        retry_after: Some(Duration::from_secs(5)),
    });

    let state = h.controller.read(KEY).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(h.clock.sleeps().last(), Some(&Duration::from_secs(5)));
}

#[tokio::test]
async fn test_read_failure_keeps_state() {
    let h = Harness::new();
    let created = h
        .controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();
    for _ in 0..3 {
        h.api.fail_get(ApiError::Unavailable("down".into()));
    }

    let err = h.controller.read(KEY).await.unwrap_err();
    assert_eq!(err.prefix(), "failed reading deployment");
    assert!(matches!(err.primary(), Some(DeploymentError::Remote { .. })));
    assert_eq!(h.controller.state(KEY).await.unwrap(), created);
}

#[tokio::test]
async fn test_plan_timeout_can_be_resumed() {
    let h = Harness::new();
    h.api.set_pending_polls(1000);
    let desired = Fixture::default().search_with_apm("test-1");

    let err = h.controller.create(KEY, &desired).await.unwrap_err();
    assert_eq!(err.prefix(), "failed tracking create progress");
    assert!(matches!(
        err.primary(),
        Some(DeploymentError::PlanTimeout { .. })
    ));
    assert_eq!(h.clock.elapsed(), Duration::from_secs(60));

    let pending = h.controller.state(KEY).await.unwrap();
    assert_eq!(pending.lifecycle, LifecycleState::Creating);
    assert_eq!(pending.id.as_deref(), Some("d1"));
    assert_eq!(pending.request_id(), err.resume_request_id());
    // Captured before waiting
    assert_eq!(
        pending.attributes.attr("apm_secret_token").as_deref(),
        Some("token-d1")
    );

    h.api.finish_plans("d1");
    let state = h.controller.create(KEY, &desired).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(h.api.deployment_count(), 1);
}

#[tokio::test]
async fn test_resumed_create_keeps_recorded_credentials() {
    let h = Harness::new();
    h.api.set_pending_polls(1000);
    h.api.replay_without_secrets();
    let desired = Fixture::default().search_with_apm("test-1");

    h.controller.create(KEY, &desired).await.unwrap_err();
    h.api.finish_plans("d1");

    let state = h.controller.create(KEY, &desired).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(
        state.attributes.attr("elasticsearch_password").as_deref(),
        Some("secret-d1")
    );
    assert_eq!(
        state.attributes.attr("apm_secret_token").as_deref(),
        Some("token-d1")
    );
    assert_eq!(h.api.calls().reset, 0);
    assert_eq!(h.api.calls().create, 2);
}

#[tokio::test]
async fn test_plan_failure_reports_diagnostics() {
    let h = Harness::new();
    h.api.fail_next_plan("out of capacity");
    let desired = Fixture::default().search_with_apm("test-1");

    let err = h.controller.create(KEY, &desired).await.unwrap_err();
    assert_eq!(err.prefix(), "failed tracking create progress");
    assert_eq!(err.resume_request_id(), None);
    let message = err.to_string();
    assert!(message.contains("elasticsearch main-elasticsearch: allocate: out of capacity"));
    assert!(message.contains("(request_id \""));

    let failed = h.controller.state(KEY).await.unwrap();
    assert_eq!(failed.lifecycle, LifecycleState::Failed);
    assert_eq!(failed.id.as_deref(), Some("d1"));

    let err = h.controller.create(KEY, &desired).await.unwrap_err();
    assert!(matches!(
        err.primary(),
        Some(DeploymentError::InvalidTransition { .. })
    ));

    let state = h.controller.update(KEY, &desired).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(h.api.deployment_count(), 1);
}

#[tokio::test]
async fn test_terminal_rejection_is_not_retried() {
    let h = Harness::new();
    h.api.fail_create(Fault::BeforeAccept(ApiError::Rejected {
        status: 400,
        message: "unknown instance configuration".into(),
    }));

    let err = h
        .controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap_err();
    assert_eq!(err.errors().len(), 1);
    assert_eq!(err.resume_request_id(), None);
    assert!(err.to_string().contains("unknown instance configuration"));
    assert_eq!(h.api.calls().create, 1);
    assert_eq!(h.api.deployment_count(), 0);
    assert_eq!(
        h.controller.state(KEY).await.unwrap().lifecycle,
        LifecycleState::Failed
    );
}

#[tokio::test]
async fn test_transient_submission_failures_are_retried() {
    let h = Harness::new();
    for _ in 0..2 {
        h.api
            .fail_create(Fault::BeforeAccept(ApiError::Unavailable("reset".into())));
    }

    let state = h
        .controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(h.api.calls().create, 3);
    assert_eq!(
        h.clock.sleeps()[..2],
        [Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test]
async fn test_validation_failure_makes_no_remote_call() {
    let h = Harness::new();
    let desired: Block = serde_yaml::from_str(
        r#"
name: test-1
region: us-east-1
version: "7.10.1"
kibana:
  - {}
"#,
    )
    .unwrap();

    let err = h.controller.create(KEY, &desired).await.unwrap_err();
    assert!(matches!(
        err.primary(),
        Some(DeploymentError::Validation(_))
    ));
    assert_eq!(h.api.calls(), common::CallCounts::default());
    assert_eq!(h.store.load(KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_credentials_are_reset() {
    let h = Harness::new();
    h.api.withhold_credentials();
    h.api.support_password_reset();

    let state = h
        .controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();
    assert_eq!(
        state.attributes.attr("elasticsearch_password").as_deref(),
        Some("reset-d1")
    );
    assert_eq!(h.api.calls().reset, 1);
}

#[tokio::test]
async fn test_missing_credentials_fail_create() {
    let h = Harness::new();
    h.api.withhold_credentials();

    let err = h
        .controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap_err();
    assert_eq!(err.prefix(), "failed creating deployment");
    assert!(matches!(
        err.primary(),
        Some(DeploymentError::CredentialExtraction { .. })
    ));

    let state = h.controller.state(KEY).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(state.attributes.attr("elasticsearch_password"), None);
    assert_eq!(
        state.attributes.attr("apm_secret_token").as_deref(),
        Some("token-d1")
    );
}

#[tokio::test]
async fn test_poll_errors_exhausted() {
    let h = Harness::new();
    for _ in 0..3 {
        h.api.fail_poll(ApiError::Unavailable("down".into()));
    }

    let err = h
        .controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap_err();
    assert_eq!(err.prefix(), "failed tracking create progress");
    assert!(matches!(
        err.primary(),
        Some(DeploymentError::Tracking { .. })
    ));
    assert!(err.resume_request_id().is_some());
    assert_eq!(
        h.controller.state(KEY).await.unwrap().lifecycle,
        LifecycleState::Creating
    );
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let h = Harness::new();
    h.controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();

    let state = h.controller.delete(KEY).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Deleted);
    assert!(state.attributes.is_empty());
    assert_eq!(h.api.calls().shutdown, 1);

    let again = h.controller.delete(KEY).await.unwrap();
    assert_eq!(again.lifecycle, LifecycleState::Deleted);
    assert_eq!(h.api.calls().shutdown, 1);
}

#[tokio::test]
async fn test_delete_of_vanished_deployment() {
    let h = Harness::new();
    h.controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();
    h.api.forget("d1");

    let state = h.controller.delete(KEY).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Deleted);
}

#[tokio::test]
async fn test_recreate_after_delete() {
    let h = Harness::new();
    let desired = Fixture::default().search_with_apm("test-1");
    h.controller.create(KEY, &desired).await.unwrap();
    h.controller.delete(KEY).await.unwrap();

    let state = h.controller.create(KEY, &desired).await.unwrap();
    assert_eq!(state.id.as_deref(), Some("d2"));
}

#[tokio::test]
async fn test_invalid_transitions() {
    let h = Harness::new();
    let desired = Fixture::default().search_with_apm("test-1");

    let err = h.controller.update(KEY, &desired).await.unwrap_err();
    assert!(err
        .to_string()
        .contains("cannot update a deployment in state absent"));

    h.controller.create(KEY, &desired).await.unwrap();
    let err = h.controller.create(KEY, &desired).await.unwrap_err();
    assert!(err
        .to_string()
        .contains("cannot create a deployment in state active"));
    assert_eq!(h.api.deployment_count(), 1);
}

#[tokio::test]
async fn test_file_state_survives_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let h = Harness::new();
    let store = Arc::new(FileStateStore::new(temp_dir.path().join("state")));
    let controller = common::controller(h.api.clone(), store, ManualClock::new());
    controller
        .create(KEY, &Fixture::default().search_with_apm("test-1"))
        .await
        .unwrap();

    let store = Arc::new(FileStateStore::new(temp_dir.path().join("state")));
    let restarted = common::controller(h.api.clone(), store, ManualClock::new());
    let state = restarted.read(KEY).await.unwrap();
    assert_eq!(state.lifecycle, LifecycleState::Active);
    assert_eq!(
        state.attributes.attr("elasticsearch_password").as_deref(),
        Some("secret-d1")
    );
    assert!(temp_dir.path().join("state").join("prod.json").exists());
}
