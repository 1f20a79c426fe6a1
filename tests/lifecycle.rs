//! Context lifecycle driven by the context controller.

mod common;

use std::sync::Arc;
use tokio::sync::mpsc;

use common::*;
use endpoint_router::apply::ApplyLoop;
use endpoint_router::controller::{ContextController, ProvisioningStatus, ReconcileError};
use endpoint_router::events;
use endpoint_router::model::{ContextState, ModelRegistry};
use endpoint_router::{Batch, EngineEvent, RejectionKind, Shutdown};

#[tokio::test]
async fn test_new_context_becomes_active_once_provisioned() {
    let (t, backend) = start_local();
    let mut events = t.engine.subscribe();

    commit(
        &t.engine,
        Batch::new(owner("app"))
            .create_context(ctx("/app"))
            .add_endpoint(servlet("x", "/app", &["/x"]))
            .add_endpoint(servlet("y", "/app", &["/y"])),
    )
    .await;

    let snapshot = t.engine.snapshot();
    assert_eq!(snapshot.context(&ctx("/app")).unwrap().state, ContextState::Active);
    assert_eq!(backend.deployed_endpoints(&ctx("/app")).unwrap(), [eid("x"), eid("y")].into());

    assert!(matches!(events.recv().await.unwrap(), EngineEvent::Committed { .. }));
    match events.recv().await.unwrap() {
        EngineEvent::ContextStateChanged { path, from, to, .. } => {
            assert_eq!(path, ctx("/app"));
            assert_eq!((from, to), (ContextState::Creating, ContextState::Active));
        }
        other => panic!("unexpected event {:?}", other),
    }

    t.stop().await;
}

#[tokio::test]
async fn test_endpoint_changes_reach_the_backend() {
    let (t, backend) = start_local();
    commit(
        &t.engine,
        Batch::new(owner("app"))
            .create_context(ctx("/app"))
            .add_endpoint(servlet("x", "/app", &["/x"])),
    )
    .await;

    commit(
        &t.engine,
        Batch::new(owner("app"))
            .remove_endpoint(eid("x"))
            .add_endpoint(servlet("z", "/app", &["/z"])),
    )
    .await;
    assert_eq!(backend.deployed_endpoints(&ctx("/app")).unwrap(), [eid("z")].into());

    t.stop().await;
}

#[tokio::test]
async fn test_failed_provisioning_destroys_context() {
    let backend = ScriptedBackend::new();
    backend.fail_provision("/broken", u32::MAX);
    let t = start_engine(backend.clone(), 2);
    let mut events = t.engine.subscribe();

    let mut receipt = t
        .engine
        .submit(
            Batch::new(owner("app"))
                .create_context(ctx("/broken"))
                .add_endpoint(servlet("x", "/broken", &["/x"])),
        )
        .await
        .unwrap();

    let failures = match receipt.provisioned().await {
        Err(ReconcileError::Failed(failures)) => failures,
        other => panic!("expected provisioning failure, got {:?}", other),
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].context, ctx("/broken"));
    assert_eq!(failures[0].attempts, 2);
    assert!(matches!(receipt.provisioning_status(), ProvisioningStatus::Failed(_)));

    // The model commit is not rolled back; the controller destroys the context.
    let snapshot = t.engine.snapshot();
    assert!(snapshot.context(&ctx("/broken")).is_none());
    assert!(snapshot.endpoint(&eid("x")).is_none());
    assert_eq!(
        backend.calls(),
        vec!["provision /broken", "provision /broken", "deprovision /broken"]
    );

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::ProvisioningFailed { context, attempts, .. } = event {
            assert_eq!((context, attempts), (ctx("/broken"), 2));
            saw_failure = true;
        }
    }
    assert!(saw_failure);

    // The path is free again.
    let receipt = t.engine.submit(Batch::new(owner("app")).create_context(ctx("/broken"))).await;
    assert!(receipt.is_ok());

    t.stop().await;
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let backend = ScriptedBackend::new();
    backend.fail_provision("/flaky", 2);
    let t = start_engine(backend.clone(), 3);

    commit(&t.engine, Batch::new(owner("app")).create_context(ctx("/flaky"))).await;

    assert_eq!(
        t.engine.snapshot().context(&ctx("/flaky")).unwrap().state,
        ContextState::Active
    );
    assert_eq!(backend.calls().len(), 3);

    t.stop().await;
}

#[tokio::test]
async fn test_destroy_drains_then_removes_context() {
    let (t, backend) = start_local();
    commit(
        &t.engine,
        Batch::new(owner("app"))
            .create_context(ctx("/app"))
            .add_endpoint(servlet("x", "/app", &["/x"])),
    )
    .await;

    let mut receipt = t
        .engine
        .submit(Batch::new(owner("app")).destroy_context(ctx("/app")))
        .await
        .unwrap();
    // Draining contexts stop resolving at once.
    assert_eq!(t.engine.resolve_uri("/app/x").unwrap(), None);

    // Draining or already gone, the context takes no new endpoints.
    let rejection = t
        .engine
        .submit(Batch::new(owner("app")).add_endpoint(servlet("y", "/app", &["/y"])))
        .await
        .unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::ValidationError);

    receipt.provisioned().await.unwrap();
    let snapshot = t.engine.snapshot();
    assert!(snapshot.context(&ctx("/app")).is_none());
    assert!(snapshot.endpoint(&eid("x")).is_none());
    assert!(!backend.is_deployed(&ctx("/app")));

    t.stop().await;
}

#[tokio::test]
async fn test_create_and_destroy_in_one_batch_skips_backend() {
    let backend = ScriptedBackend::new();
    let t = start_engine(backend.clone(), 3);

    commit(
        &t.engine,
        Batch::new(owner("app"))
            .create_context(ctx("/brief"))
            .destroy_context(ctx("/brief")),
    )
    .await;

    assert!(t.engine.snapshot().context(&ctx("/brief")).is_none());
    assert!(backend.calls().is_empty());

    t.stop().await;
}

#[tokio::test]
async fn test_unregister_owner_drops_everything_it_registered() {
    let (t, backend) = start_local();
    commit(
        &t.engine,
        Batch::new(owner("host"))
            .create_context(ctx("/shared"))
            .add_endpoint(servlet("host-x", "/shared", &["/x"])),
    )
    .await;
    commit(
        &t.engine,
        Batch::new(owner("plugin"))
            .create_context(ctx("/plugin"))
            .add_endpoint(servlet("plugin-a", "/plugin", &["/a"]))
            .add_endpoint(servlet("plugin-b", "/shared", &["/b"])),
    )
    .await;

    commit(
        &t.engine,
        Batch::new(owner("plugin")).unregister_owner(owner("plugin")),
    )
    .await;

    let snapshot = t.engine.snapshot();
    assert!(snapshot.endpoint(&eid("plugin-a")).is_none());
    assert!(snapshot.endpoint(&eid("plugin-b")).is_none());
    assert!(snapshot.service(&owner("plugin")).is_none());
    // Its own context was left empty and went away; the shared one stays.
    assert!(snapshot.context(&ctx("/plugin")).is_none());
    assert!(!backend.is_deployed(&ctx("/plugin")));
    assert_eq!(t.engine.resolve_uri("/shared/x").unwrap().unwrap().endpoint, eid("host-x"));
    assert_eq!(t.engine.resolve_uri("/shared/b").unwrap(), None);

    // Nothing left to unregister.
    let rejection = t
        .engine
        .submit(Batch::new(owner("plugin")).unregister_owner(owner("plugin")))
        .await
        .unwrap_err();
    assert_eq!(rejection.kind(), RejectionKind::ValidationError);

    t.stop().await;
}

#[tokio::test]
async fn test_late_retire_spares_context_recreated_at_same_path() {
    let registry = Arc::new(ModelRegistry::new());
    let events = events::channel();
    let (committed_tx, mut committed) = mpsc::unbounded_channel();
    let (apply_loop, applier) = ApplyLoop::new(Arc::clone(&registry), events.clone(), committed_tx);
    let shutdown = Shutdown::new();
    let apply_task = tokio::spawn(apply_loop.run(shutdown.subscribe()));

    // Created, then destroyed before the backend ever ran.
    applier.submit(Batch::new(owner("a")).create_context(ctx("/c1"))).await.unwrap();
    let first = registry.current_snapshot().context(&ctx("/c1")).unwrap().incarnation;
    let mut retired = applier
        .submit(Batch::new(owner("b")).destroy_context(ctx("/c1")))
        .await
        .unwrap();
    let _create = committed.recv().await.unwrap();
    let retire = committed.recv().await.unwrap();

    // Provisioning of the first context failed, which frees the path.
    applier.transition(ctx("/c1"), first, ContextState::Destroyed).await.unwrap();

    let mut recreated = applier
        .submit(
            Batch::new(owner("c"))
                .create_context(ctx("/c1"))
                .add_endpoint(servlet("cx", "/c1", &["/x"])),
        )
        .await
        .unwrap();
    let recreate = committed.recv().await.unwrap();

    // The controller reaches the stale retire only after the path was reused.
    let backend = ScriptedBackend::new();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(retire).unwrap();
    tx.send(recreate).unwrap();
    let controller = ContextController::new(
        backend.clone(),
        applier.clone(),
        Arc::clone(&registry),
        events,
        fast_policy(1),
        rx,
    );
    let controller_task = tokio::spawn(controller.run(shutdown.subscribe()));

    retired.provisioned().await.unwrap();
    recreated.provisioned().await.unwrap();

    let snapshot = registry.current_snapshot();
    let context = snapshot.context(&ctx("/c1")).unwrap();
    assert_ne!(context.incarnation, first);
    assert_eq!(context.state, ContextState::Active);
    assert_eq!(context.creator, owner("c"));
    assert!(snapshot.endpoint(&eid("cx")).is_some());
    assert_eq!(backend.calls(), vec!["provision /c1"]);

    shutdown.trigger();
    apply_task.await.unwrap();
    controller_task.await.unwrap();
}
