//! Readers against a moving model.

mod common;

use std::sync::Arc;

use common::*;
use endpoint_router::routing::resolve_uri;
use endpoint_router::Batch;

#[tokio::test]
async fn test_held_snapshot_is_isolated_from_later_commits() {
    let (t, _) = start_local();
    commit(
        &t.engine,
        Batch::new(owner("app"))
            .create_context(ctx("/app"))
            .add_endpoint(servlet("old", "/app", &["/x"])),
    )
    .await;

    let held = t.engine.snapshot();
    commit(
        &t.engine,
        Batch::new(owner("app"))
            .remove_endpoint(eid("old"))
            .add_endpoint(servlet("new", "/app", &["/x"])),
    )
    .await;

    let r = resolve_uri(&held, "/app/x").unwrap().unwrap();
    assert_eq!((r.endpoint, r.snapshot), (eid("old"), held.id));

    let r = t.engine.resolve_uri("/app/x").unwrap().unwrap();
    assert_eq!(r.endpoint, eid("new"));
    assert!(r.snapshot > held.id);

    t.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_batches_only() {
    let (t, _) = start_local();
    commit(
        &t.engine,
        Batch::new(owner("app"))
            .create_context(ctx("/app"))
            .add_endpoint(servlet("a0", "/app", &["/a"]))
            .add_endpoint(servlet("b0", "/app", &["/b"])),
    )
    .await;

    // Each batch swaps both endpoints for the next generation, so a reader
    // taking both answers from one snapshot must see matching generations.
    let writer = {
        let engine = t.engine.clone();
        tokio::spawn(async move {
            for gen in 1..=50 {
                let prev = gen - 1;
                engine
                    .submit(
                        Batch::new(owner("app"))
                            .remove_endpoint(eid(&format!("a{}", prev)))
                            .remove_endpoint(eid(&format!("b{}", prev)))
                            .add_endpoint(servlet(&format!("a{}", gen), "/app", &["/a"]))
                            .add_endpoint(servlet(&format!("b{}", gen), "/app", &["/b"])),
                    )
                    .await
                    .unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        let engine = t.engine.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..500 {
                let snapshot = engine.snapshot();
                let a = resolve_uri(&snapshot, "/app/a").unwrap().unwrap();
                let b = resolve_uri(&snapshot, "/app/b").unwrap().unwrap();
                assert_eq!(&a.endpoint.as_str()[1..], &b.endpoint.as_str()[1..]);
                assert_eq!(a.snapshot, b.snapshot);
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(t.engine.resolve_uri("/app/a").unwrap().unwrap().endpoint, eid("a50"));

    t.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_are_serialized() {
    let (t, _) = start_local();
    commit(&t.engine, Batch::new(owner("host")).create_context(ctx("/app"))).await;
    let start = t.engine.snapshot().id;

    let mut writers = Vec::new();
    for i in 0..16 {
        let engine = t.engine.clone();
        writers.push(tokio::spawn(async move {
            engine
                .submit(Batch::new(owner(&format!("w{}", i))).add_endpoint(servlet(
                    &format!("e{}", i),
                    "/app",
                    &["/same"],
                )))
                .await
                .unwrap()
                .snapshot_id
        }));
    }

    let mut ids = Vec::new();
    for writer in writers {
        ids.push(writer.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert!(ids.iter().all(|id| *id > start));

    // Equal priority: the first registration processed owns the pattern.
    let snapshot = t.engine.snapshot();
    let winner = resolve_uri(&snapshot, "/app/same").unwrap().unwrap().endpoint;
    let first = snapshot
        .endpoints
        .values()
        .min_by_key(|ep| ep.registration)
        .map(|ep| ep.id.clone());
    assert_eq!(Some(winner), first);
    assert_eq!(snapshot.endpoints.len(), 16);

    t.stop().await;
}

#[test]
fn test_snapshot_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Arc<endpoint_router::Snapshot>>();
    assert_send_sync::<endpoint_router::Engine>();
}
