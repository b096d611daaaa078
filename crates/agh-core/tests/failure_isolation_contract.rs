//! Contract Test: Cluster Sync & Failure Isolation
//!
//! Constraints verified:
//! - Nodes are processed sequentially in registry order
//! - A request failure on one node is reported and the run continues
//! - Non-request errors abort the run
//! - Fetch merges node records with later nodes winning, and stops at the
//!   first failure
//! - Fetching with no registered nodes never clears the canonical set

mod common;

use agh_core::{
    Error, MemoryRegistry, NodeOutcome, NodeRegistry, RequestError, SyncCounts, SyncEngine,
};
use common::*;

fn engine(factory: &FakeFactory) -> SyncEngine {
    SyncEngine::with_factory(Box::new(factory.clone()))
}

#[tokio::test]
async fn failing_node_does_not_stop_the_run() {
    let first = FakeNode::new("first");
    let second = FakeNode::new("second");
    let third = FakeNode::new("third");
    second.fail_on(CallKind::List, RequestError::Status(500));
    let factory = FakeFactory::new(&[first.clone(), second.clone(), third.clone()]);

    let wanted = canonical(&[("a.lan", "10.0.0.1")]);
    let report = engine(&factory)
        .sync(&[node("first"), node("second"), node("third")], &wanted)
        .await
        .unwrap();

    let names: Vec<&str> = report.results.iter().map(|r| r.node_name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);

    let added = SyncCounts {
        added: 1,
        removed: 0,
        updated: 0,
    };
    assert_eq!(report.results[0].outcome, NodeOutcome::Synced(added));
    assert_eq!(
        report.results[1].failure().map(|f| f.error.status()),
        Some(Some(500))
    );
    assert_eq!(report.results[2].outcome, NodeOutcome::Synced(added));

    assert_eq!(first.record_set(), wanted);
    assert_eq!(third.record_set(), wanted);
    assert_eq!(report.failed_count(), 1);
    assert!(report.to_string().contains("FAIL (HTTP 500)"));
}

#[tokio::test]
async fn nodes_are_visited_in_order() {
    let nodes = ["c", "a", "b"].map(FakeNode::new);
    let factory = FakeFactory::new(&nodes);

    engine(&factory)
        .sync(&[node("c"), node("a"), node("b")], &canonical(&[]))
        .await
        .unwrap();

    assert_eq!(factory.created(), vec!["c", "a", "b"]);
}

#[tokio::test]
async fn unreachable_node_is_isolated() {
    // "ghost" has no fake behind it: the factory reports a transport failure
    let live = FakeNode::new("live");
    let factory = FakeFactory::new(&[live.clone()]);

    let report = engine(&factory)
        .sync(&[node("ghost"), node("live")], &canonical(&[("a.lan", "1.1.1.1")]))
        .await
        .unwrap();

    let ghost = report.get("ghost").unwrap().failure().unwrap();
    assert!(matches!(ghost.error, RequestError::Transport(_)));
    assert_eq!(ghost.error.status(), None);
    assert!(report.get("live").unwrap().counts().is_some());
    assert_eq!(live.records().len(), 1);
}

#[tokio::test]
async fn non_request_error_is_fatal() {
    let broken = FakeNode::new("broken");
    let after = FakeNode::new("after");
    broken.fatal_on_list();
    let factory = FakeFactory::new(&[broken, after.clone()]);

    let result = engine(&factory)
        .sync(&[node("broken"), node("after")], &canonical(&[("a.lan", "1.1.1.1")]))
        .await;

    assert!(result.is_err());
    assert!(after.calls().is_empty(), "run must stop at a fatal error");
}

#[tokio::test]
async fn partial_update_is_visible_in_report() {
    let edge = FakeNode::with_records("edge", &[("a.lan", "1.1.1.1")]);
    edge.fail_on(CallKind::Add, RequestError::Status(502));
    let factory = FakeFactory::new(&[edge]);

    let report = engine(&factory)
        .sync(&[node("edge")], &canonical(&[("a.lan", "2.2.2.2")]))
        .await
        .unwrap();

    let failure = report.get("edge").unwrap().failure().unwrap();
    assert_eq!(failure.applied, 1);
    assert_eq!(failure.stranded.as_ref().map(|r| r.domain.as_str()), Some("a.lan"));
}

#[tokio::test]
async fn sync_registry_reads_explicit_handle() {
    let fake = FakeNode::with_records("primary", &[("old.lan", "10.0.0.1")]);
    let factory = FakeFactory::new(&[fake.clone()]);
    let registry = MemoryRegistry::with_contents(
        vec![node("primary")],
        canonical(&[("new.lan", "10.0.0.2")]),
    );

    let report = engine(&factory).sync_registry(&registry).await.unwrap();

    assert_eq!(
        report.get("primary").unwrap().counts(),
        Some(SyncCounts {
            added: 1,
            removed: 1,
            updated: 0
        })
    );
    assert_eq!(fake.record_set(), canonical(&[("new.lan", "10.0.0.2")]));
}

#[tokio::test]
async fn dry_run_sync_leaves_nodes_untouched() {
    let fake = FakeNode::with_records("primary", &[("old.lan", "10.0.0.1")]);
    let factory = FakeFactory::new(&[fake.clone()]);

    let report = engine(&factory)
        .dry_run(true)
        .sync(&[node("primary")], &canonical(&[("new.lan", "10.0.0.2")]))
        .await
        .unwrap();

    assert!(report.dry_run);
    assert!(report.to_string().contains("PLAN (added: 1, removed: 1, updated: 0)"));
    assert!(fake.mutations().is_empty());
}

#[tokio::test]
async fn fetch_merges_with_later_nodes_winning() {
    let first = FakeNode::with_records("first", &[("a.lan", "1.1.1.1"), ("b.lan", "2.2.2.2")]);
    let second = FakeNode::with_records("second", &[("b.lan", "9.9.9.9"), ("c.lan", "3.3.3.3")]);
    let factory = FakeFactory::new(&[first, second]);

    let report = engine(&factory)
        .fetch(&[node("first"), node("second")])
        .await
        .unwrap();

    assert_eq!(
        report.records,
        canonical(&[("a.lan", "1.1.1.1"), ("b.lan", "9.9.9.9"), ("c.lan", "3.3.3.3")])
    );
    assert_eq!(
        report.per_node,
        vec![("first".to_string(), 2), ("second".to_string(), 2)]
    );
}

#[tokio::test]
async fn fetch_stops_at_first_failure_and_keeps_registry() {
    let good = FakeNode::with_records("good", &[("a.lan", "1.1.1.1")]);
    let bad = FakeNode::new("bad");
    bad.fail_on(CallKind::List, RequestError::Status(503));
    let factory = FakeFactory::new(&[good, bad]);
    let registry = MemoryRegistry::with_contents(
        vec![node("bad"), node("good")],
        canonical(&[("keep.lan", "10.0.0.1")]),
    );

    let result = engine(&factory).fetch_into_registry(&registry).await;

    assert!(result.is_err());
    assert_eq!(
        registry.canonical_records().await.unwrap(),
        canonical(&[("keep.lan", "10.0.0.1")])
    );
}

#[tokio::test]
async fn fetch_into_registry_replaces_records() {
    let fake = FakeNode::with_records("primary", &[("a.lan", "1.1.1.1")]);
    let factory = FakeFactory::new(&[fake]);
    let registry = MemoryRegistry::with_contents(
        vec![node("primary")],
        canonical(&[("stale.lan", "10.0.0.1")]),
    );

    engine(&factory).fetch_into_registry(&registry).await.unwrap();

    assert_eq!(
        registry.canonical_records().await.unwrap(),
        canonical(&[("a.lan", "1.1.1.1")])
    );
}

#[tokio::test]
async fn fetch_without_nodes_keeps_canonical_records() {
    let factory = FakeFactory::new(&[]);
    let registry =
        MemoryRegistry::with_contents(Vec::new(), canonical(&[("keep.lan", "10.0.0.1")]));

    let result = engine(&factory).fetch_into_registry(&registry).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(
        registry.canonical_records().await.unwrap(),
        canonical(&[("keep.lan", "10.0.0.1")])
    );
    assert!(factory.created().is_empty());
}
