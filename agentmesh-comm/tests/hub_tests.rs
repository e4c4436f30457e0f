//! Integration tests for the CommHub: request-reply, lock contention,
//! deadlock detection, collectors, and destroy semantics.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use agentmesh_comm::hub::{CommHub, HubError, ResolutionStrategy};
use agentmesh_comm::monitoring::HubEventKind;
use agentmesh_comm::util::AgentAddress;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn addr(name: &str) -> AgentAddress {
    AgentAddress::new(name)
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

// ============================================================================
// Request / reply
// ============================================================================

#[tokio::test]
async fn test_request_reply_success() {
    let hub = CommHub::new();
    let responder = hub.clone();
    hub.subscribe(addr("B"), "t", move |envelope| {
        let _ = responder.reply(envelope.id, addr("B"), json!("pong"));
    })
    .unwrap();

    let request_ids = Arc::new(Mutex::new(Vec::new()));
    {
        let request_ids = Arc::clone(&request_ids);
        hub.subscribe(addr("B"), "t", move |envelope| {
            request_ids.lock().push(envelope.id);
        })
        .unwrap();
    }

    let reply = hub
        .request(addr("B"), "t", json!("ping"), addr("A"), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(reply.payload, json!("pong"));
    assert_eq!(reply.from, addr("B"));
    assert_eq!(reply.to, addr("A"));
    let request_id = request_ids.lock()[0];
    assert_eq!(reply.correlation_id, Some(request_id));
}

#[tokio::test]
async fn test_send_appears_in_history_newest_first() {
    let hub = CommHub::new();
    let first = agentmesh_comm::Envelope::new(addr("a"), addr("b"), json!(1)).with_topic("t");
    let second = agentmesh_comm::Envelope::new(addr("a"), addr("b"), json!(2)).with_topic("t");
    let second_id = second.id;

    hub.send(first).unwrap();
    hub.send(second).unwrap();

    let messages = hub.get_messages(&addr("b"), Some("t"));
    assert_eq!(messages[0].id, second_id);
}

#[tokio::test]
async fn test_resubscribe_equivalent_to_fresh_subscription() {
    let hub = CommHub::new();
    let hits = Arc::new(Mutex::new(0usize));

    let make_handler = |hits: Arc<Mutex<usize>>| {
        move |_: &agentmesh_comm::Envelope| {
            *hits.lock() += 1;
        }
    };

    let id = hub
        .subscribe(addr("b"), "t", make_handler(Arc::clone(&hits)))
        .unwrap();
    hub.unsubscribe(id);
    hub.subscribe(addr("b"), "t", make_handler(Arc::clone(&hits)))
        .unwrap();

    hub.broadcast(addr("a"), "t", json!(null), None).unwrap();
    assert_eq!(*hits.lock(), 1);
    assert_eq!(hub.subscription_count(), 1);
}

// ============================================================================
// Lock FIFO under contention (S2)
// ============================================================================

#[tokio::test]
async fn test_lock_fifo_ownership_sequence() {
    let hub = CommHub::new();
    let acquisitions = Arc::new(Mutex::new(Vec::new()));
    {
        let acquisitions = Arc::clone(&acquisitions);
        hub.observe(move |event| {
            if let HubEventKind::LockAcquired { holder, .. } = &event.kind {
                acquisitions.lock().push(holder.clone());
            }
        });
    }

    hub.acquire_lock("X", &addr("A1"), None).await.unwrap();

    let t2 = {
        let hub = hub.clone();
        tokio::spawn(async move {
            hub.acquire_lock("X", &addr("A2"), None).await.unwrap();
            hub.release_lock("X", &addr("A2"));
        })
    };
    wait_until(|| hub.lock_info("X").map(|info| info.waiters.len()) == Some(1)).await;

    let t3 = {
        let hub = hub.clone();
        tokio::spawn(async move {
            hub.acquire_lock("X", &addr("A3"), None).await.unwrap();
            hub.release_lock("X", &addr("A3"));
        })
    };
    wait_until(|| hub.lock_info("X").map(|info| info.waiters.len()) == Some(2)).await;

    assert_eq!(
        hub.lock_info("X").unwrap().waiters,
        vec![addr("A2"), addr("A3")]
    );

    hub.release_lock("X", &addr("A1"));
    t2.await.unwrap();
    t3.await.unwrap();

    // Ownership passed A1 -> A2 -> A3 and ended unheld.
    assert_eq!(
        *acquisitions.lock(),
        vec![addr("A1"), addr("A2"), addr("A3")]
    );
    assert!(hub.lock_info("X").is_none());
}

// ============================================================================
// Deadlock detection and resolution (S3)
// ============================================================================

#[tokio::test]
async fn test_deadlock_detect_resolve_youngest() {
    let hub = CommHub::new();

    hub.acquire_lock("r1", &addr("A"), None).await.unwrap();
    hub.acquire_lock("r2", &addr("B"), None).await.unwrap();

    let a_waits = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.acquire_lock("r2", &addr("A"), None).await })
    };
    let b_waits = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.acquire_lock("r1", &addr("B"), None).await })
    };
    wait_until(|| {
        hub.lock_info("r2").map(|info| info.waiters.len()) == Some(1)
            && hub.lock_info("r1").map(|info| info.waiters.len()) == Some(1)
    })
    .await;

    let cycles = hub.detect_deadlocks();
    assert_eq!(cycles.len(), 1);
    let mut members = cycles[0].cycle.clone();
    members.sort();
    assert_eq!(members, vec![addr("A"), addr("B")]);
    assert_eq!(
        cycles[0].resources,
        vec!["r1".to_string(), "r2".to_string()]
    );

    // r2 was acquired after r1, so the youngest strategy revokes it and
    // hands it to its head waiter, A.
    let resolved = hub.resolve_deadlocks(ResolutionStrategy::Youngest);
    assert!(!resolved.is_empty());
    a_waits.await.unwrap().unwrap();
    assert_eq!(hub.lock_info("r2").unwrap().holder, addr("A"));

    // The cycle is gone.
    assert!(hub.detect_deadlocks().is_empty());

    // B is still queued on r1; releasing it lets B finish.
    hub.release_lock("r1", &addr("A"));
    b_waits.await.unwrap().unwrap();
    assert_eq!(hub.lock_info("r1").unwrap().holder, addr("B"));
}

// ============================================================================
// Collectors
// ============================================================================

#[tokio::test]
async fn test_collector_results_plus_errors_reach_expected() {
    let hub = CommHub::new();
    let collector = hub.create_collector(3).unwrap();

    collector.submit_result("a", json!(1));
    collector.submit_error("b", "failed");
    collector.submit_result("c", json!(3));

    let results = collector.wait_for_all(Duration::from_millis(100)).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(collector.errors().len(), 1);
}

#[tokio::test]
async fn test_collector_timeout_keeps_partials() {
    let hub = CommHub::new();
    let collector = hub.create_collector(2).unwrap();
    collector.submit_result("only", json!(1));

    let err = collector
        .wait_for_all(Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::CollectorTimeout { .. }));
    assert_eq!(collector.results(), vec![("only".to_string(), json!(1))]);
}

// ============================================================================
// Destroy (P9)
// ============================================================================

#[tokio::test]
async fn test_destroy_rejects_all_pending_operations() {
    let hub = CommHub::new();
    hub.acquire_lock("held", &addr("owner"), None).await.unwrap();
    let collector = hub.create_collector(1).unwrap();

    let pending_request = {
        let hub = hub.clone();
        tokio::spawn(async move {
            hub.request(addr("b"), "t", json!(null), addr("a"), Duration::from_secs(5))
                .await
        })
    };
    let pending_lock = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.acquire_lock("held", &addr("waiter"), None).await })
    };
    let pending_wait = {
        let collector = collector.clone();
        tokio::spawn(async move { collector.wait_for_all(Duration::from_secs(5)).await })
    };
    wait_until(|| hub.lock_info("held").map(|info| info.waiters.len()) == Some(1)).await;
    // The request envelope lands in history once its pending entry exists.
    wait_until(|| hub.history_len() == 1).await;

    hub.destroy();

    assert!(matches!(
        pending_request.await.unwrap().unwrap_err(),
        HubError::Destroyed
    ));
    assert!(matches!(
        pending_lock.await.unwrap().unwrap_err(),
        HubError::Destroyed
    ));
    assert!(matches!(
        pending_wait.await.unwrap().unwrap_err(),
        HubError::Destroyed
    ));

    // Post-destroy operations throw synchronously.
    assert!(matches!(
        hub.subscribe(addr("x"), "t", |_| {}),
        Err(HubError::Destroyed)
    ));
    assert!(matches!(hub.create_collector(1), Err(HubError::Destroyed)));
}

// ============================================================================
// Observer events
// ============================================================================

#[tokio::test]
async fn test_lock_event_stream() {
    let hub = CommHub::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        hub.observe(move |event| {
            let tag = match &event.kind {
                HubEventKind::LockAcquired { .. } => "acquired",
                HubEventKind::LockReleased { .. } => "released",
                HubEventKind::LockForceReleased { .. } => "force-released",
                _ => return,
            };
            events.lock().push(tag);
        });
    }

    hub.acquire_lock("r", &addr("a"), None).await.unwrap();
    hub.release_lock("r", &addr("a"));
    hub.acquire_lock("r", &addr("a"), None).await.unwrap();
    hub.force_release_lock("r");

    assert_eq!(
        *events.lock(),
        vec!["acquired", "released", "acquired", "force-released"]
    );
}

#[tokio::test]
async fn test_unsubscribed_before_send_receives_nothing() {
    let hub = CommHub::new();
    let hits = Arc::new(Mutex::new(0usize));

    let id = {
        let hits = Arc::clone(&hits);
        hub.subscribe(addr("b"), "*", move |_| {
            *hits.lock() += 1;
        })
        .unwrap()
    };
    hub.unsubscribe(id);

    hub.send(agentmesh_comm::Envelope::new(addr("a"), addr("b"), json!(null)).with_topic("t"))
        .unwrap();
    hub.broadcast(addr("a"), "t", json!(null), None).unwrap();

    assert_eq!(*hits.lock(), 0);
}
