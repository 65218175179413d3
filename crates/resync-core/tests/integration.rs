//! End-to-end behaviour of the resilience engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Notify;

use resync_core::{
    ActionQueue, ActionRequest, DrainStrategy, Error, ExecutorRegistry, MockConnectivity,
    ResilienceEvent, ResilienceManager,
};
use resync_store::{MemoryStore, OfflineStorage, StorageOptions};
use resync_types::{ActionDraft, ManualClock, Priority, QueuedAction};

fn queue_with_clock() -> (ActionQueue, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let storage = Arc::new(OfflineStorage::with_clock(
        Arc::new(MemoryStore::new()),
        StorageOptions::default(),
        clock.clone(),
    ));
    (ActionQueue::new(storage), clock)
}

fn no_delay() -> DrainStrategy {
    DrainStrategy::default().batch_delay(Duration::ZERO)
}

#[tokio::test]
async fn offline_place_bet_is_replayed_when_back_online() {
    let source = Arc::new(MockConnectivity::new(false));
    let replayed = Arc::new(AtomicUsize::new(0));
    let counter = replayed.clone();

    let manager = ResilienceManager::builder()
        .connectivity(source.clone())
        .backend(Arc::new(MemoryStore::new()))
        .strategy(no_delay())
        .executor(ExecutorRegistry::new().register("placeBet", move |_: QueuedAction| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(true)
            }
        }))
        .build()
        .unwrap();
    let mut events = manager.events().subscribe();

    let request = ActionRequest::new("placeBet", json!({"amount": 25}))
        .priority(Priority::High)
        .optimistic_result(json!({"queued": true}));
    let result = manager
        .execute_action(request, || async { Ok(json!({"queued": false})) })
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"queued": true})));
    let stats = manager.queue_stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_type["placeBet"], 1);

    // The driver task notices the transition and drains automatically.
    source.set_online(true);
    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(ResilienceEvent::SyncCompleted { report }) = events.recv().await {
                return report;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(completed.succeeded, 1);
    assert_eq!(replayed.load(Ordering::SeqCst), 1);
    assert_eq!(manager.queue_stats().total, 0);
    assert_eq!(manager.metrics().drains, 1);

    manager.shutdown().await;
}

#[tokio::test]
async fn manual_sync_drains_after_reconnect() {
    let source = Arc::new(MockConnectivity::new(false));
    let manager = ResilienceManager::builder()
        .connectivity(source.clone())
        .backend(Arc::new(MemoryStore::new()))
        .strategy(no_delay())
        .spawn_driver(false)
        .build()
        .unwrap();
    manager.set_executor(|_: QueuedAction| async { Ok::<_, Error>(true) });

    manager
        .execute_action(ActionRequest::<()>::new("like", json!({"post": 9})), || async {
            Ok(())
        })
        .await
        .unwrap();

    assert!(manager.sync_now().await.is_none());

    source.set_online(true);
    let report = manager.sync_now().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(manager.queue_stats().total, 0);
}

#[tokio::test]
async fn offline_enqueues_keep_insertion_order() {
    let source = Arc::new(MockConnectivity::new(false));
    let manager = ResilienceManager::builder()
        .connectivity(source)
        .backend(Arc::new(MemoryStore::new()))
        .spawn_driver(false)
        .build()
        .unwrap();

    for i in 0..5 {
        manager
            .execute_action(ActionRequest::<()>::new(format!("op{i}"), json!(i)), || async {
                Ok(())
            })
            .await
            .unwrap();
    }

    let queue = manager.queue().queue();
    let types: Vec<&str> = queue.iter().map(|a| a.action_type.as_str()).collect();
    assert_eq!(types, vec!["op0", "op1", "op2", "op3", "op4"]);
    assert!(queue.iter().all(|a| a.retry_count == 0));
}

#[tokio::test]
async fn drain_runs_critical_then_medium_then_low() {
    let (queue, clock) = queue_with_clock();
    for (name, priority) in [
        ("low", Priority::Low),
        ("critical", Priority::Critical),
        ("medium", Priority::Medium),
    ] {
        queue.enqueue(ActionDraft::new(name, json!(null)).priority(priority));
        clock.advance(Duration::from_millis(10));
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let log = order.clone();
    let executor = move |action: QueuedAction| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(action.action_type);
            Ok::<_, Error>(true)
        }
    };

    queue
        .process_queue(&executor, &no_delay().batch_size(1))
        .await
        .unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["critical", "medium", "low"]);
}

#[tokio::test]
async fn same_priority_drains_oldest_first() {
    let (queue, clock) = queue_with_clock();
    for name in ["first", "second", "third"] {
        queue.enqueue(ActionDraft::new(name, json!(null)).priority(Priority::High));
        clock.advance(Duration::from_millis(10));
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    let log = order.clone();
    let executor = move |action: QueuedAction| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(action.action_type);
            Ok::<_, Error>(true)
        }
    };

    queue.process_queue(&executor, &no_delay().batch_size(1)).await;
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn failing_action_dropped_after_exactly_max_retries() {
    let (queue, _) = queue_with_clock();
    queue.enqueue(ActionDraft::new("flaky", json!(null)).max_retries(3));

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let executor = move |_: QueuedAction| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(false)
        }
    };

    for expected_retries in 1..3u32 {
        let report = queue.process_queue(&executor, &no_delay()).await.unwrap();
        assert_eq!(report.requeued, 1);
        assert_eq!(queue.queue()[0].retry_count, expected_retries);
    }

    let report = queue.process_queue(&executor, &no_delay()).await.unwrap();
    assert_eq!(report.dropped, 1);
    assert!(queue.is_empty());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    assert!(queue.process_queue(&executor, &no_delay()).await.is_none());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn concurrent_drains_are_single_flight() {
    let (queue, _) = queue_with_clock();
    let queue = Arc::new(queue);
    queue.enqueue(ActionDraft::new("slow", json!(null)));

    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let executor = {
        let started = started.clone();
        let release = release.clone();
        let calls = calls.clone();
        move |_: QueuedAction| {
            let started = started.clone();
            let release = release.clone();
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                started.notify_one();
                release.notified().await;
                Ok::<_, Error>(true)
            }
        }
    };
    let executor = Arc::new(executor);

    let first = {
        let queue = queue.clone();
        let executor = executor.clone();
        tokio::spawn(async move { queue.process_queue(executor.as_ref(), &no_delay()).await })
    };

    started.notified().await;
    assert!(queue.is_draining());
    assert!(queue.process_queue(executor.as_ref(), &no_delay()).await.is_none());

    release.notify_one();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!queue.is_draining());
}

#[tokio::test]
async fn batches_run_members_concurrently() {
    let (queue, _) = queue_with_clock();
    for i in 0..3 {
        queue.enqueue(ActionDraft::new("op", json!(i)));
    }

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let executor = {
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        move |_: QueuedAction| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, Error>(true)
            }
        }
    };

    let report = queue
        .process_queue(&executor, &no_delay().batch_size(3))
        .await
        .unwrap();
    assert_eq!(report.batches, 1);
    assert_eq!(peak.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unknown_action_types_exhaust_and_drop() {
    let source = Arc::new(MockConnectivity::new(false));
    let manager = ResilienceManager::builder()
        .connectivity(source.clone())
        .backend(Arc::new(MemoryStore::new()))
        .strategy(no_delay())
        .executor(ExecutorRegistry::new())
        .spawn_driver(false)
        .build()
        .unwrap();

    manager
        .execute_action(
            ActionRequest::<()>::new("mystery", json!(null)).max_retries(1),
            || async { Ok(()) },
        )
        .await
        .unwrap();

    source.set_online(true);
    let report = manager.sync_now().await.unwrap();
    assert_eq!(report.dropped, 1);
    assert_eq!(manager.metrics().actions_dropped, 1);
}

#[tokio::test]
async fn pending_queue_resumes_on_startup_when_online() {
    let backend = Arc::new(MemoryStore::new());
    {
        let storage = Arc::new(OfflineStorage::new(backend.clone(), StorageOptions::default()));
        ActionQueue::new(storage).enqueue(ActionDraft::new("leftover", json!(null)));
    }

    let manager = ResilienceManager::builder()
        .connectivity(Arc::new(MockConnectivity::new(true)))
        .backend(backend)
        .strategy(no_delay())
        .executor(|_: QueuedAction| async { Ok::<_, Error>(true) })
        .spawn_driver(false)
        .build()
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.queue_stats().total > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    manager.shutdown().await;
}
