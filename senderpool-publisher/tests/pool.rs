//! Pool lifecycle, checkout and reuse against the in-memory broker.

use bytes::Bytes;
use senderpool_core::{telemetry::init_test_logging, DispatchMode, Error, Topic};
use senderpool_publisher::{
    HandlePool, JsonEncoder, MemoryBroker, PoolOptions, PublishHandle, Utf8Encoder,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const WAIT: Duration = Duration::from_millis(100);

fn orders() -> Topic {
    Topic::new("orders").unwrap()
}

async fn pool_with(broker: &MemoryBroker, capacity: usize, options: PoolOptions) -> HandlePool {
    init_test_logging();
    HandlePool::new(
        orders(),
        capacity,
        "localhost:9092".parse().unwrap(),
        Arc::new(broker.clone()),
        options,
    )
    .await
    .unwrap()
}

async fn pool(broker: &MemoryBroker, capacity: usize) -> HandlePool {
    pool_with(broker, capacity, PoolOptions::default()).await
}

#[tokio::test]
async fn test_construction_fills_every_slot() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 4).await;

    let stats = pool.stats();
    assert_eq!(stats.capacity, 4);
    assert_eq!(stats.idle, 4);
    assert_eq!(stats.checked_out, 0);
    assert_eq!(stats.constructed, 4);
    assert_eq!(broker.connections_opened(), 4);
    assert_eq!(pool.topic().as_str(), "orders");
    assert_eq!(pool.endpoints().to_string(), "localhost:9092");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_pool_times_out() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 3).await;

    let (a, b, c) = tokio::join!(pool.acquire(WAIT), pool.acquire(WAIT), pool.acquire(WAIT));
    let held = [a.unwrap(), b.unwrap(), c.unwrap()];

    let started = Instant::now();
    let err = pool.acquire(WAIT).await.unwrap_err();

    assert_eq!(err, Error::PoolTimeout { timeout_ms: 100 });
    assert!(err.is_retryable());
    assert!(started.elapsed() >= WAIT);
    assert!(started.elapsed() <= WAIT + Duration::from_millis(1));
    assert_eq!(pool.stats().checked_out, 3);
    assert_eq!(pool.stats().idle, 0);
    drop(held);
}

#[tokio::test]
async fn test_released_handle_is_reused() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 1).await;

    let first = pool.acquire(WAIT).await.unwrap();
    let first_id = first.id();
    first.send("ping").await.unwrap();
    first.release(&pool).await.unwrap();

    let second = pool.acquire(WAIT).await.unwrap();
    assert_eq!(second.id(), first_id);
    assert_eq!(pool.stats().constructed, 1);

    let published = broker.published(&orders());
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].payload, Bytes::from_static(b"ping"));
    assert_eq!(published[0].key, None);
}

#[tokio::test]
async fn test_idle_queue_is_fifo() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 3).await;

    let a = pool.acquire(WAIT).await.unwrap();
    let b = pool.acquire(WAIT).await.unwrap();
    let c = pool.acquire(WAIT).await.unwrap();
    let order = [c.id(), a.id(), b.id()];
    pool.release(c).await.unwrap();
    pool.release(a).await.unwrap();
    pool.release(b).await.unwrap();

    for expected in order {
        let handle = pool.acquire(WAIT).await.unwrap();
        assert_eq!(handle.id(), expected);
        drop(handle);
    }
}

#[tokio::test]
async fn test_dropped_handle_frees_its_slot() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 1).await;

    let handle = pool.acquire(WAIT).await.unwrap();
    drop(handle);

    assert_eq!(pool.stats().checked_out, 0);
    let replacement = pool.acquire(WAIT).await.unwrap();
    assert_eq!(pool.stats().constructed, 2);
    replacement.release(&pool).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_idle_handles_once() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 3).await;

    let report = pool.shutdown().await;
    assert!(!report.already_shut_down);
    assert_eq!(report.closed, 3);
    assert_eq!(report.failed + report.abandoned, 0);
    assert_eq!(broker.close_calls(), 3);

    let again = pool.shutdown().await;
    assert!(again.already_shut_down);
    assert_eq!(again.closed, 0);
    assert_eq!(broker.close_calls(), 3);
    assert_eq!(pool.stats().closed, 3);
    assert!(pool.is_shut_down().await);
}

#[tokio::test]
async fn test_acquire_after_shutdown_fails() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 2).await;
    pool.shutdown().await;

    assert_eq!(pool.acquire(WAIT).await.unwrap_err(), Error::PoolClosed);
    assert_eq!(broker.connections_opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_wakes_blocked_acquirer() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 1).await;
    let held = pool.acquire(WAIT).await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire(Duration::from_secs(30)).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    pool.shutdown().await;

    let outcome = waiter.await.unwrap();
    assert_eq!(outcome.unwrap_err(), Error::PoolClosed);
    drop(held);
}

#[tokio::test]
async fn test_release_after_shutdown_closes_handle() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 2).await;
    let handle = pool.acquire(WAIT).await.unwrap();

    let report = pool.shutdown().await;
    assert_eq!(report.closed, 1);

    handle.release(&pool).await.unwrap();
    assert_eq!(broker.close_calls(), 2);
    assert_eq!(pool.stats().idle, 0);
}

#[tokio::test]
async fn test_pool_grows_back_after_failed_construction() {
    let broker = MemoryBroker::new();
    broker.refuse_connections(2);
    let pool = pool(&broker, 3).await;

    assert_eq!(pool.stats().idle, 1);
    assert_eq!(pool.stats().constructed, 1);

    let a = pool.acquire(WAIT).await.unwrap();
    let b = pool.acquire(WAIT).await.unwrap();
    let c = pool.acquire(WAIT).await.unwrap();
    assert_eq!(pool.stats().constructed, 3);
    assert_eq!(pool.stats().idle, 0);
    assert!(matches!(pool.acquire(Duration::from_millis(5)).await, Err(Error::PoolTimeout { .. })));

    for handle in [a, b, c] {
        handle.release(&pool).await.unwrap();
    }
    assert_eq!(pool.stats().idle, 3);
}

#[tokio::test]
async fn test_failed_lazy_construction_returns_permit() {
    let broker = MemoryBroker::new();
    broker.refuse_connections(1);
    let pool = pool(&broker, 1).await;
    assert_eq!(pool.stats().idle, 0);

    broker.refuse_connections(1);
    let err = pool.acquire(WAIT).await.unwrap_err();
    assert!(matches!(err, Error::HandleFault { .. }));
    assert_eq!(pool.stats().checked_out, 0);

    let handle = pool.acquire(WAIT).await.unwrap();
    assert_eq!(pool.stats().checked_out, 1);
    handle.release(&pool).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_construction_leaves_pool_degraded() {
    let broker = MemoryBroker::new();
    broker.set_connect_delay(Duration::from_secs(10));
    let options = PoolOptions { init_timeout: Duration::from_secs(1), ..PoolOptions::default() };

    let started = Instant::now();
    let pool = pool_with(&broker, 2, options).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(pool.stats().idle, 0);
    assert_eq!(pool.stats().constructed, 0);

    broker.set_connect_delay(Duration::ZERO);
    let handle = pool.acquire(WAIT).await.unwrap();
    assert_eq!(pool.stats().constructed, 1);
    handle.release(&pool).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_in_flight_construction() {
    let broker = MemoryBroker::new();
    broker.set_connect_delay(Duration::from_secs(10));
    let options = PoolOptions { init_timeout: Duration::from_secs(1), ..PoolOptions::default() };
    let pool = pool_with(&broker, 1, options).await;
    assert_eq!(pool.stats().idle, 0);

    broker.set_connect_delay(Duration::from_secs(5));
    let acquirer = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire(Duration::from_secs(30)).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let started = Instant::now();
    let report = pool.shutdown().await;

    assert!(started.elapsed() >= Duration::from_millis(4_990));
    assert_eq!(report.closed, 0);
    let handle = acquirer.await.unwrap().unwrap();
    assert_eq!(pool.stats().constructed, 1);

    handle.release(&pool).await.unwrap();
    assert_eq!(broker.close_calls(), 1);
    assert_eq!(pool.stats().idle, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_checkouts_never_exceed_capacity() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 4).await;
    let outstanding = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::new();
    for i in 0..32u32 {
        let pool = pool.clone();
        let outstanding = Arc::clone(&outstanding);
        let peak = Arc::clone(&peak);
        workers.push(tokio::spawn(async move {
            let handle = pool.acquire(Duration::from_secs(10)).await?;
            let now = outstanding.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);

            handle.send(i.to_be_bytes().to_vec()).await?;
            tokio::time::sleep(Duration::from_millis(2)).await;

            outstanding.fetch_sub(1, Ordering::SeqCst);
            handle.release(&pool).await
        }));
    }
    for worker in workers {
        worker.await.unwrap().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(broker.published(&orders()).len(), 32);
    let stats = pool.stats();
    assert_eq!(stats.checked_out, 0);
    assert_eq!(stats.idle, 4);
    assert_eq!(stats.constructed, 4);
}

#[tokio::test]
async fn test_discard_makes_room_for_replacement() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 1).await;

    let broken = pool.acquire(WAIT).await.unwrap();
    let broken_id = broken.id();
    pool.discard(broken).await.unwrap();

    assert_eq!(pool.stats().closed, 1);
    assert_eq!(pool.stats().checked_out, 0);
    let replacement = pool.acquire(WAIT).await.unwrap();
    assert_ne!(replacement.id(), broken_id);
    assert_eq!(pool.stats().constructed, 2);
}

#[tokio::test]
async fn test_foreign_handle_is_rejected() {
    let broker = MemoryBroker::new();
    let ours = pool(&broker, 1).await;
    let theirs = pool(&broker, 1).await;

    let stray = theirs.acquire(WAIT).await.unwrap();
    let stray_id = stray.id();
    let err = ours.release(stray).await.unwrap_err();

    assert_eq!(err, Error::ForeignHandle { handle: stray_id.to_string() });
    assert_eq!(ours.stats().idle, 1);
    assert_eq!(theirs.stats().checked_out, 0);
    assert_eq!(broker.close_calls(), 1);
}

#[tokio::test]
async fn test_send_variants() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 1).await;
    let handle = pool.acquire(WAIT).await.unwrap();

    handle.send_keyed("customer-7", "created").await.unwrap();
    handle.send_encoded("shipped", &Utf8Encoder).await.unwrap();
    handle.send_encoded(&json!({"id": 7}), &JsonEncoder).await.unwrap();
    let encode_len = |value: &Vec<u8>| Bytes::from(value.len().to_string());
    handle.send_encoded(&vec![1u8, 2, 3], &encode_len).await.unwrap();
    handle.release(&pool).await.unwrap();

    let published = broker.published(&orders());
    let payloads: Vec<&[u8]> = published.iter().map(|record| record.payload.as_ref()).collect();
    assert_eq!(
        payloads,
        vec![b"created".as_slice(), b"shipped".as_slice(), br#"{"id":7}"#.as_slice(), b"3".as_slice()]
    );
    assert_eq!(published[0].key, Some(Bytes::from_static(b"customer-7")));
    assert!(published[1..].iter().all(|record| record.key.is_none()));
}

#[tokio::test]
async fn test_rejected_send_is_a_handle_fault() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 1).await;
    let handle = pool.acquire(WAIT).await.unwrap();

    broker.reject_publishes(true);
    let err = handle.send("ping").await.unwrap_err();

    assert!(matches!(err, Error::HandleFault { .. }));
    assert!(err.is_retryable());
    pool.discard(handle).await.unwrap();
}

#[tokio::test]
async fn test_shut_down_handle_closes_connection() {
    let broker = MemoryBroker::new();
    let pool = pool(&broker, 2).await;
    let handle: PublishHandle = pool.acquire(WAIT).await.unwrap();

    handle.shut_down().await.unwrap();

    assert_eq!(broker.close_calls(), 1);
    assert_eq!(pool.stats().checked_out, 0);
}

#[tokio::test]
async fn test_async_dispatch_flushes_on_shutdown() {
    let broker = MemoryBroker::new();
    let options = PoolOptions {
        dispatch: DispatchMode::Async,
        async_buffer: 8,
        ..PoolOptions::default()
    };
    let pool = pool_with(&broker, 1, options).await;

    let handle = pool.acquire(WAIT).await.unwrap();
    for i in 0..50u32 {
        handle.send(i.to_string()).await.unwrap();
    }
    handle.release(&pool).await.unwrap();
    let report = pool.shutdown().await;

    assert_eq!(report.closed, 1);
    let published = broker.published(&orders());
    assert_eq!(published.len(), 50);
    assert_eq!(published[49].payload, Bytes::from("49"));
    assert_eq!(broker.close_calls(), 1);
    assert_eq!(
        broker.last_settings().unwrap().property("producer.type"),
        Some("async")
    );
}
