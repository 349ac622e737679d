//! Integration tests for the queue runtime, exercised directly through the
//! queue store and coordinators.

use std::sync::Arc;
use std::time::Duration;

use vassal::core::{QueueCoordinator, QueueStore};
use vassal::types::QueueConfig;
use vassal::Error;

/// Helper: create a queue and return its coordinator.
async fn queue(store: &Arc<QueueStore>, name: &str, config: QueueConfig) -> Arc<QueueCoordinator> {
    store
        .add_queue(name, config)
        .await
        .expect("queue creation should succeed");
    store
        .queue_handle(name)
        .await
        .expect("queue should exist after creation")
}

fn all() -> Vec<String> {
    vec!["All".to_string()]
}

#[tokio::test]
async fn test_send_then_receive_roundtrip() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;

    let sent = q
        .send_message("hello".to_string(), None)
        .expect("send should succeed");

    let received = q
        .receive_message(1, Some(0), None, &all())
        .await
        .expect("receive should succeed");
    assert_eq!(received.len(), 1);

    let message = &received[0];
    assert_eq!(message.info.message_id, sent.message_id);
    assert_eq!(message.info.body, "hello");
    assert_eq!(message.info.body_md5, sent.body_md5);
    assert_eq!(message.info.approx_receive_count, 1);
    assert!(!message.receipt_handle.is_empty());
}

#[tokio::test]
async fn test_in_flight_message_is_hidden() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    q.send_message("hello".to_string(), None)
        .expect("send should succeed");

    let first = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert_eq!(first.len(), 1);

    // The message is in flight; an immediate second receive sees nothing.
    let second = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert!(second.is_empty());
}

#[tokio::test]
async fn test_visibility_expiry_redelivers_with_bumped_count() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    q.send_message("hello".to_string(), None)
        .expect("send should succeed");

    let first = q
        .receive_message(1, Some(0), Some(100), &[])
        .await
        .expect("receive should succeed");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].info.approx_receive_count, 1);

    // Wait past the 100ms visibility lease.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].info.message_id, first[0].info.message_id);
    assert_eq!(second[0].info.approx_receive_count, 2);
}

#[tokio::test]
async fn test_deleted_message_is_never_redelivered() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    q.send_message("hello".to_string(), None)
        .expect("send should succeed");

    let received = q
        .receive_message(1, Some(0), Some(100), &[])
        .await
        .expect("receive should succeed");
    let handle = received[0].receipt_handle.clone();

    q.delete_message(&handle)
        .await
        .expect("delete should succeed");

    // Even after the visibility lease would have expired, nothing comes back.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let after = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert!(after.is_empty());

    // A second delete of the same handle is rejected.
    assert!(matches!(
        q.delete_message(&handle).await,
        Err(Error::ReceiptHandleIsInvalid)
    ));
}

#[tokio::test]
async fn test_timestamps_are_sane() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    let before = chrono::Utc::now().timestamp();

    q.send_message("hello".to_string(), None)
        .expect("send should succeed");
    let received = q
        .receive_message(1, Some(0), None, &all())
        .await
        .expect("receive should succeed");
    let after = chrono::Utc::now().timestamp();

    let info = &received[0].info;
    let first_receive = info
        .first_receive_timestamp
        .expect("first receive timestamp should be set");
    assert!(info.sent_timestamp <= first_receive);
    assert!(info.sent_timestamp >= before - 1);
    assert!(first_receive <= after + 1);
}

#[tokio::test]
async fn test_zero_delay_messages_arrive_in_send_order() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;

    let mut sent_ids = Vec::new();
    for i in 0..10 {
        let receipt = q
            .send_message(format!("m{}", i), None)
            .expect("send should succeed");
        sent_ids.push(receipt.message_id);
    }

    let mut received_ids = Vec::new();
    while received_ids.len() < sent_ids.len() {
        let batch = q
            .receive_message(1, Some(0), None, &[])
            .await
            .expect("receive should succeed");
        assert_eq!(batch.len(), 1, "sequential receiver should drain one by one");
        received_ids.push(batch[0].info.message_id.clone());
    }

    assert_eq!(received_ids, sent_ids);
}

#[tokio::test]
async fn test_delayed_message_appears_after_delay() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;

    q.send_message("x".to_string(), Some(300))
        .expect("send should succeed");

    // Not visible yet.
    let immediate = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert!(immediate.is_empty());

    // A long poll spanning the delay picks it up.
    let started = std::time::Instant::now();
    let polled = q
        .receive_message(1, Some(2_000), None, &[])
        .await
        .expect("receive should succeed");
    assert_eq!(polled.len(), 1);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(200), "waited {:?}", waited);
    assert!(waited < Duration::from_secs(2), "waited {:?}", waited);
}

#[tokio::test]
async fn test_long_poll_wakes_on_concurrent_send() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;

    let receiver = {
        let q = q.clone();
        tokio::spawn(async move { q.receive_message(1, Some(5_000), None, &[]).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    q.send_message("wake up".to_string(), None)
        .expect("send should succeed");

    let received = receiver
        .await
        .expect("receiver task panicked")
        .expect("receive should succeed");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].info.body, "wake up");
}

#[tokio::test]
async fn test_wait_elapses_with_empty_result() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;

    let started = std::time::Instant::now();
    let received = q
        .receive_message(1, Some(200), None, &[])
        .await
        .expect("receive should succeed");
    assert!(received.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_receive_count_increments_per_receive() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    q.send_message("counted".to_string(), None)
        .expect("send should succeed");

    for expected in 1..=3u32 {
        let received = q
            .receive_message(1, Some(0), Some(0), &[])
            .await
            .expect("receive should succeed");
        assert_eq!(received.len(), 1, "receive {} should deliver", expected);
        assert_eq!(received[0].info.approx_receive_count, expected);
        // Zero visibility puts it straight back; give the actor a beat.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_change_visibility_to_zero_requeues_immediately() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    q.send_message("hello".to_string(), None)
        .expect("send should succeed");

    let received = q
        .receive_message(1, Some(0), Some(30_000), &[])
        .await
        .expect("receive should succeed");
    let handle = received[0].receipt_handle.clone();

    q.change_visibility(&handle, 0)
        .await
        .expect("change visibility should succeed");

    let again = q
        .receive_message(1, Some(1_000), None, &[])
        .await
        .expect("receive should succeed");
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].info.approx_receive_count, 2);
}

#[tokio::test]
async fn test_change_visibility_extends_the_lease() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    q.send_message("hello".to_string(), None)
        .expect("send should succeed");

    let received = q
        .receive_message(1, Some(0), Some(100), &[])
        .await
        .expect("receive should succeed");
    let handle = received[0].receipt_handle.clone();

    // Push the lease well past the original 100ms.
    q.change_visibility(&handle, 60_000)
        .await
        .expect("change visibility should succeed");

    tokio::time::sleep(Duration::from_millis(300)).await;
    let after = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert!(after.is_empty(), "message should still be leased");

    // The handle survived the visibility change.
    q.delete_message(&handle)
        .await
        .expect("delete with the same handle should succeed");
}

#[tokio::test]
async fn test_only_latest_receipt_handle_is_valid() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    q.send_message("hello".to_string(), None)
        .expect("send should succeed");

    let first = q
        .receive_message(1, Some(0), Some(100), &[])
        .await
        .expect("receive should succeed");
    let old_handle = first[0].receipt_handle.clone();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    let new_handle = second[0].receipt_handle.clone();
    assert_ne!(old_handle, new_handle);

    // The superseded handle no longer works.
    assert!(matches!(
        q.delete_message(&old_handle).await,
        Err(Error::ReceiptHandleIsInvalid)
    ));
    // The latest one does.
    q.delete_message(&new_handle)
        .await
        .expect("latest handle should delete");
}

#[tokio::test]
async fn test_body_size_limit_is_exact() {
    let store = QueueStore::new();
    let config = QueueConfig {
        max_message_bytes: 1024,
        ..QueueConfig::default()
    };
    let q = queue(&store, "q1", config).await;

    // Exactly at the limit succeeds.
    q.send_message("a".repeat(1024), None)
        .expect("exact-limit body should be accepted");

    // One byte over fails.
    assert!(matches!(
        q.send_message("a".repeat(1025), None),
        Err(Error::InvalidParameterValue(_))
    ));
}

#[tokio::test]
async fn test_receive_batch_clamps_to_available() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    for i in 0..3 {
        q.send_message(format!("m{}", i), None)
            .expect("send should succeed");
    }

    let received = q
        .receive_message(10, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn test_max_retries_routes_to_dead_letter_queue() {
    let store = QueueStore::new();
    let dlq = queue(&store, "dlq", QueueConfig::default()).await;
    let config = QueueConfig {
        max_retries: Some(2),
        dead_letter_queue: Some("dlq".to_string()),
        ..QueueConfig::default()
    };
    let q = queue(&store, "q1", config).await;

    q.send_message("x".to_string(), None)
        .expect("send should succeed");

    // Two deliveries, each followed by a visibility expiry.
    for attempt in 1..=2u32 {
        let received = q
            .receive_message(1, Some(0), Some(100), &[])
            .await
            .expect("receive should succeed");
        assert_eq!(received.len(), 1, "attempt {} should deliver", attempt);
        assert_eq!(received[0].info.approx_receive_count, attempt);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    // The third attempt trips max_retries: the origin queue yields nothing.
    let third = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert!(third.is_empty());

    // The body landed on the DLQ under a fresh message id.
    let dead = dlq
        .receive_message(1, Some(1_000), None, &[])
        .await
        .expect("DLQ receive should succeed");
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].info.body, "x");
    assert_eq!(dead[0].info.approx_receive_count, 1);

    // And nothing ever comes back on the origin.
    let after = q
        .receive_message(1, Some(200), None, &[])
        .await
        .expect("receive should succeed");
    assert!(after.is_empty());
}

#[tokio::test]
async fn test_retention_expiry_discards_message() {
    let store = QueueStore::new();
    let config = QueueConfig {
        retention_secs: 1,
        ..QueueConfig::default()
    };
    let q = queue(&store, "q1", config).await;

    q.send_message("short-lived".to_string(), None)
        .expect("send should succeed");

    tokio::time::sleep(Duration::from_millis(1_200)).await;

    let received = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert!(received.is_empty());
    assert_eq!(q.stats().visible, 0);
}

#[tokio::test]
async fn test_delete_queue_wakes_blocked_receive() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;

    let receiver = {
        let q = q.clone();
        tokio::spawn(async move { q.receive_message(1, Some(30_000), None, &[]).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    store.remove_queue("q1").await;

    let result = tokio::time::timeout(Duration::from_secs(2), receiver)
        .await
        .expect("blocked receive should be woken by queue deletion")
        .expect("receiver task panicked")
        .expect("receive should not error");
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_purge_discards_visible_and_in_flight() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;

    for i in 0..3 {
        q.send_message(format!("m{}", i), None)
            .expect("send should succeed");
    }
    // Put one in flight.
    let received = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    let handle = received[0].receipt_handle.clone();

    q.purge().await;

    let after = q
        .receive_message(10, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert!(after.is_empty());
    assert!(matches!(
        q.delete_message(&handle).await,
        Err(Error::ReceiptHandleIsInvalid)
    ));

    // The queue itself survives a purge.
    q.send_message("fresh".to_string(), None)
        .expect("send after purge should succeed");
    let fresh = q
        .receive_message(1, Some(0), None, &[])
        .await
        .expect("receive should succeed");
    assert_eq!(fresh.len(), 1);
}

#[tokio::test]
async fn test_concurrent_receivers_never_share_a_message() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;

    for i in 0..50 {
        q.send_message(format!("m{}", i), None)
            .expect("send should succeed");
    }

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let q = q.clone();
        tasks.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            loop {
                let batch = q
                    .receive_message(10, Some(0), None, &[])
                    .await
                    .expect("receive should succeed");
                if batch.is_empty() {
                    break;
                }
                ids.extend(batch.into_iter().map(|m| m.info.message_id));
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for task in tasks {
        all_ids.extend(task.await.expect("receiver task panicked"));
    }
    let total = all_ids.len();
    all_ids.sort_by(|a, b| a.0.cmp(&b.0));
    all_ids.dedup();
    assert_eq!(all_ids.len(), total, "a message was delivered twice");
    assert_eq!(total, 50);
}

#[tokio::test]
async fn test_attribute_filtering_on_receive() {
    let store = QueueStore::new();
    let q = queue(&store, "q1", QueueConfig::default()).await;
    q.send_message("hello".to_string(), None)
        .expect("send should succeed");

    let requested = vec!["ApproximateReceiveCount".to_string()];
    let received = q
        .receive_message(1, Some(0), None, &requested)
        .await
        .expect("receive should succeed");

    let names: Vec<_> = received[0]
        .attributes
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["ApproximateReceiveCount"]);
}
