//! Per-queue coordinator: the façade every action goes through.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use crate::core::actor::{self, ActorContext, MessageHandle};
use crate::core::receipt::ReceiptTable;
use crate::core::store::QueueStore;
use crate::core::visible::VisibleQueue;
use crate::error::{Error, Result};
use crate::types::{
    MessageId, MessageInfo, QueueConfig, QueueStats, ReceivedMessage, SendReceipt,
};

/// Largest number of messages one receive may return.
pub const MAX_RECEIVE_BATCH: usize = 10;

type MessageSet = Arc<Mutex<HashMap<MessageId, Arc<MessageHandle>>>>;

/// Runs a single queue by composing its visible-message queue, receipt
/// table, and message actors.
pub struct QueueCoordinator {
    name: String,
    config: QueueConfig,
    visible: Arc<VisibleQueue>,
    receipts: ReceiptTable,
    messages: MessageSet,
    store: Weak<QueueStore>,
    shutdown: broadcast::Sender<()>,
}

impl QueueCoordinator {
    pub(crate) fn new(name: String, config: QueueConfig, store: Weak<QueueStore>) -> Arc<Self> {
        let (shutdown, _) = broadcast::channel(1);
        Arc::new(Self {
            name,
            config,
            visible: Arc::new(VisibleQueue::new()),
            receipts: ReceiptTable::new(),
            messages: Arc::new(Mutex::new(HashMap::new())),
            store,
            shutdown,
        })
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue configuration, fixed at creation.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn message_set(&self) -> MutexGuard<'_, HashMap<MessageId, Arc<MessageHandle>>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn actor_context(&self) -> ActorContext {
        ActorContext {
            queue_name: self.name.clone(),
            visible: self.visible.clone(),
            messages: self.messages.clone(),
            store: self.store.clone(),
            retention: Duration::from_secs(self.config.retention_secs),
        }
    }

    /// Create a message actor for `body`. A zero-delay message is visible by
    /// the time this returns.
    pub fn send_message(&self, body: String, delay_ms: Option<u64>) -> Result<SendReceipt> {
        if body.len() > self.config.max_message_bytes {
            return Err(Error::InvalidParameterValue(format!(
                "message body is {} bytes; this queue allows at most {}",
                body.len(),
                self.config.max_message_bytes
            )));
        }

        let info = MessageInfo::new(body, &self.config, delay_ms);
        let receipt = SendReceipt {
            message_id: info.message_id.clone(),
            body_md5: info.body_md5.clone(),
        };
        let handle = actor::spawn(info, self.actor_context(), self.shutdown.subscribe());
        self.message_set().insert(handle.message_id.clone(), handle);

        debug!(
            queue = %self.name,
            message_id = %receipt.message_id,
            "message sent"
        );
        Ok(receipt)
    }

    /// Long-poll receive of up to `max_messages` messages.
    ///
    /// Waits up to the effective wait time for something to become visible,
    /// retrying when every dequeued reference lost a race with deletion. An
    /// empty result is normal when the wait elapses or the queue is torn
    /// down mid-poll.
    pub async fn receive_message(
        &self,
        max_messages: usize,
        wait_ms: Option<u64>,
        visibility_timeout_ms: Option<u64>,
        requested_attributes: &[String],
    ) -> Result<Vec<ReceivedMessage>> {
        let max = max_messages.clamp(1, MAX_RECEIVE_BATCH);
        let wait = Duration::from_millis(wait_ms.unwrap_or(self.config.recv_wait_time_ms));
        let deadline = Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let batch = self.visible.dequeue(max, remaining).await;
            if batch.is_empty() {
                // Wait elapsed or queue closed.
                return Ok(Vec::new());
            }

            // If this future is dropped before every reference was offered to
            // its actor, the guard puts the leftovers back at the head.
            let mut pending = PendingBatch::new(&self.visible, batch);
            let mut delivered = Vec::new();
            while let Some(handle) = pending.next() {
                if let Some(info) = handle.receive(visibility_timeout_ms).await {
                    let receipt_handle = self.receipts.issue(handle.clone());
                    delivered.push(ReceivedMessage {
                        attributes: filter_attributes(&info, requested_attributes),
                        info,
                        receipt_handle,
                    });
                }
            }

            if !delivered.is_empty() {
                debug!(
                    queue = %self.name,
                    count = delivered.len(),
                    "messages received"
                );
                return Ok(delivered);
            }
            // Every reference raced with a delete; poll again until the
            // deadline.
        }
    }

    /// Delete the message behind a receipt handle.
    pub async fn delete_message(&self, receipt_handle: &str) -> Result<()> {
        let handle = self.receipts.resolve(receipt_handle)?;
        handle.delete().await;
        self.receipts.revoke(receipt_handle);
        debug!(
            queue = %self.name,
            message_id = %handle.message_id,
            "message deleted"
        );
        Ok(())
    }

    /// Reset the visibility timer of the message behind a receipt handle.
    /// The handle stays valid afterwards.
    pub async fn change_visibility(&self, receipt_handle: &str, timeout_ms: u64) -> Result<()> {
        let handle = self.receipts.resolve(receipt_handle)?;
        handle.change_visibility(timeout_ms).await;
        debug!(
            queue = %self.name,
            message_id = %handle.message_id,
            timeout_ms,
            "message visibility changed"
        );
        Ok(())
    }

    /// Discard every message in the queue. The queue itself stays usable.
    pub async fn purge(&self) {
        let handles: Vec<_> = self.message_set().drain().map(|(_, h)| h).collect();
        self.visible.clear();
        self.receipts.clear();
        let purged = handles.len();
        for handle in handles {
            handle.delete().await;
        }
        debug!(queue = %self.name, messages_purged = purged, "queue purged");
    }

    /// Approximate message counts.
    pub fn stats(&self) -> QueueStats {
        let total = self.message_set().len();
        let visible = self.visible.len();
        let in_flight = self.receipts.len();
        QueueStats {
            visible,
            in_flight,
            delayed: total.saturating_sub(visible + in_flight),
        }
    }

    /// Tear the queue down: wake blocked receives with an empty result, stop
    /// every actor, and drop all tables. Used by DeleteQueue and process
    /// shutdown.
    pub(crate) fn shutdown(&self) {
        self.visible.close();
        let _ = self.shutdown.send(());
        self.receipts.clear();
        self.message_set().clear();
    }
}

/// Dequeued references not yet offered to their actors. Dropping the batch
/// returns the leftovers to the head of the visible queue so a cancelled
/// receive leaks nothing.
struct PendingBatch<'a> {
    visible: &'a VisibleQueue,
    handles: VecDeque<Arc<MessageHandle>>,
}

impl<'a> PendingBatch<'a> {
    fn new(visible: &'a VisibleQueue, handles: Vec<Arc<MessageHandle>>) -> Self {
        Self {
            visible,
            handles: handles.into(),
        }
    }

    fn next(&mut self) -> Option<Arc<MessageHandle>> {
        self.handles.pop_front()
    }
}

impl Drop for PendingBatch<'_> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.visible.requeue_front(self.handles.drain(..).collect());
        }
    }
}

/// System attributes exposed on receive, filtered by the request.
/// `"All"` selects everything.
fn filter_attributes(info: &MessageInfo, requested: &[String]) -> Vec<(String, String)> {
    let all = requested.iter().any(|name| name == "All");
    let wanted = |name: &str| all || requested.iter().any(|r| r == name);

    let mut attributes = Vec::new();
    if wanted("SentTimestamp") {
        attributes.push(("SentTimestamp".to_string(), info.sent_timestamp.to_string()));
    }
    if wanted("ApproximateReceiveCount") {
        attributes.push((
            "ApproximateReceiveCount".to_string(),
            info.approx_receive_count.to_string(),
        ));
    }
    if wanted("ApproximateFirstReceiveTimestamp") {
        if let Some(first) = info.first_receive_timestamp {
            attributes.push((
                "ApproximateFirstReceiveTimestamp".to_string(),
                first.to_string(),
            ));
        }
    }
    attributes
}
