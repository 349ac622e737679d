//! Per-queue FIFO of visible messages with long-poll dequeue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::core::actor::MessageHandle;
use crate::types::MessageId;

/// Ordered sequence of message handles that are currently visible.
///
/// The mutex is only held for short, non-awaiting critical sections; long
/// polling parks on the notify and re-checks under the lock. Each enqueued
/// handle is handed to exactly one receiver.
pub struct VisibleQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

struct Inner {
    entries: VecDeque<Arc<MessageHandle>>,
    closed: bool,
}

impl VisibleQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail and wake one parked receiver.
    pub fn enqueue(&self, handle: Arc<MessageHandle>) {
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.entries.push_back(handle);
        }
        self.notify.notify_one();
    }

    /// Return handles taken by an abandoned receive to the head, preserving
    /// their original order.
    pub fn requeue_front(&self, handles: Vec<Arc<MessageHandle>>) {
        let count = handles.len();
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            for handle in handles.into_iter().rev() {
                inner.entries.push_front(handle);
            }
        }
        for _ in 0..count {
            self.notify.notify_one();
        }
    }

    /// Detach a message that is no longer visible. No-op when absent.
    pub fn remove(&self, id: &MessageId) {
        let mut inner = self.lock();
        inner.entries.retain(|h| &h.message_id != id);
    }

    /// Dequeue up to `max` handles, blocking up to `wait` while empty.
    ///
    /// Returns as soon as anything is available, taking as many entries as
    /// are present. An empty result means the wait elapsed or the queue was
    /// closed.
    pub async fn dequeue(&self, max: usize, wait: Duration) -> Vec<Arc<MessageHandle>> {
        let deadline = Instant::now() + wait;
        loop {
            // Register for wakeups before checking, so an enqueue between the
            // check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);

            {
                let mut inner = self.lock();
                if inner.closed {
                    return Vec::new();
                }
                if !inner.entries.is_empty() {
                    let take = max.min(inner.entries.len());
                    let batch: Vec<_> = inner.entries.drain(..take).collect();
                    let more = !inner.entries.is_empty();
                    drop(inner);
                    if more {
                        // Pass the wakeup on to the next parked receiver.
                        self.notify.notify_one();
                    }
                    return batch;
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Vec::new();
            }
        }
    }

    /// Drop every queued handle without closing the queue.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Wake every parked receiver; all subsequent dequeues return empty.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Number of currently visible messages.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True when no message is visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VisibleQueue {
    fn default() -> Self {
        Self::new()
    }
}
