//! Message actors: one task per live message.
//!
//! An actor owns its message's state machine, receive counter, timestamps,
//! and three timers (delay, visibility, retention). Commands arrive through
//! an mpsc mailbox and are handled one at a time, so every transition is
//! atomic with respect to the others; timer expirations are just more events
//! in the same loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, Instant, Sleep};
use tracing::{debug, warn};

use crate::core::store::QueueStore;
use crate::core::visible::VisibleQueue;
use crate::types::{MessageId, MessageInfo, MessageState};

const MAILBOX_CAPACITY: usize = 8;

enum Command {
    Receive {
        visibility_timeout_ms: Option<u64>,
        reply: oneshot::Sender<Option<MessageInfo>>,
    },
    ChangeVisibility {
        timeout_ms: u64,
        reply: oneshot::Sender<()>,
    },
    Delete {
        reply: oneshot::Sender<()>,
    },
}

/// Shared face of a message actor.
///
/// Held by the visible-message queue, the receipt table, and the owning
/// coordinator's message set. Operations on a terminated actor are no-ops.
pub struct MessageHandle {
    /// Identifier of the message behind this handle.
    pub message_id: MessageId,
    mailbox: mpsc::Sender<Command>,
    /// Mirror of `approx_receive_count`, read by the receipt table to decide
    /// whether a handle is still the latest one.
    receive_count: AtomicU32,
}

impl MessageHandle {
    /// Current receive generation.
    pub fn generation(&self) -> u32 {
        self.receive_count.load(Ordering::Acquire)
    }

    /// Ask the actor to transition to in-flight, returning a snapshot of the
    /// message. `None` when the message is no longer visible (deleted,
    /// expired, or dead-lettered in the meantime).
    pub async fn receive(&self, visibility_timeout_ms: Option<u64>) -> Option<MessageInfo> {
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(Command::Receive {
                visibility_timeout_ms,
                reply,
            })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Reset the visibility timer. Only meaningful while in flight; zero
    /// makes the message immediately receivable again.
    pub async fn change_visibility(&self, timeout_ms: u64) {
        let (reply, rx) = oneshot::channel();
        if self
            .mailbox
            .send(Command::ChangeVisibility { timeout_ms, reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Terminate the actor. Idempotent; deleting an already-dead message is
    /// a no-op.
    pub async fn delete(&self) {
        let (reply, rx) = oneshot::channel();
        if self.mailbox.send(Command::Delete { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(message_id: MessageId) -> Arc<Self> {
        let (mailbox, _) = mpsc::channel(1);
        Arc::new(Self {
            message_id,
            mailbox,
            receive_count: AtomicU32::new(0),
        })
    }

    #[cfg(test)]
    pub(crate) fn set_generation(&self, generation: u32) {
        self.receive_count.store(generation, Ordering::Release);
    }
}

/// Queue-side collaborators handed to each actor.
pub(crate) struct ActorContext {
    pub(crate) queue_name: String,
    pub(crate) visible: Arc<VisibleQueue>,
    pub(crate) messages: Arc<Mutex<HashMap<MessageId, Arc<MessageHandle>>>>,
    pub(crate) store: Weak<QueueStore>,
    pub(crate) retention: Duration,
}

/// Spawn an actor for a freshly sent message.
///
/// Zero-delay messages are enqueued on the visible queue before this
/// returns, so visibility order matches send order for sequential senders.
pub(crate) fn spawn(
    info: MessageInfo,
    ctx: ActorContext,
    shutdown: broadcast::Receiver<()>,
) -> Arc<MessageHandle> {
    let (mailbox, rx) = mpsc::channel(MAILBOX_CAPACITY);
    let handle = Arc::new(MessageHandle {
        message_id: info.message_id.clone(),
        mailbox,
        receive_count: AtomicU32::new(info.approx_receive_count),
    });

    let now = Instant::now();
    let (state, delay_deadline) = if info.delay_ms == 0 {
        (MessageState::Visible, None)
    } else {
        (
            MessageState::Delayed,
            Some(now + Duration::from_millis(info.delay_ms)),
        )
    };
    if state == MessageState::Visible {
        ctx.visible.enqueue(handle.clone());
    }

    let actor = MessageActor {
        retention_deadline: now + ctx.retention,
        delay_deadline,
        visibility_deadline: None,
        state,
        handle: handle.clone(),
        info,
        ctx,
    };
    tokio::spawn(actor.run(rx, shutdown));
    handle
}

struct MessageActor {
    info: MessageInfo,
    state: MessageState,
    handle: Arc<MessageHandle>,
    ctx: ActorContext,
    delay_deadline: Option<Instant>,
    visibility_deadline: Option<Instant>,
    retention_deadline: Instant,
}

fn sleep_opt(deadline: Option<Instant>) -> Sleep {
    // Disabled select branches still evaluate their expression; park far out.
    const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);
    sleep_until(deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE))
}

impl MessageActor {
    async fn run(mut self, mut mailbox: mpsc::Receiver<Command>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                cmd = mailbox.recv() => match cmd {
                    Some(Command::Receive { visibility_timeout_ms, reply }) => {
                        let (snapshot, done) = self.on_receive(visibility_timeout_ms).await;
                        let _ = reply.send(snapshot);
                        if done {
                            break;
                        }
                    }
                    Some(Command::ChangeVisibility { timeout_ms, reply }) => {
                        self.on_change_visibility(timeout_ms);
                        let _ = reply.send(());
                    }
                    Some(Command::Delete { reply }) => {
                        self.terminate();
                        let _ = reply.send(());
                        break;
                    }
                    // Every holder of the handle is gone.
                    None => break,
                },
                _ = sleep_opt(self.delay_deadline), if self.delay_deadline.is_some() => {
                    self.on_delay_expired();
                }
                _ = sleep_opt(self.visibility_deadline), if self.visibility_deadline.is_some() => {
                    self.on_visibility_expired();
                }
                _ = sleep_until(self.retention_deadline) => {
                    debug!(
                        queue = %self.ctx.queue_name,
                        message_id = %self.info.message_id,
                        "message retention expired"
                    );
                    self.terminate();
                    break;
                }
                _ = shutdown.recv() => break,
            }
        }
    }

    async fn on_receive(
        &mut self,
        visibility_timeout_ms: Option<u64>,
    ) -> (Option<MessageInfo>, bool) {
        if self.state != MessageState::Visible {
            return (None, false);
        }

        self.info.approx_receive_count += 1;
        self.handle
            .receive_count
            .store(self.info.approx_receive_count, Ordering::Release);
        if self.info.first_receive_timestamp.is_none() {
            self.info.first_receive_timestamp = Some(Utc::now().timestamp());
        }

        if let Some(max_retries) = self.info.max_retries {
            if self.info.approx_receive_count > max_retries {
                self.dead_letter().await;
                self.terminate();
                return (None, true);
            }
        }

        self.state = MessageState::InFlight;
        let lease = visibility_timeout_ms.unwrap_or(self.info.visibility_timeout_ms);
        self.visibility_deadline = Some(Instant::now() + Duration::from_millis(lease));
        (Some(self.info.clone()), false)
    }

    fn on_change_visibility(&mut self, timeout_ms: u64) {
        if self.state != MessageState::InFlight {
            return;
        }
        if timeout_ms == 0 {
            self.state = MessageState::Visible;
            self.visibility_deadline = None;
            self.ctx.visible.enqueue(self.handle.clone());
        } else {
            self.visibility_deadline = Some(Instant::now() + Duration::from_millis(timeout_ms));
        }
    }

    fn on_delay_expired(&mut self) {
        self.delay_deadline = None;
        self.state = MessageState::Visible;
        self.ctx.visible.enqueue(self.handle.clone());
    }

    fn on_visibility_expired(&mut self) {
        self.visibility_deadline = None;
        self.state = MessageState::Visible;
        debug!(
            queue = %self.ctx.queue_name,
            message_id = %self.info.message_id,
            receive_count = self.info.approx_receive_count,
            "visibility timeout expired, message requeued"
        );
        self.ctx.visible.enqueue(self.handle.clone());
    }

    /// Route the message body to the configured dead-letter queue. The DLQ
    /// copy gets a fresh message id.
    async fn dead_letter(&self) {
        let Some(dlq_name) = self.info.dead_letter_queue.as_deref() else {
            return;
        };
        let Some(store) = self.ctx.store.upgrade() else {
            return;
        };
        match store.queue_handle(dlq_name).await {
            Ok(dlq) => match dlq.send_message(self.info.body.clone(), None) {
                Ok(receipt) => debug!(
                    queue = %self.ctx.queue_name,
                    dlq = %dlq_name,
                    message_id = %self.info.message_id,
                    dlq_message_id = %receipt.message_id,
                    receive_count = self.info.approx_receive_count,
                    "message dead-lettered"
                ),
                Err(e) => warn!(
                    queue = %self.ctx.queue_name,
                    dlq = %dlq_name,
                    message_id = %self.info.message_id,
                    error = %e,
                    "failed to dead-letter message"
                ),
            },
            Err(e) => warn!(
                queue = %self.ctx.queue_name,
                dlq = %dlq_name,
                message_id = %self.info.message_id,
                error = %e,
                "dead-letter queue unavailable, dropping message"
            ),
        }
    }

    fn terminate(&mut self) {
        self.state = MessageState::Deleted;
        self.delay_deadline = None;
        self.visibility_deadline = None;
        self.ctx.visible.remove(&self.info.message_id);
        self.ctx
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.info.message_id);
    }
}
