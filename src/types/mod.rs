//! Common data types for vassal.

pub mod validation;

use chrono::Utc;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new random message ID.
    pub fn new() -> Self {
        MessageId(Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue configuration, fixed at creation.
///
/// Compared field-for-field when CreateQueue repeats an existing name: an
/// identical repeat is idempotent, a differing one is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Default delay applied to newly sent messages, in milliseconds.
    pub delay_ms: u64,
    /// Maximum message body size in bytes.
    pub max_message_bytes: usize,
    /// Message retention period in seconds.
    pub retention_secs: u64,
    /// Default long-poll wait for ReceiveMessage, in milliseconds.
    pub recv_wait_time_ms: u64,
    /// Default visibility lease, in milliseconds.
    pub visibility_timeout_ms: u64,
    /// Receives allowed before a message is dead-lettered.
    pub max_retries: Option<u32>,
    /// Name of the dead-letter queue.
    pub dead_letter_queue: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            max_message_bytes: validation::MAX_MESSAGE_SIZE,
            retention_secs: 345_600,
            recv_wait_time_ms: 0,
            visibility_timeout_ms: 30_000,
            max_retries: None,
            dead_letter_queue: None,
        }
    }
}

/// Lifecycle state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Waiting for its delay timer; not yet deliverable.
    Delayed,
    /// Eligible for delivery; referenced by the visible-message queue.
    Visible,
    /// Leased to a receiver until its visibility timer fires.
    InFlight,
    /// Terminal.
    Deleted,
}

/// A message and its runtime bookkeeping.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    /// Unique message ID, assigned at send.
    pub message_id: MessageId,
    /// Message body.
    pub body: String,
    /// Lowercase hex MD5 of the body bytes, computed at send.
    pub body_md5: String,
    /// Seconds since epoch when the message was sent.
    pub sent_timestamp: i64,
    /// Seconds since epoch of the first receive; set exactly once.
    pub first_receive_timestamp: Option<i64>,
    /// Number of times this message has been received. Never decreases.
    pub approx_receive_count: u32,
    /// Delay before the message became visible, in milliseconds.
    pub delay_ms: u64,
    /// Visibility lease used when a receive does not override it.
    pub visibility_timeout_ms: u64,
    /// Receives allowed before dead-lettering.
    pub max_retries: Option<u32>,
    /// Dead-letter queue name.
    pub dead_letter_queue: Option<String>,
}

impl MessageInfo {
    /// Build a fresh message from a body and its queue's configuration.
    pub fn new(body: String, config: &QueueConfig, delay_ms: Option<u64>) -> Self {
        let body_md5 = body_md5_hex(&body);
        Self {
            message_id: MessageId::new(),
            body_md5,
            body,
            sent_timestamp: Utc::now().timestamp(),
            first_receive_timestamp: None,
            approx_receive_count: 0,
            delay_ms: delay_ms.unwrap_or(config.delay_ms),
            visibility_timeout_ms: config.visibility_timeout_ms,
            max_retries: config.max_retries,
            dead_letter_queue: config.dead_letter_queue.clone(),
        }
    }
}

/// Lowercase hex MD5 of a message body's UTF-8 bytes.
pub fn body_md5_hex(body: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Result of a successful SendMessage.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Assigned message ID.
    pub message_id: MessageId,
    /// Lowercase hex MD5 of the body.
    pub body_md5: String,
}

/// A message delivered by ReceiveMessage.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Snapshot of the message at the moment of the receive.
    pub info: MessageInfo,
    /// Handle proving the caller holds this message in flight.
    pub receipt_handle: String,
    /// System attributes, already filtered by the request.
    pub attributes: Vec<(String, String)>,
}

/// Approximate per-queue message counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    /// Messages eligible for delivery.
    pub visible: usize,
    /// Messages leased to a receiver.
    pub in_flight: usize,
    /// Messages still waiting on their delay timer.
    pub delayed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_new() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();

        // Each ID should be unique
        assert_ne!(id1, id2);

        // Should be valid UUID format (36 chars with dashes)
        assert_eq!(id1.0.len(), 36);
    }

    #[test]
    fn test_message_id_display() {
        let id = MessageId("some-id".to_string());
        assert_eq!(format!("{}", id), "some-id");
    }

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();

        assert_eq!(config.delay_ms, 0);
        assert_eq!(config.max_message_bytes, 262_144);
        assert_eq!(config.retention_secs, 345_600);
        assert_eq!(config.recv_wait_time_ms, 0);
        assert_eq!(config.visibility_timeout_ms, 30_000);
        assert_eq!(config.max_retries, None);
        assert_eq!(config.dead_letter_queue, None);
    }

    #[test]
    fn test_queue_config_equality() {
        let a = QueueConfig::default();
        let mut b = QueueConfig::default();
        assert_eq!(a, b);

        b.visibility_timeout_ms = 60_000;
        assert_ne!(a, b);
    }

    #[test]
    fn test_body_md5() {
        assert_eq!(body_md5_hex("Hello, World!"), "65a8e27d8879283831b664bd8b7f0ad4");
        assert_eq!(body_md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_message_info_new() {
        let config = QueueConfig {
            delay_ms: 5_000,
            visibility_timeout_ms: 10_000,
            max_retries: Some(3),
            dead_letter_queue: Some("dlq".to_string()),
            ..QueueConfig::default()
        };

        let info = MessageInfo::new("hello".to_string(), &config, None);
        assert_eq!(info.body, "hello");
        assert_eq!(info.body_md5, body_md5_hex("hello"));
        assert_eq!(info.delay_ms, 5_000);
        assert_eq!(info.visibility_timeout_ms, 10_000);
        assert_eq!(info.max_retries, Some(3));
        assert_eq!(info.dead_letter_queue.as_deref(), Some("dlq"));
        assert_eq!(info.approx_receive_count, 0);
        assert!(info.first_receive_timestamp.is_none());

        // Per-message delay overrides the queue default
        let overridden = MessageInfo::new("hello".to_string(), &config, Some(0));
        assert_eq!(overridden.delay_ms, 0);
    }
}
