//! SQS action handler: validates requests, converts wire units, and runs
//! actions against the queue runtime.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, error, info};

use crate::core::store::QueueStore;
use crate::error::{Error, Result};
use crate::sqs::request::{extract_queue_name_from_url, SqsRequest};
use crate::sqs::response::{
    build_create_queue_response, build_empty_response, build_error_response,
    build_get_queue_attributes_response, build_get_queue_url_response,
    build_list_queues_response, build_receive_message_response, build_send_message_response,
};
use crate::sqs::types::SqsAction;
use crate::types::validation::{
    validate_queue_name, validate_seconds, MAX_BATCH_SIZE, MAX_DELAY_SECS, MAX_VISIBILITY_SECS,
    MAX_WAIT_SECS,
};
use crate::types::QueueConfig;

/// SQS action handler.
pub struct SqsHandler {
    store: Arc<QueueStore>,
    base_url: String,
}

impl SqsHandler {
    /// Create a new handler serving queues out of `store`, rendering queue
    /// URLs under `base_url`.
    pub fn new(store: Arc<QueueStore>, base_url: String) -> Self {
        info!(base_url = %base_url, "SQS handler initialized");
        Self { store, base_url }
    }

    /// Run one request to completion, returning the HTTP status and XML body.
    pub async fn handle_request(&self, request: SqsRequest) -> (StatusCode, String) {
        debug!(action = ?request.action, "handling SQS request");

        let result = match request.action {
            SqsAction::CreateQueue => self.handle_create_queue(&request).await,
            SqsAction::DeleteQueue => self.handle_delete_queue(&request).await,
            SqsAction::GetQueueUrl => self.handle_get_queue_url(&request).await,
            SqsAction::GetQueueAttributes => self.handle_get_queue_attributes(&request).await,
            SqsAction::ListQueues => self.handle_list_queues(&request).await,
            SqsAction::PurgeQueue => self.handle_purge_queue(&request).await,
            SqsAction::SendMessage => self.handle_send_message(&request).await,
            SqsAction::ReceiveMessage => self.handle_receive_message(&request).await,
            SqsAction::DeleteMessage => self.handle_delete_message(&request).await,
            SqsAction::ChangeMessageVisibility => {
                self.handle_change_message_visibility(&request).await
            }
        };

        match result {
            Ok(xml) => (StatusCode::OK, xml),
            Err(e) => {
                if let Error::Internal(_) = e {
                    error!(action = ?request.action, error = %e, "action failed internally");
                }
                (StatusCode::BAD_REQUEST, build_error_response(&e))
            }
        }
    }

    async fn handle_create_queue(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = request.get_required_param("QueueName")?;
        validate_queue_name(queue_name)?;

        let attributes = request.parse_queue_attributes();
        let config = queue_config_from_attributes(&attributes)?;

        let created = self.store.add_queue(queue_name, config).await?;
        if !created {
            debug!(queue = %queue_name, "queue already exists with identical attributes");
        }
        Ok(build_create_queue_response(&self.queue_url(queue_name)))
    }

    async fn handle_delete_queue(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = self.queue_name(request)?;
        if !self.store.queue_exists(&queue_name).await {
            return Err(Error::NonExistentQueue(queue_name));
        }
        self.store.remove_queue(&queue_name).await;
        Ok(build_empty_response("DeleteQueue"))
    }

    async fn handle_get_queue_url(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = request.get_required_param("QueueName")?;
        if !self.store.queue_exists(queue_name).await {
            return Err(Error::NonExistentQueue(queue_name.to_string()));
        }
        Ok(build_get_queue_url_response(&self.queue_url(queue_name)))
    }

    async fn handle_list_queues(&self, request: &SqsRequest) -> Result<String> {
        let prefix = request.get_param("QueueNamePrefix");
        let names = self.store.list_queues(prefix).await;
        let urls: Vec<String> = names.iter().map(|name| self.queue_url(name)).collect();
        Ok(build_list_queues_response(&urls))
    }

    async fn handle_purge_queue(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = self.queue_name(request)?;
        let coordinator = self.store.queue_handle(&queue_name).await?;
        coordinator.purge().await;
        info!(queue = %queue_name, "queue purged");
        Ok(build_empty_response("PurgeQueue"))
    }

    async fn handle_send_message(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = self.queue_name(request)?;
        let coordinator = self.store.queue_handle(&queue_name).await?;

        let body = request.get_required_param("MessageBody")?;
        let delay_ms = match request.get_param("DelaySeconds") {
            Some(value) => {
                let secs = parse_u64("DelaySeconds", value)?;
                validate_seconds("DelaySeconds", secs, MAX_DELAY_SECS)?;
                Some(secs * 1000)
            }
            None => None,
        };

        let receipt = coordinator.send_message(body.to_string(), delay_ms)?;
        Ok(build_send_message_response(&receipt))
    }

    async fn handle_receive_message(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = self.queue_name(request)?;
        let coordinator = self.store.queue_handle(&queue_name).await?;

        let max_messages = match request.get_param("MaxNumberOfMessages") {
            Some(value) => {
                let count = parse_u64("MaxNumberOfMessages", value)?;
                if count == 0 || count > u64::from(MAX_BATCH_SIZE) {
                    return Err(Error::InvalidParameterValue(format!(
                        "MaxNumberOfMessages must be between 1 and {}",
                        MAX_BATCH_SIZE
                    )));
                }
                count as usize
            }
            None => 1,
        };

        let wait_ms = match request.get_param("WaitTimeSeconds") {
            Some(value) => {
                let secs = parse_u64("WaitTimeSeconds", value)?;
                validate_seconds("WaitTimeSeconds", secs, MAX_WAIT_SECS)?;
                Some(secs * 1000)
            }
            None => None,
        };

        let visibility_ms = match request.get_param("VisibilityTimeout") {
            Some(value) => {
                let secs = parse_u64("VisibilityTimeout", value)?;
                validate_seconds("VisibilityTimeout", secs, MAX_VISIBILITY_SECS)?;
                Some(secs * 1000)
            }
            None => None,
        };

        let requested_attributes = request.parse_attribute_names();
        let messages = coordinator
            .receive_message(max_messages, wait_ms, visibility_ms, &requested_attributes)
            .await?;
        Ok(build_receive_message_response(&messages))
    }

    async fn handle_delete_message(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = self.queue_name(request)?;
        let coordinator = self.store.queue_handle(&queue_name).await?;

        let receipt_handle = request.get_required_param("ReceiptHandle")?;
        coordinator.delete_message(receipt_handle).await?;
        Ok(build_empty_response("DeleteMessage"))
    }

    async fn handle_change_message_visibility(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = self.queue_name(request)?;
        let coordinator = self.store.queue_handle(&queue_name).await?;

        let receipt_handle = request.get_required_param("ReceiptHandle")?;
        let secs = parse_u64(
            "VisibilityTimeout",
            request.get_required_param("VisibilityTimeout")?,
        )?;
        validate_seconds("VisibilityTimeout", secs, MAX_VISIBILITY_SECS)?;

        coordinator
            .change_visibility(receipt_handle, secs * 1000)
            .await?;
        Ok(build_empty_response("ChangeMessageVisibility"))
    }

    async fn handle_get_queue_attributes(&self, request: &SqsRequest) -> Result<String> {
        let queue_name = self.queue_name(request)?;
        let coordinator = self.store.queue_handle(&queue_name).await?;
        let config = coordinator.config();
        let stats = coordinator.stats();

        let mut all: Vec<(String, String)> = vec![
            (
                "VisibilityTimeout".to_string(),
                (config.visibility_timeout_ms / 1000).to_string(),
            ),
            ("DelaySeconds".to_string(), (config.delay_ms / 1000).to_string()),
            (
                "MaximumMessageSize".to_string(),
                config.max_message_bytes.to_string(),
            ),
            (
                "MessageRetentionPeriod".to_string(),
                config.retention_secs.to_string(),
            ),
            (
                "ReceiveMessageWaitTimeSeconds".to_string(),
                (config.recv_wait_time_ms / 1000).to_string(),
            ),
            (
                "ApproximateNumberOfMessages".to_string(),
                stats.visible.to_string(),
            ),
            (
                "ApproximateNumberOfMessagesNotVisible".to_string(),
                stats.in_flight.to_string(),
            ),
            (
                "ApproximateNumberOfMessagesDelayed".to_string(),
                stats.delayed.to_string(),
            ),
            (
                "QueueArn".to_string(),
                format!("arn:aws:sqs:local:000000000000:{}", queue_name),
            ),
        ];
        if let (Some(max_retries), Some(dlq)) = (config.max_retries, &config.dead_letter_queue) {
            all.push((
                "RedrivePolicy".to_string(),
                format!(
                    r#"{{"deadLetterTargetArn":"arn:aws:sqs:local:000000000000:{}","maxReceiveCount":"{}"}}"#,
                    dlq, max_retries
                ),
            ));
        }

        // No names requested means everything, matching AWS.
        let mut requested = request.parse_attribute_names();
        if requested.is_empty() {
            requested.push("All".to_string());
        }
        if !requested.iter().any(|name| name == "All") {
            all.retain(|(name, _)| requested.iter().any(|r| r == name));
        }

        Ok(build_get_queue_attributes_response(&all))
    }

    /// Queue name for a queue-scoped action: the `QueueUrl` parameter when
    /// present, otherwise the request path.
    fn queue_name(&self, request: &SqsRequest) -> Result<String> {
        if let Some(url) = request.get_param("QueueUrl") {
            return extract_queue_name_from_url(url)
                .ok_or_else(|| Error::InvalidParameterValue(format!("invalid QueueUrl: {}", url)));
        }
        request
            .queue_name
            .clone()
            .ok_or_else(|| Error::MissingParameter("QueueUrl".to_string()))
    }

    fn queue_url(&self, queue_name: &str) -> String {
        format!("{}/{}", self.base_url, queue_name)
    }
}

/// Build a queue configuration from CreateQueue attributes, converting
/// second-valued wire parameters to milliseconds.
fn queue_config_from_attributes(attributes: &HashMap<String, String>) -> Result<QueueConfig> {
    let mut config = QueueConfig::default();

    for (name, value) in attributes {
        match name.as_str() {
            "DelaySeconds" => {
                let secs = parse_u64(name, value)?;
                validate_seconds(name, secs, MAX_DELAY_SECS)?;
                config.delay_ms = secs * 1000;
            }
            "VisibilityTimeout" => {
                let secs = parse_u64(name, value)?;
                validate_seconds(name, secs, MAX_VISIBILITY_SECS)?;
                config.visibility_timeout_ms = secs * 1000;
            }
            "ReceiveMessageWaitTimeSeconds" => {
                let secs = parse_u64(name, value)?;
                validate_seconds(name, secs, MAX_WAIT_SECS)?;
                config.recv_wait_time_ms = secs * 1000;
            }
            "MessageRetentionPeriod" => {
                let secs = parse_u64(name, value)?;
                if !(60..=1_209_600).contains(&secs) {
                    return Err(Error::InvalidParameterValue(
                        "MessageRetentionPeriod must be between 60 and 1209600 seconds"
                            .to_string(),
                    ));
                }
                config.retention_secs = secs;
            }
            "MaximumMessageSize" => {
                let bytes = parse_u64(name, value)? as usize;
                if !(1024..=262_144).contains(&bytes) {
                    return Err(Error::InvalidParameterValue(
                        "MaximumMessageSize must be between 1024 and 262144 bytes".to_string(),
                    ));
                }
                config.max_message_bytes = bytes;
            }
            "RedrivePolicy" => {
                let (max_retries, dead_letter_queue) = parse_redrive_policy(value)?;
                config.max_retries = Some(max_retries);
                config.dead_letter_queue = Some(dead_letter_queue);
            }
            _ => {
                // Unknown attributes are ignored, matching AWS.
                debug!(attribute = %name, "ignoring unsupported queue attribute");
            }
        }
    }

    Ok(config)
}

/// Parse a RedrivePolicy JSON document:
/// `{"maxReceiveCount":"5","deadLetterTargetArn":"arn:aws:sqs:...:dlq"}`.
/// The DLQ name is the last ARN segment.
fn parse_redrive_policy(value: &str) -> Result<(u32, String)> {
    let policy: serde_json::Value = serde_json::from_str(value)
        .map_err(|_| Error::InvalidParameterValue("RedrivePolicy must be valid JSON".to_string()))?;

    let max_receive_count = match &policy["maxReceiveCount"] {
        serde_json::Value::String(s) => s.parse::<u32>().ok(),
        serde_json::Value::Number(n) => n.as_u64().map(|v| v as u32),
        _ => None,
    }
    .ok_or_else(|| {
        Error::InvalidParameterValue("RedrivePolicy requires a numeric maxReceiveCount".to_string())
    })?;

    let target_arn = policy["deadLetterTargetArn"].as_str().ok_or_else(|| {
        Error::InvalidParameterValue("RedrivePolicy requires deadLetterTargetArn".to_string())
    })?;
    let dlq_name = target_arn.split(':').next_back().unwrap_or(target_arn);
    if dlq_name.is_empty() {
        return Err(Error::InvalidParameterValue(
            "deadLetterTargetArn does not name a queue".to_string(),
        ));
    }

    Ok((max_receive_count, dlq_name.to_string()))
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        Error::InvalidParameterValue(format!("{} must be a non-negative integer", name))
    })
}
