//! SQS action names.

use std::str::FromStr;

use crate::error::Error;

/// SQS actions understood by this emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqsAction {
    /// Create a new queue.
    CreateQueue,
    /// Delete a queue and everything in it.
    DeleteQueue,
    /// Get a queue URL from its name.
    GetQueueUrl,
    /// Get queue attributes.
    GetQueueAttributes,
    /// List queues.
    ListQueues,
    /// Discard all messages in a queue.
    PurgeQueue,
    /// Send a message.
    SendMessage,
    /// Receive messages, optionally long-polling.
    ReceiveMessage,
    /// Delete a message by receipt handle.
    DeleteMessage,
    /// Change an in-flight message's visibility timeout.
    ChangeMessageVisibility,
}

impl FromStr for SqsAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CreateQueue" => Ok(Self::CreateQueue),
            "DeleteQueue" => Ok(Self::DeleteQueue),
            "GetQueueUrl" => Ok(Self::GetQueueUrl),
            "GetQueueAttributes" => Ok(Self::GetQueueAttributes),
            "ListQueues" => Ok(Self::ListQueues),
            "PurgeQueue" => Ok(Self::PurgeQueue),
            "SendMessage" => Ok(Self::SendMessage),
            "ReceiveMessage" => Ok(Self::ReceiveMessage),
            "DeleteMessage" => Ok(Self::DeleteMessage),
            "ChangeMessageVisibility" => Ok(Self::ChangeMessageVisibility),
            _ => Err(Error::InvalidAction(s.to_string())),
        }
    }
}

impl SqsAction {
    /// Action name as it appears in request and response documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateQueue => "CreateQueue",
            Self::DeleteQueue => "DeleteQueue",
            Self::GetQueueUrl => "GetQueueUrl",
            Self::GetQueueAttributes => "GetQueueAttributes",
            Self::ListQueues => "ListQueues",
            Self::PurgeQueue => "PurgeQueue",
            Self::SendMessage => "SendMessage",
            Self::ReceiveMessage => "ReceiveMessage",
            Self::DeleteMessage => "DeleteMessage",
            Self::ChangeMessageVisibility => "ChangeMessageVisibility",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        assert_eq!("CreateQueue".parse::<SqsAction>().ok(), Some(SqsAction::CreateQueue));
        assert_eq!("SendMessage".parse::<SqsAction>().ok(), Some(SqsAction::SendMessage));
        assert_eq!(
            "ReceiveMessage".parse::<SqsAction>().ok(),
            Some(SqsAction::ReceiveMessage)
        );
        assert!(matches!(
            "SendMessageBatch".parse::<SqsAction>(),
            Err(Error::InvalidAction(_))
        ));
    }

    #[test]
    fn test_action_roundtrip() {
        for name in [
            "CreateQueue",
            "DeleteQueue",
            "GetQueueUrl",
            "GetQueueAttributes",
            "ListQueues",
            "PurgeQueue",
            "SendMessage",
            "ReceiveMessage",
            "DeleteMessage",
            "ChangeMessageVisibility",
        ] {
            let action: SqsAction = name.parse().expect("known action");
            assert_eq!(action.as_str(), name);
        }
    }
}
