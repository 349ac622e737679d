//! Validation for queue names and request parameter bounds.

use crate::error::{Error, Result};

/// Maximum message body size in bytes (256 KB).
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// Maximum number of messages one ReceiveMessage may return.
pub const MAX_BATCH_SIZE: u32 = 10;

/// Maximum DelaySeconds accepted by SendMessage and CreateQueue.
pub const MAX_DELAY_SECS: u64 = 900;

/// Maximum WaitTimeSeconds accepted by ReceiveMessage.
pub const MAX_WAIT_SECS: u64 = 20;

/// Maximum VisibilityTimeout in seconds (12 hours).
pub const MAX_VISIBILITY_SECS: u64 = 43_200;

/// Queue name validation (1-80 chars, alphanumeric plus - and _).
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 80 {
        return Err(Error::InvalidParameterValue(format!(
            "queue name must be 1-80 characters, got {}",
            name.len()
        )));
    }

    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '-' && ch != '_' {
            return Err(Error::InvalidParameterValue(format!(
                "queue name contains invalid character: '{}'",
                ch
            )));
        }
    }

    Ok(())
}

/// Validate a seconds-valued parameter against an inclusive upper bound.
pub fn validate_seconds(name: &str, value: u64, max: u64) -> Result<()> {
    if value > max {
        return Err(Error::InvalidParameterValue(format!(
            "{} must be between 0 and {} seconds",
            name, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_name_validation() {
        // Valid names
        assert!(validate_queue_name("my-queue").is_ok());
        assert!(validate_queue_name("my_queue_123").is_ok());
        assert!(validate_queue_name("a").is_ok());
        assert!(validate_queue_name(&"a".repeat(80)).is_ok());

        // Invalid names
        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name(&"a".repeat(81)).is_err());
        assert!(validate_queue_name("my queue").is_err());
        assert!(validate_queue_name("my@queue").is_err());
        assert!(validate_queue_name("queue.fifo").is_err());
    }

    #[test]
    fn test_validate_seconds() {
        assert!(validate_seconds("DelaySeconds", 0, MAX_DELAY_SECS).is_ok());
        assert!(validate_seconds("DelaySeconds", 900, MAX_DELAY_SECS).is_ok());
        assert!(validate_seconds("DelaySeconds", 901, MAX_DELAY_SECS).is_err());
        assert!(validate_seconds("VisibilityTimeout", 43_201, MAX_VISIBILITY_SECS).is_err());
    }
}
