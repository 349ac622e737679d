//! Error types for vassal.

use thiserror::Error;

/// Result type for vassal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vassal.
///
/// Every user-visible failure maps onto a stable SQS error code via
/// [`Error::code`]; clients match on these strings, so they must not drift.
#[derive(Error, Debug)]
pub enum Error {
    /// Queue does not exist.
    #[error("the specified queue does not exist: {0}")]
    NonExistentQueue(String),

    /// Queue exists with different attributes.
    #[error("queue {0} already exists with different attributes")]
    QueueNameExists(String),

    /// Invalid parameter value.
    #[error("invalid parameter value: {0}")]
    InvalidParameterValue(String),

    /// Receipt handle is unknown, expired, or superseded.
    #[error("the receipt handle is invalid")]
    ReceiptHandleIsInvalid,

    /// Action name not recognized.
    #[error("unknown action: {0}")]
    InvalidAction(String),

    /// Missing required request parameter.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// Configuration error. Never surfaces on the wire; raised at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable SQS error code for the wire protocol.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NonExistentQueue(_) => "AWS.SimpleQueueService.NonExistentQueue",
            Error::QueueNameExists(_) => "AWS.SimpleQueueService.QueueNameExists",
            Error::InvalidParameterValue(_) => "InvalidParameterValue",
            Error::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Error::InvalidAction(_) => "InvalidAction",
            Error::MissingParameter(_) => "MissingParameter",
            Error::Config(_) | Error::Internal(_) => "AWS.SimpleQueueService.Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            Error::NonExistentQueue("q".into()).code(),
            "AWS.SimpleQueueService.NonExistentQueue"
        );
        assert_eq!(
            Error::QueueNameExists("q".into()).code(),
            "AWS.SimpleQueueService.QueueNameExists"
        );
        assert_eq!(
            Error::InvalidParameterValue("x".into()).code(),
            "InvalidParameterValue"
        );
        assert_eq!(Error::ReceiptHandleIsInvalid.code(), "ReceiptHandleIsInvalid");
        assert_eq!(Error::InvalidAction("Nope".into()).code(), "InvalidAction");
        assert_eq!(
            Error::MissingParameter("QueueUrl".into()).code(),
            "MissingParameter"
        );
        assert_eq!(
            Error::Internal("boom".into()).code(),
            "AWS.SimpleQueueService.Unknown"
        );
    }
}
