//! Engine error kinds

use thiserror::Error;

/// Failures surfaced by broker and queue operations.
///
/// Validation always runs before any state mutation, so a returned error
/// means nothing was enqueued, received or deleted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("The specified queue name is not valid.")]
    InvalidQueueName,

    #[error("Value {value} for parameter {parameter} is invalid. Reason: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        reason: String,
    },

    #[error("The specified queue does not exist for this wsdl version.")]
    QueueNotFound(String),

    #[error("The input receipt handle \"{0}\" is not a valid receipt handle.")]
    ReceiptHandleInvalid(String),

    #[error("The batch request contains more entries than permissible.")]
    TooManyEntriesInBatchRequest,

    #[error("The batch request doesn't contain any entries.")]
    EmptyBatchRequest,

    #[error("The Id of a batch entry in a batch request doesn't abide by the specification.")]
    InvalidBatchEntryId,

    #[error("Id {0} repeated.")]
    BatchEntryIdNotDistinct(String),
}

impl QueueError {
    /// Wire error code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQueueName | Self::InvalidParameter { .. } => "InvalidParameterValue",
            Self::QueueNotFound(_) => "AWS.SimpleQueueService.NonExistentQueue",
            Self::ReceiptHandleInvalid(_) => "ReceiptHandleIsInvalid",
            Self::TooManyEntriesInBatchRequest => {
                "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
            }
            Self::EmptyBatchRequest => "AWS.SimpleQueueService.EmptyBatchRequest",
            Self::InvalidBatchEntryId => "AWS.SimpleQueueService.InvalidBatchEntryId",
            Self::BatchEntryIdNotDistinct(_) => "AWS.SimpleQueueService.BatchEntryIdsNotDistinct",
        }
    }
}
