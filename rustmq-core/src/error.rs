//! AWS-style error types and formatting

use thiserror::Error;

/// Error codes returned by the queue API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Request-level
    InvalidAction,
    InvalidQueryParameter,
    MissingParameter,
    InvalidParameterValue,

    // Queue / message level
    NonExistentQueue,
    ReceiptHandleIsInvalid,

    // Batch level
    TooManyEntriesInBatchRequest,
    EmptyBatchRequest,
    InvalidBatchEntryId,
    BatchEntryIdsNotDistinct,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAction => "InvalidAction",
            Self::InvalidQueryParameter => "InvalidQueryParameter",
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::NonExistentQueue => "AWS.SimpleQueueService.NonExistentQueue",
            Self::ReceiptHandleIsInvalid => "ReceiptHandleIsInvalid",
            Self::TooManyEntriesInBatchRequest => {
                "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
            }
            Self::EmptyBatchRequest => "AWS.SimpleQueueService.EmptyBatchRequest",
            Self::InvalidBatchEntryId => "AWS.SimpleQueueService.InvalidBatchEntryId",
            Self::BatchEntryIdsNotDistinct => "AWS.SimpleQueueService.BatchEntryIdsNotDistinct",
        }
    }

    /// All queue API failures are sender faults in the 2012-11-05 wsdl.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// AWS-style error carried to the wire layer
#[derive(Debug, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct AwsError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

impl AwsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Format as a query-API ErrorResponse document
    pub fn to_xml(&self) -> String {
        format!(
            r#"<ErrorResponse>
  <Error>
    <Type>Sender</Type>
    <Code>{}</Code>
    <Message>{}</Message>
    <Detail/>
  </Error>
  <RequestId>{}</RequestId>
</ErrorResponse>"#,
            self.code.as_str(),
            self.message,
            self.request_id
        )
    }
}
