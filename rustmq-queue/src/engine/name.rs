//! Queue name and batch entry id validation

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::QueueError;

// Names and batch entry ids share the same charset and length rule.
static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[a-zA-Z0-9_-]{1,80}$").expect("name pattern is valid")
});

/// Validate a queue name: 1..=80 characters from `[A-Za-z0-9_-]`.
///
/// Every violation yields the same error kind; callers cannot distinguish
/// which rule fired.
pub fn validate_queue_name(name: &str) -> Result<(), QueueError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(QueueError::InvalidQueueName)
    }
}

/// Validate a batch entry id against the same rule as queue names.
pub fn validate_batch_entry_id(id: &str) -> Result<(), QueueError> {
    if NAME_RE.is_match(id) {
        Ok(())
    } else {
        Err(QueueError::InvalidBatchEntryId)
    }
}
