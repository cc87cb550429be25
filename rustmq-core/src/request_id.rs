//! Request ID generation

use uuid::Uuid;

/// AWS-style request ID
#[derive(Debug, Clone)]
pub struct RequestId {
    /// Primary request ID (echoed in ResponseMetadata)
    pub id: String,
    /// Extended request ID (x-amzn-requestid style), base64 encoded
    pub extended_id: String,
}

impl RequestId {
    /// Generate a new request ID pair
    pub fn new() -> Self {
        let uuid = Uuid::new_v4();
        let id = uuid.to_string();

        let extended_uuid = Uuid::new_v4();
        let extended_id = base64_encode(&extended_uuid.as_bytes()[..]);

        Self { id, extended_id }
    }

    /// Create a request ID with a specific value (for testing)
    pub fn with_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let extended_id = base64_encode(id.as_bytes());
        Self { id, extended_id }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}
