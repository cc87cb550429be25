//! Message record and visibility state

use md5::{Digest, Md5};
use serde::Serialize;
use uuid::Uuid;

/// One enqueued message and its delivery state.
///
/// Owned exclusively by its queue; callers only ever see clones taken under
/// the queue lock.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message_id: String,
    pub body: String,
    pub md5_of_body: String,
    pub sent_timestamp: i64,
    /// Before this instant the message must not be handed to a receiver.
    /// Send sets it to `now + delay`; each receive pushes it to
    /// `now + visibility_timeout`.
    pub visible_at: i64,
    /// Present only while the message is in flight; reissued on every
    /// receive.
    pub receipt_handle: Option<String>,
    pub receive_count: u32,
    pub first_receive_timestamp: Option<i64>,
}

impl Message {
    pub fn new(body: String, delay_seconds: i64, now: i64) -> Self {
        let md5_of_body = md5_hex(body.as_bytes());
        Self {
            message_id: Uuid::new_v4().to_string(),
            body,
            md5_of_body,
            sent_timestamp: now,
            visible_at: now + delay_seconds,
            receipt_handle: None,
            receive_count: 0,
            first_receive_timestamp: None,
        }
    }

    /// Eligible for delivery: neither delayed nor hidden by a visibility
    /// timeout.
    pub fn is_visible(&self, now: i64) -> bool {
        self.visible_at <= now
    }

    /// Delivered to a receiver and still inside its visibility window.
    pub fn is_in_flight(&self, now: i64) -> bool {
        self.receipt_handle.is_some() && self.visible_at > now
    }

    /// Never delivered and still inside its send delay.
    pub fn is_delayed(&self, now: i64) -> bool {
        self.receipt_handle.is_none() && self.visible_at > now
    }
}

fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
