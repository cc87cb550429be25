//! Receipt handle issuance and validation
//!
//! Handles are queue-scoped: each queue owns one registry, so a handle
//! issued by one queue can never delete from another. The random component
//! makes handles unforgeable; the embedded delivery generation ties a handle
//! to one specific receive.

use std::collections::HashMap;

use uuid::Uuid;

/// Registry of live receipt handles for one queue, keyed handle → message id.
#[derive(Debug, Default)]
pub struct ReceiptHandles {
    handles: HashMap<String, String>,
}

impl ReceiptHandles {
    /// Issue a fresh handle for a delivery of `message_id`.
    ///
    /// `generation` is the delivery count of this receive; two deliveries of
    /// the same message always get distinct handles.
    pub fn issue(&mut self, message_id: &str, generation: u32) -> String {
        let handle = format!("{}#{}#{}", Uuid::new_v4().simple(), message_id, generation);
        self.handles.insert(handle.clone(), message_id.to_string());
        handle
    }

    /// Look up the message id a handle was issued for.
    pub fn resolve(&self, handle: &str) -> Option<&str> {
        self.handles.get(handle).map(String::as_str)
    }

    /// Remove a handle from the registry.
    pub fn invalidate(&mut self, handle: &str) -> Option<String> {
        self.handles.remove(handle)
    }
}
