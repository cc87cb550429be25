//! Broker: the process-wide queue directory
//!
//! Constructed once at startup and shared behind an `Arc`; all message-level
//! operations are routed through here to the addressed queue.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use rustmq_core::DEFAULT_ACCOUNT_ID;

use super::clock::{Clock, SystemClock};
use super::error::QueueError;
use super::message::Message;
use super::name;
use super::queue::{
    BatchResultEntry, DeleteBatchEntry, Queue, QueueAttributes, ReceiveOptions, SendBatchEntry,
    SentMessage,
};

#[derive(Debug)]
pub struct Broker {
    queues: DashMap<String, Arc<Queue>>,
    clock: Arc<dyn Clock>,
    endpoint: String,
}

impl Broker {
    /// Broker with the system clock. `endpoint` is the external base URL
    /// queue URLs are rooted at.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_clock(endpoint, Arc::new(SystemClock))
    }

    pub fn with_clock(endpoint: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            queues: DashMap::new(),
            clock,
            endpoint,
        }
    }

    /// Create a queue, or return the existing one unchanged.
    ///
    /// Creation is idempotent by name: repeat calls return the same queue
    /// and leave its creation timestamp untouched.
    pub fn create_queue(&self, queue_name: &str) -> Result<(Arc<Queue>, bool), QueueError> {
        name::validate_queue_name(queue_name)?;

        match self.queues.entry(queue_name.to_string()) {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(vacant) => {
                let url = format!("{}/{}/{}", self.endpoint, DEFAULT_ACCOUNT_ID, queue_name);
                let arn = format!("arn:aws:sqs:us-east-1:{DEFAULT_ACCOUNT_ID}:{queue_name}");
                let queue = Arc::new(Queue::new(
                    queue_name.to_string(),
                    url,
                    arn,
                    self.clock.clone(),
                ));
                info!(name = %queue_name, url = %queue.url(), "Creating queue");
                vacant.insert(queue.clone());
                Ok((queue, true))
            }
        }
    }

    pub fn get_queue(&self, queue_name: &str) -> Result<Arc<Queue>, QueueError> {
        self.queues
            .get(queue_name)
            .map(|q| q.value().clone())
            .ok_or_else(|| QueueError::QueueNotFound(queue_name.to_string()))
    }

    /// Remove a queue and every message it holds.
    pub fn delete_queue(&self, queue_name: &str) -> Result<(), QueueError> {
        if self.queues.remove(queue_name).is_none() {
            return Err(QueueError::QueueNotFound(queue_name.to_string()));
        }
        info!(name = %queue_name, "Deleting queue");
        Ok(())
    }

    pub fn list_queues(&self, prefix: Option<&str>) -> Vec<String> {
        self.queues
            .iter()
            .filter(|q| prefix.map_or(true, |p| q.key().starts_with(p)))
            .map(|q| q.value().url().to_string())
            .collect()
    }

    pub fn get_queue_attributes(&self, queue_name: &str) -> Result<QueueAttributes, QueueError> {
        Ok(self.get_queue(queue_name)?.attributes())
    }

    pub fn send_message(
        &self,
        queue_name: &str,
        body: String,
        delay_seconds: Option<i64>,
    ) -> Result<SentMessage, QueueError> {
        self.get_queue(queue_name)?.send(body, delay_seconds)
    }

    pub fn send_message_batch(
        &self,
        queue_name: &str,
        entries: Vec<SendBatchEntry>,
    ) -> Result<Vec<BatchResultEntry<SentMessage>>, QueueError> {
        self.get_queue(queue_name)?.send_batch(entries)
    }

    pub async fn receive_message(
        &self,
        queue_name: &str,
        options: &ReceiveOptions,
    ) -> Result<Vec<Message>, QueueError> {
        let queue = self.get_queue(queue_name)?;
        queue.receive(options).await
    }

    pub fn delete_message(
        &self,
        queue_name: &str,
        receipt_handle: &str,
    ) -> Result<(), QueueError> {
        self.get_queue(queue_name)?.delete(receipt_handle)
    }

    pub fn delete_message_batch(
        &self,
        queue_name: &str,
        entries: Vec<DeleteBatchEntry>,
    ) -> Result<Vec<BatchResultEntry<()>>, QueueError> {
        self.get_queue(queue_name)?.delete_batch(entries)
    }
}
