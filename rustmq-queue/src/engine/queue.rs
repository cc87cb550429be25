//! Queue state machine
//!
//! A message moves Delayed → Visible → InFlight and leaves either by delete
//! or by falling back to Visible when its visibility window elapses. All
//! mutation happens under the queue lock; long-poll receives wait on a
//! notifier plus a deadline timer, never a poll loop.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::info;

use super::clock::Clock;
use super::error::QueueError;
use super::limits;
use super::message::Message;
use super::name;
use super::receipt::ReceiptHandles;

/// Result of a successful send.
#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
    pub message_id: String,
    pub md5_of_body: String,
}

/// One entry of a SendMessageBatch request.
#[derive(Debug, Clone)]
pub struct SendBatchEntry {
    pub id: String,
    pub body: String,
    pub delay_seconds: Option<i64>,
}

/// One entry of a DeleteMessageBatch request.
#[derive(Debug, Clone)]
pub struct DeleteBatchEntry {
    pub id: String,
    pub receipt_handle: String,
}

/// Per-entry outcome of a batch operation.
///
/// Batch-level failures abort the whole call; these carry the independent
/// per-entry results of a batch that passed the batch-level checks.
#[derive(Debug)]
pub struct BatchResultEntry<T> {
    pub id: String,
    pub result: Result<T, QueueError>,
}

/// Parameters of a receive call. `None` fields fall back to the queue
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct ReceiveOptions {
    pub max_number_of_messages: Option<i64>,
    pub wait_time_seconds: Option<i64>,
    pub visibility_timeout: Option<i64>,
}

/// Snapshot of queue attributes.
///
/// The three counters are taken under the queue lock, so a message durably
/// stored before the call is never missed.
#[derive(Debug, Clone, Serialize)]
pub struct QueueAttributes {
    pub queue_arn: String,
    pub approximate_number_of_messages: usize,
    pub approximate_number_of_messages_not_visible: usize,
    pub approximate_number_of_messages_delayed: usize,
    pub created_timestamp: i64,
    pub last_modified_timestamp: i64,
    pub visibility_timeout: i64,
    pub maximum_message_size: usize,
    pub message_retention_period: i64,
    pub delay_seconds: i64,
    pub receive_message_wait_time_seconds: i64,
}

#[derive(Debug, Default)]
struct QueueInner {
    messages: VecDeque<Message>,
    receipts: ReceiptHandles,
}

/// A named queue owning its message store.
#[derive(Debug)]
pub struct Queue {
    name: String,
    url: String,
    arn: String,
    created_timestamp: i64,
    last_modified_timestamp: i64,
    // Defaults applied when a request omits the parameter
    visibility_timeout: i64,
    delay_seconds: i64,
    receive_message_wait_time_seconds: i64,
    clock: Arc<dyn Clock>,
    notify: Notify,
    inner: Mutex<QueueInner>,
}

impl Queue {
    pub(crate) fn new(name: String, url: String, arn: String, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            name,
            url,
            arn,
            created_timestamp: now,
            last_modified_timestamp: now,
            visibility_timeout: limits::DEFAULT_VISIBILITY_TIMEOUT,
            delay_seconds: 0,
            receive_message_wait_time_seconds: 0,
            clock,
            notify: Notify::new(),
            inner: Mutex::new(QueueInner::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    pub fn created_timestamp(&self) -> i64 {
        self.created_timestamp
    }

    /// Enqueue one message, optionally delayed.
    pub fn send(&self, body: String, delay_seconds: Option<i64>) -> Result<SentMessage, QueueError> {
        let delay = validate_range(
            "DelaySeconds",
            delay_seconds.unwrap_or(self.delay_seconds),
            0,
            limits::MAX_DELAY_SECONDS,
        )?;
        if body.len() > limits::MAX_MESSAGE_SIZE {
            return Err(QueueError::InvalidParameter {
                parameter: "MessageBody",
                value: format!("{} bytes", body.len()),
                reason: format!("Must be shorter than {} bytes.", limits::MAX_MESSAGE_SIZE),
            });
        }

        let now = self.clock.now();
        let message = Message::new(body, delay, now);
        let sent = SentMessage {
            message_id: message.message_id.clone(),
            md5_of_body: message.md5_of_body.clone(),
        };
        self.inner.lock().messages.push_back(message);
        self.notify.notify_waiters();

        info!(queue = %self.name, message_id = %sent.message_id, delay, "Sent message");
        Ok(sent)
    }

    /// Enqueue up to [`limits::MAX_BATCH_SIZE`] messages.
    ///
    /// Batch-level validation runs first and enqueues nothing on failure;
    /// per-entry failures never abort the remaining entries.
    pub fn send_batch(
        &self,
        entries: Vec<SendBatchEntry>,
    ) -> Result<Vec<BatchResultEntry<SentMessage>>, QueueError> {
        validate_batch(entries.iter().map(|e| e.id.as_str()))?;

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = if seen.insert(entry.id.clone()) {
                self.send(entry.body, entry.delay_seconds)
            } else {
                Err(QueueError::BatchEntryIdNotDistinct(entry.id.clone()))
            };
            results.push(BatchResultEntry {
                id: entry.id,
                result,
            });
        }
        Ok(results)
    }

    /// Receive up to `max_number_of_messages` visible messages, waiting up
    /// to `wait_time_seconds` for one to become eligible.
    ///
    /// Selected messages get a fresh receipt handle and are hidden for
    /// `visibility_timeout` seconds. An empty result is a normal outcome.
    /// Dropping the future mid-wait leaves no state behind.
    pub async fn receive(&self, options: &ReceiveOptions) -> Result<Vec<Message>, QueueError> {
        let max = validate_range(
            "MaxNumberOfMessages",
            options.max_number_of_messages.unwrap_or(1),
            1,
            limits::MAX_BATCH_SIZE as i64,
        )?;
        let visibility = validate_range(
            "VisibilityTimeout",
            options.visibility_timeout.unwrap_or(self.visibility_timeout),
            0,
            limits::MAX_VISIBILITY_TIMEOUT,
        )?;
        let wait = validate_range(
            "WaitTimeSeconds",
            options
                .wait_time_seconds
                .unwrap_or(self.receive_message_wait_time_seconds),
            0,
            limits::MAX_WAIT_TIME_SECONDS,
        )?;

        #[allow(clippy::cast_sign_loss)]
        let deadline = Instant::now() + Duration::from_secs(wait as u64);

        loop {
            // Register interest before checking state so a send that lands
            // between the check and the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (batch, next_visible_in) = {
                let mut guard = self.inner.lock();
                let now = self.clock.now();
                let batch = take_visible(&mut guard, now, max as usize, visibility);
                let next = if batch.is_empty() {
                    seconds_until_next_visible(&guard, now)
                } else {
                    None
                };
                (batch, next)
            };

            if !batch.is_empty() {
                info!(queue = %self.name, count = batch.len(), "Received messages");
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(batch);
            }

            // Wake early when a delayed or in-flight message is due back.
            let wake_at = match next_visible_in {
                Some(seconds) => deadline.min(now + Duration::from_secs(seconds)),
                None => deadline,
            };

            tokio::select! {
                () = notified.as_mut() => {}
                () = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    /// Delete the in-flight message this receipt handle was issued for.
    pub fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = self.clock.now();

        let Some(message_id) = inner.receipts.resolve(receipt_handle).map(str::to_string) else {
            return Err(QueueError::ReceiptHandleInvalid(receipt_handle.to_string()));
        };
        let Some(index) = inner
            .messages
            .iter()
            .position(|m| m.message_id == message_id)
        else {
            inner.receipts.invalidate(receipt_handle);
            return Err(QueueError::ReceiptHandleInvalid(receipt_handle.to_string()));
        };

        let message = &inner.messages[index];
        let in_flight = message.receipt_handle.as_deref() == Some(receipt_handle)
            && message.is_in_flight(now);
        if !in_flight {
            // Superseded by a later receive, or the visibility window
            // elapsed and the message went back to the visible pool.
            inner.receipts.invalidate(receipt_handle);
            return Err(QueueError::ReceiptHandleInvalid(receipt_handle.to_string()));
        }

        inner.messages.remove(index);
        inner.receipts.invalidate(receipt_handle);
        info!(queue = %self.name, message_id = %message_id, "Deleted message");
        Ok(())
    }

    /// Delete a batch of messages; each entry succeeds or fails on its own.
    pub fn delete_batch(
        &self,
        entries: Vec<DeleteBatchEntry>,
    ) -> Result<Vec<BatchResultEntry<()>>, QueueError> {
        validate_batch(entries.iter().map(|e| e.id.as_str()))?;

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = if seen.insert(entry.id.clone()) {
                self.delete(&entry.receipt_handle)
            } else {
                Err(QueueError::BatchEntryIdNotDistinct(entry.id.clone()))
            };
            results.push(BatchResultEntry {
                id: entry.id,
                result,
            });
        }
        Ok(results)
    }

    /// Current attribute snapshot, counters included.
    pub fn attributes(&self) -> QueueAttributes {
        let guard = self.inner.lock();
        let now = self.clock.now();

        let mut visible = 0;
        let mut in_flight = 0;
        let mut delayed = 0;
        for message in &guard.messages {
            if message.is_visible(now) {
                visible += 1;
            } else if message.is_in_flight(now) {
                in_flight += 1;
            } else {
                delayed += 1;
            }
        }

        QueueAttributes {
            queue_arn: self.arn.clone(),
            approximate_number_of_messages: visible,
            approximate_number_of_messages_not_visible: in_flight,
            approximate_number_of_messages_delayed: delayed,
            created_timestamp: self.created_timestamp,
            last_modified_timestamp: self.last_modified_timestamp,
            visibility_timeout: self.visibility_timeout,
            maximum_message_size: limits::MAX_MESSAGE_SIZE,
            message_retention_period: limits::DEFAULT_RETENTION_PERIOD,
            delay_seconds: self.delay_seconds,
            receive_message_wait_time_seconds: self.receive_message_wait_time_seconds,
        }
    }
}

/// Select and claim up to `max` visible messages, in insertion order.
fn take_visible(inner: &mut QueueInner, now: i64, max: usize, visibility: i64) -> Vec<Message> {
    let mut taken = Vec::new();
    for message in inner.messages.iter_mut() {
        if !message.is_visible(now) {
            continue;
        }

        // A handle from an earlier delivery is dead the moment the message
        // is claimed again.
        if let Some(old_handle) = message.receipt_handle.take() {
            inner.receipts.invalidate(&old_handle);
        }
        message.receive_count += 1;
        if message.first_receive_timestamp.is_none() {
            message.first_receive_timestamp = Some(now);
        }
        let handle = inner
            .receipts
            .issue(&message.message_id, message.receive_count);
        message.receipt_handle = Some(handle);
        message.visible_at = now + visibility;

        taken.push(message.clone());
        if taken.len() == max {
            break;
        }
    }
    taken
}

/// Seconds until the earliest hidden message becomes visible again.
fn seconds_until_next_visible(inner: &QueueInner, now: i64) -> Option<u64> {
    inner
        .messages
        .iter()
        .map(|m| m.visible_at)
        .filter(|visible_at| *visible_at > now)
        .min()
        .map(|visible_at| visible_at.saturating_sub(now).unsigned_abs())
}

fn validate_range(
    parameter: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<i64, QueueError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(QueueError::InvalidParameter {
            parameter,
            value: value.to_string(),
            reason: format!("Must be between {min} and {max}, if provided"),
        })
    }
}

fn validate_batch<'a>(ids: impl ExactSizeIterator<Item = &'a str>) -> Result<(), QueueError> {
    if ids.len() > limits::MAX_BATCH_SIZE {
        return Err(QueueError::TooManyEntriesInBatchRequest);
    }
    if ids.len() == 0 {
        return Err(QueueError::EmptyBatchRequest);
    }
    for id in ids {
        name::validate_batch_entry_id(id)?;
    }
    Ok(())
}
