//! The in-process queue engine
//!
//! Ownership runs broker → queue → message: the [`Broker`] owns the queue
//! directory, each [`Queue`] owns its message store and receipt-handle
//! registry, and all mutation goes through their public operations.

mod broker;
mod clock;
mod error;
pub mod limits;
mod message;
mod name;
mod queue;
mod receipt;


pub use broker::Broker;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::QueueError;
pub use message::Message;
pub use queue::{
    BatchResultEntry, DeleteBatchEntry, Queue, QueueAttributes, ReceiveOptions, SendBatchEntry,
    SentMessage,
};
