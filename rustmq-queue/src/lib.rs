//! SQS-compatible queue service
//!
//! The `engine` module holds the broker/queue state machine; `handlers`
//! adapts it to the query-protocol HTTP surface.

pub mod engine;
pub mod handlers;
mod params;

pub use engine::{
    Broker, Clock, ManualClock, Message, Queue, QueueAttributes, QueueError, ReceiveOptions,
    SystemClock,
};
