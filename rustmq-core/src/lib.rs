//! Core types for rustmq
//!
//! This crate provides the wire-level primitives shared between the queue
//! service and the server binary.

pub mod error;
pub mod request_id;

pub use error::{AwsError, ErrorCode};
pub use request_id::RequestId;

/// Account id used in queue URLs and ARNs (single-account deployment).
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";
