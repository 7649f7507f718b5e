//! Task transport: how work leaves this process.
//!
//! This module contains:
//! - `TaskTransport` trait: submit tasks and schedule unlock attempts
//! - Implementations: in-process tokio channels, Mock

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::chord::UnlockRequest;
use crate::signature::Signature;

// Implementation modules
#[cfg(feature = "channel")]
pub mod channel;
pub mod mock;

// Re-exports
#[cfg(feature = "channel")]
pub use channel::{ChannelTransport, TransportReceivers, UnlockWorker};
pub use mock::MockTransport;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Submit of task '{task}' failed: {message}")]
    Submit { task: String, message: String },

    #[error("Scheduling unlock for group '{group_id}' failed: {message}")]
    Schedule { group_id: String, message: String },

    #[error("Transport closed")]
    Closed,
}

/// A task handed to the transport for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedTask {
    pub task_id: String,
    pub signature: Signature,
    pub args: Vec<Value>,
}

impl SubmittedTask {
    /// Build a submission, assigning a fresh task id if the signature has none.
    pub fn new(signature: &Signature, args: Vec<Value>) -> Self {
        let task_id = signature
            .task_id()
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            task_id,
            signature: signature.clone(),
            args,
        }
    }
}

/// Interface to the task-execution substrate.
///
/// Both operations may be delivered more than once; consumers must tolerate
/// duplicates.
///
/// Implementations:
/// - `ChannelTransport`: in-process tokio channels with timer-driven delivery
/// - `MockTransport`: records calls for testing
#[async_trait]
pub trait TaskTransport: Send + Sync {
    /// Submit a task for asynchronous execution. Does not wait for it to run.
    ///
    /// Returns the task id it was submitted under.
    async fn submit(&self, signature: &Signature, args: Vec<Value>) -> Result<String>;

    /// Deliver an unlock attempt after `countdown`.
    ///
    /// Returns once the attempt is scheduled, never after it runs.
    async fn schedule_unlock(&self, request: UnlockRequest, countdown: Duration) -> Result<()>;
}
