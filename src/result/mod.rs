//! Task results as seen by the chord barrier.
//!
//! This module contains:
//! - `Outcome`: the stored result of one finished task
//! - `ResultStore` trait: point lookups against the result backend
//! - `ResultHandle` / `GroupResult`: read-only views over group members
//! - Implementations: in-memory store for standalone mode and tests

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub mod group;
pub mod handle;
pub mod memory;
pub mod store;

pub use group::GroupResult;
pub use handle::{ResultHandle, ResultTuple};
pub use memory::InMemoryResultStore;
pub use store::{backend_cleanup, ResultStore, Result, StoreError, BACKEND_CLEANUP_TASK};

/// Lifecycle state of a task as recorded by the result store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    /// Unknown to the store, or not yet picked up.
    Pending,
    /// Picked up by a worker.
    Started,
    /// Waiting for a retry.
    Retry,
    /// Finished with a value.
    Success,
    /// Finished with an error.
    Failure,
    /// Cancelled before completion.
    Revoked,
}

impl TaskState {
    /// States after which the task will never change again.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Revoked)
    }
}

/// Failure recorded for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Error kind, e.g. `KeyError` or `ChordError`.
    pub kind: String,
    /// Error message.
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.message)
    }
}

/// Stored outcome of a finished task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "lowercase")]
pub enum Outcome {
    Success(Value),
    Failure(TaskFailure),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// State the store records for this outcome.
    pub fn state(&self) -> TaskState {
        match self {
            Self::Success(_) => TaskState::Success,
            Self::Failure(_) => TaskState::Failure,
        }
    }

    /// Value handed to a callback for this member.
    ///
    /// Failures are embedded as `{"exc_type": .., "exc_message": ..}` objects
    /// so the callback can tell them apart from ordinary values.
    pub fn into_value(self) -> Value {
        match self {
            Self::Success(value) => value,
            Self::Failure(failure) => json!({
                "exc_type": failure.kind,
                "exc_message": failure.message,
            }),
        }
    }
}
