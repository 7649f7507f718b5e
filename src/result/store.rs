//! Result store interface.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{Outcome, TaskFailure, TaskState};

/// Result type for result store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during result store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Result for task {0} is not ready")]
    NotReady(String),

    #[error("Bulk fetch not supported by this store")]
    BulkFetchNotSupported,

    #[error("Write failed for task {task_id}: {message}")]
    Write { task_id: String, message: String },
}

/// Point-lookup interface to the result backend.
///
/// The store never notifies; callers poll. Implementations:
/// - `InMemoryResultStore`: standalone mode and tests
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Current state of a task. Unknown tasks are `Pending`.
    async fn state(&self, task_id: &str) -> Result<TaskState>;

    /// Whether the task has finished (successfully or not).
    async fn is_ready(&self, task_id: &str) -> Result<bool> {
        Ok(self.state(task_id).await?.is_ready())
    }

    /// Outcome of a finished task. `StoreError::NotReady` if unfinished.
    async fn fetch(&self, task_id: &str) -> Result<Outcome>;

    /// Whether `fetch_all` is available (a native join).
    fn supports_bulk_fetch(&self) -> bool {
        false
    }

    /// Outcomes of many finished tasks in one operation, in request order.
    async fn fetch_all(&self, _task_ids: &[String]) -> Result<Vec<Outcome>> {
        Err(StoreError::BulkFetchNotSupported)
    }

    /// Record a finished outcome for a task.
    async fn store_outcome(&self, task_id: &str, outcome: Outcome) -> Result<()>;

    /// Record a failure for a task (the callback's failure channel).
    async fn mark_failed(&self, task_id: &str, failure: TaskFailure) -> Result<()> {
        self.store_outcome(task_id, Outcome::Failure(failure)).await
    }

    /// Claim the terminal action for a chord.
    ///
    /// Returns `true` exactly once per group id; later claims return `false`.
    async fn settle_chord(&self, group_id: &str) -> Result<bool>;

    /// Give up a claim taken by `settle_chord` so a later attempt can retry
    /// the terminal action.
    async fn release_chord(&self, group_id: &str) -> Result<()>;

    /// Remove results that finished more than `older_than` ago, along with
    /// any bookkeeping (states, settle markers) of the same age.
    ///
    /// Returns the number of removed entries.
    async fn cleanup(&self, _older_than: Duration) -> Result<usize> {
        Ok(0)
    }
}

/// Task name that triggers result expiry.
pub const BACKEND_CLEANUP_TASK: &str = "backend_cleanup";

/// Run the `backend_cleanup` task: expire results older than `older_than`.
pub async fn backend_cleanup(store: &dyn ResultStore, older_than: Duration) -> Result<usize> {
    let removed = store.cleanup(older_than).await?;
    info!(removed, older_than = ?older_than, "Backend cleanup finished");
    Ok(removed)
}
