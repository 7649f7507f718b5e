//! In-memory result store for standalone mode and testing.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{Outcome, Result, ResultStore, StoreError, TaskFailure, TaskState};

/// Stored outcome with completion time (for cleanup).
struct StoredResult {
    outcome: Outcome,
    date_done: DateTime<Utc>,
}

/// Non-terminal or revoked state with the time it was recorded.
struct StoredState {
    state: TaskState,
    recorded: DateTime<Utc>,
}

/// Result store that keeps outcomes in memory.
///
/// Bulk fetch can be toggled to exercise both join strategies. Fetches are
/// counted per task id so callers can check which members were inspected.
#[derive(Default)]
pub struct InMemoryResultStore {
    results: RwLock<HashMap<String, StoredResult>>,
    states: RwLock<HashMap<String, StoredState>>,
    /// Settle markers, keyed by group id, with the time of the claim.
    settled: RwLock<HashMap<String, DateTime<Utc>>>,
    fetch_counts: RwLock<HashMap<String, usize>>,
    bulk_fetch: bool,
    fetch_delay: RwLock<Option<Duration>>,
    fail_on_state: RwLock<bool>,
    fail_on_write: RwLock<bool>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that answers `fetch_all` in one operation.
    pub fn with_bulk_fetch() -> Self {
        Self {
            bulk_fetch: true,
            ..Self::default()
        }
    }

    /// Record a non-terminal state (e.g. `Started`) for a task.
    pub async fn set_state(&self, task_id: &str, state: TaskState) {
        self.states.write().await.insert(
            task_id.to_string(),
            StoredState {
                state,
                recorded: Utc::now(),
            },
        );
    }

    /// Delay every fetch by `delay`, simulating a slow backend.
    pub async fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.write().await = delay;
    }

    pub async fn set_fail_on_state(&self, fail: bool) {
        *self.fail_on_state.write().await = fail;
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    /// How many times the outcome of `task_id` was fetched.
    pub async fn fetch_count(&self, task_id: &str) -> usize {
        self.fetch_counts
            .read()
            .await
            .get(task_id)
            .copied()
            .unwrap_or(0)
    }

    /// Stored outcome without counting it as a fetch.
    pub async fn peek(&self, task_id: &str) -> Option<Outcome> {
        self.results
            .read()
            .await
            .get(task_id)
            .map(|r| r.outcome.clone())
    }

    pub async fn is_settled(&self, group_id: &str) -> bool {
        self.settled.read().await.contains_key(group_id)
    }

    async fn delay(&self) {
        let delay = *self.fetch_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_one(&self, task_id: &str) -> Result<Outcome> {
        *self
            .fetch_counts
            .write()
            .await
            .entry(task_id.to_string())
            .or_default() += 1;

        if let Some(stored) = self.results.read().await.get(task_id) {
            return Ok(stored.outcome.clone());
        }
        match self.states.read().await.get(task_id).map(|s| s.state) {
            Some(TaskState::Revoked) => Ok(Outcome::Failure(TaskFailure::new(
                "TaskRevokedError",
                task_id,
            ))),
            _ => Err(StoreError::NotReady(task_id.to_string())),
        }
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn state(&self, task_id: &str) -> Result<TaskState> {
        if *self.fail_on_state.read().await {
            return Err(StoreError::Connection("Mock state lookup failure".to_string()));
        }
        if let Some(stored) = self.results.read().await.get(task_id) {
            return Ok(stored.outcome.state());
        }
        Ok(self
            .states
            .read()
            .await
            .get(task_id)
            .map(|s| s.state)
            .unwrap_or(TaskState::Pending))
    }

    async fn fetch(&self, task_id: &str) -> Result<Outcome> {
        self.delay().await;
        self.fetch_one(task_id).await
    }

    fn supports_bulk_fetch(&self) -> bool {
        self.bulk_fetch
    }

    async fn fetch_all(&self, task_ids: &[String]) -> Result<Vec<Outcome>> {
        if !self.bulk_fetch {
            return Err(StoreError::BulkFetchNotSupported);
        }
        self.delay().await;
        let mut outcomes = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            outcomes.push(self.fetch_one(task_id).await?);
        }
        Ok(outcomes)
    }

    async fn store_outcome(&self, task_id: &str, outcome: Outcome) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(StoreError::Write {
                task_id: task_id.to_string(),
                message: "Mock write failure".to_string(),
            });
        }
        debug!(task_id = %task_id, state = ?outcome.state(), "Stored task outcome");
        self.states.write().await.remove(task_id);
        self.results.write().await.insert(
            task_id.to_string(),
            StoredResult {
                outcome,
                date_done: Utc::now(),
            },
        );
        Ok(())
    }

    async fn settle_chord(&self, group_id: &str) -> Result<bool> {
        let mut settled = self.settled.write().await;
        if settled.contains_key(group_id) {
            return Ok(false);
        }
        settled.insert(group_id.to_string(), Utc::now());
        Ok(true)
    }

    async fn release_chord(&self, group_id: &str) -> Result<()> {
        self.settled.write().await.remove(group_id);
        Ok(())
    }

    async fn cleanup(&self, older_than: Duration) -> Result<usize> {
        let max_age = chrono::Duration::from_std(older_than)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let removed = {
            let mut results = self.results.write().await;
            let before = results.len();
            results.retain(|_, r| r.date_done > cutoff);
            before - results.len()
        };
        self.states
            .write()
            .await
            .retain(|_, s| s.recorded > cutoff);
        self.settled.write().await.retain(|_, at| *at > cutoff);

        // Counters only matter while the task is still known to the store.
        let results = self.results.read().await;
        let states = self.states.read().await;
        self.fetch_counts
            .write()
            .await
            .retain(|id, _| results.contains_key(id) || states.contains_key(id));

        debug!(removed, "Expired stored results");
        Ok(removed)
    }
}
