//! Joining the results of a ready group.
//!
//! Two interchangeable strategies, picked by asking the store:
//! - `Native`: one `fetch_all` for every member
//! - `Sequential`: one `fetch` per member, in member order
//!
//! Readiness is probed first and nothing is fetched unless every member has
//! finished. Fetching is bounded by a timeout even though the group is ready.

use std::time::Duration;

use tracing::debug;

use crate::result::{GroupResult, Outcome, ResultStore, StoreError, TaskFailure};

/// How member outcomes are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Single bulk fetch against the store.
    Native,
    /// Per-member fetch.
    Sequential,
}

impl JoinStrategy {
    pub fn for_store(store: &dyn ResultStore) -> Self {
        if store.supports_bulk_fetch() {
            Self::Native
        } else {
            Self::Sequential
        }
    }
}

/// Errors from collecting outcomes of a ready group.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// A member failed and failures propagate.
    #[error("{failure}")]
    MemberFailed {
        member_id: String,
        failure: TaskFailure,
    },

    #[error("Join timed out after {0:?}")]
    Timeout(Duration),

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),
}

impl JoinError {
    /// The member this error is attributed to, when known.
    pub fn member_id(&self) -> Option<&str> {
        match self {
            Self::MemberFailed { member_id, .. } => Some(member_id),
            _ => None,
        }
    }
}

/// Result of one join.
#[derive(Debug)]
pub enum JoinOutcome {
    /// Some members are still running. Nothing was fetched.
    NotReady { completed: usize, total: usize },
    /// Every member's outcome, in member order.
    Joined(Vec<Outcome>),
    /// The group is ready but its outcomes could not be joined.
    Failed(JoinError),
}

/// Join a group's outcomes if every member has finished.
///
/// With `propagate`, the first failing member (in member order) aborts the
/// join. Without it, failures are returned in place.
///
/// Errors only when the readiness probe itself fails.
pub async fn join(
    group: &GroupResult,
    propagate: bool,
    timeout: Duration,
) -> Result<JoinOutcome, StoreError> {
    let total = group.len();
    let completed = group.completed_count().await?;
    if completed < total {
        return Ok(JoinOutcome::NotReady { completed, total });
    }

    let strategy = JoinStrategy::for_store(group.store().as_ref());
    debug!(group_id = %group.id(), ?strategy, members = total, "Joining ready group");

    let joined = match tokio::time::timeout(timeout, collect(group, strategy, propagate)).await {
        Ok(joined) => joined,
        Err(_) => Err(JoinError::Timeout(timeout)),
    };

    Ok(match joined {
        Ok(outcomes) => JoinOutcome::Joined(outcomes),
        Err(e) => JoinOutcome::Failed(e),
    })
}

async fn collect(
    group: &GroupResult,
    strategy: JoinStrategy,
    propagate: bool,
) -> Result<Vec<Outcome>, JoinError> {
    match strategy {
        JoinStrategy::Native => {
            let member_ids = group.member_ids();
            let outcomes = group.store().fetch_all(&member_ids).await?;
            if propagate {
                if let Some((member_id, failure)) = first_failure(&member_ids, &outcomes) {
                    return Err(JoinError::MemberFailed {
                        member_id: member_id.to_string(),
                        failure: failure.clone(),
                    });
                }
            }
            Ok(outcomes)
        }
        JoinStrategy::Sequential => {
            let mut outcomes = Vec::with_capacity(group.len());
            for member in group.members() {
                let outcome = member.outcome().await?;
                if propagate {
                    if let Outcome::Failure(failure) = outcome {
                        return Err(JoinError::MemberFailed {
                            member_id: member.id().to_string(),
                            failure,
                        });
                    }
                }
                outcomes.push(outcome);
            }
            Ok(outcomes)
        }
    }
}

fn first_failure<'a>(
    member_ids: &'a [String],
    outcomes: &'a [Outcome],
) -> Option<(&'a str, &'a TaskFailure)> {
    member_ids
        .iter()
        .zip(outcomes)
        .find_map(|(id, outcome)| match outcome {
            Outcome::Failure(failure) => Some((id.as_str(), failure)),
            Outcome::Success(_) => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{InMemoryResultStore, ResultTuple, TaskState};
    use serde_json::json;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(3);

    fn group_over(store: Arc<InMemoryResultStore>, ids: &[&str]) -> GroupResult {
        let tuples: Vec<ResultTuple> = ids.iter().map(|id| ResultTuple::new(*id)).collect();
        GroupResult::from_tuples("g1", &tuples, store)
    }

    async fn seed_mixed(store: &InMemoryResultStore) {
        store.store_outcome("a", Outcome::Success(json!(1))).await.unwrap();
        store
            .store_outcome("b", Outcome::Failure(TaskFailure::new("KeyError", "x")))
            .await
            .unwrap();
        store.store_outcome("c", Outcome::Success(json!(2))).await.unwrap();
    }

    #[test]
    fn test_strategy_follows_store_capability() {
        assert_eq!(
            JoinStrategy::for_store(&InMemoryResultStore::new()),
            JoinStrategy::Sequential
        );
        assert_eq!(
            JoinStrategy::for_store(&InMemoryResultStore::with_bulk_fetch()),
            JoinStrategy::Native
        );
    }

    #[tokio::test]
    async fn test_not_ready_fetches_nothing() {
        let store = Arc::new(InMemoryResultStore::new());
        store.store_outcome("a", Outcome::Success(json!(1))).await.unwrap();
        store.set_state("b", TaskState::Started).await;
        let group = group_over(store.clone(), &["a", "b"]);

        let outcome = join(&group, true, TIMEOUT).await.unwrap();

        assert!(matches!(outcome, JoinOutcome::NotReady { completed: 1, total: 2 }));
        assert_eq!(store.fetch_count("a").await, 0);
    }

    #[tokio::test]
    async fn test_sequential_propagate_stops_at_first_failure() {
        let store = Arc::new(InMemoryResultStore::new());
        seed_mixed(&store).await;
        let group = group_over(store.clone(), &["a", "b", "c"]);

        let outcome = join(&group, true, TIMEOUT).await.unwrap();

        match outcome {
            JoinOutcome::Failed(JoinError::MemberFailed { member_id, failure }) => {
                assert_eq!(member_id, "b");
                assert_eq!(failure.message, "x");
            }
            other => panic!("expected member failure, got {:?}", other),
        }
        assert_eq!(store.fetch_count("c").await, 0);
    }

    #[tokio::test]
    async fn test_native_propagate_names_first_failure() {
        let store = Arc::new(InMemoryResultStore::with_bulk_fetch());
        seed_mixed(&store).await;
        store
            .store_outcome("c", Outcome::Failure(TaskFailure::new("ValueError", "later")))
            .await
            .unwrap();
        let group = group_over(store, &["a", "b", "c"]);

        let outcome = join(&group, true, TIMEOUT).await.unwrap();

        match outcome {
            JoinOutcome::Failed(err) => assert_eq!(err.member_id(), Some("b")),
            other => panic!("expected member failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_propagate_inlines_failures() {
        for store in [
            Arc::new(InMemoryResultStore::new()),
            Arc::new(InMemoryResultStore::with_bulk_fetch()),
        ] {
            seed_mixed(&store).await;
            let group = group_over(store, &["a", "b", "c"]);

            let outcome = join(&group, false, TIMEOUT).await.unwrap();

            match outcome {
                JoinOutcome::Joined(outcomes) => assert_eq!(
                    outcomes,
                    vec![
                        Outcome::Success(json!(1)),
                        Outcome::Failure(TaskFailure::new("KeyError", "x")),
                        Outcome::Success(json!(2)),
                    ]
                ),
                other => panic!("expected joined outcomes, got {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let store = Arc::new(InMemoryResultStore::new());
        store.store_outcome("a", Outcome::Success(json!(1))).await.unwrap();
        store.set_fetch_delay(Some(Duration::from_secs(10))).await;
        let group = group_over(store, &["a"]);

        let outcome = join(&group, true, TIMEOUT).await.unwrap();

        assert!(matches!(outcome, JoinOutcome::Failed(JoinError::Timeout(t)) if t == TIMEOUT));
    }

    #[tokio::test]
    async fn test_probe_failure_is_store_error() {
        let store = Arc::new(InMemoryResultStore::new());
        store.set_fail_on_state(true).await;
        let group = group_over(store, &["a"]);

        assert!(matches!(
            join(&group, true, TIMEOUT).await,
            Err(StoreError::Connection(_))
        ));
    }
}
