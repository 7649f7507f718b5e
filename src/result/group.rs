//! Ordered view over the results of one group.

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;

use super::{Result, ResultHandle, ResultStore, ResultTuple};

/// The header group of one chord: member handles in submission order.
///
/// Rebuilt from its serialized form on every unlock attempt and dropped
/// afterwards; nothing here mutates stored outcomes.
#[derive(Clone)]
pub struct GroupResult {
    id: String,
    members: Vec<ResultHandle>,
    store: Arc<dyn ResultStore>,
}

impl GroupResult {
    pub fn new(id: impl Into<String>, members: Vec<ResultHandle>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            id: id.into(),
            members,
            store,
        }
    }

    /// Rebuild a group from the serialized member tuples.
    pub fn from_tuples(
        id: impl Into<String>,
        tuples: &[ResultTuple],
        store: Arc<dyn ResultStore>,
    ) -> Self {
        let members = tuples
            .iter()
            .map(|t| ResultHandle::from_tuple(t, Arc::clone(&store)))
            .collect();
        Self::new(id, members, store)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn members(&self) -> &[ResultHandle] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.id().to_string()).collect()
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Readiness of every member, probed concurrently, in member order.
    async fn readiness(&self) -> Result<Vec<bool>> {
        try_join_all(self.members.iter().map(|m| m.is_ready())).await
    }

    /// Whether every member has finished. An empty group is ready.
    pub async fn ready(&self) -> Result<bool> {
        Ok(self.readiness().await?.into_iter().all(|r| r))
    }

    /// Number of finished members.
    pub async fn completed_count(&self) -> Result<usize> {
        Ok(self.readiness().await?.into_iter().filter(|r| *r).count())
    }

    /// Whether any member finished with a failure.
    pub async fn failed(&self) -> Result<bool> {
        Ok(self.first_failed().await?.is_some())
    }

    /// First member, in member order, that finished with a failure.
    pub async fn first_failed(&self) -> Result<Option<&ResultHandle>> {
        for member in &self.members {
            if member.failed().await? {
                return Ok(Some(member));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for GroupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupResult")
            .field("id", &self.id)
            .field("members", &self.members)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{InMemoryResultStore, Outcome, TaskFailure};
    use serde_json::json;

    fn group_of(store: &Arc<InMemoryResultStore>, ids: &[&str]) -> GroupResult {
        let tuples: Vec<ResultTuple> = ids.iter().map(|id| ResultTuple::new(*id)).collect();
        let store: Arc<dyn ResultStore> = store.clone();
        GroupResult::from_tuples("g1", &tuples, store)
    }

    #[tokio::test]
    async fn test_empty_group_is_ready() {
        let store = Arc::new(InMemoryResultStore::new());
        let group = group_of(&store, &[]);

        assert!(group.is_empty());
        assert!(group.ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_completed_count_tracks_partial_progress() {
        let store = Arc::new(InMemoryResultStore::new());
        let group = group_of(&store, &["a", "b", "c"]);

        store.store_outcome("b", Outcome::Success(json!(2))).await.unwrap();

        assert_eq!(group.completed_count().await.unwrap(), 1);
        assert!(!group.ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_first_failed_uses_member_order() {
        let store = Arc::new(InMemoryResultStore::new());
        let group = group_of(&store, &["a", "b", "c"]);

        store
            .store_outcome("c", Outcome::Failure(TaskFailure::new("ValueError", "late")))
            .await
            .unwrap();
        store
            .store_outcome("b", Outcome::Failure(TaskFailure::new("KeyError", "x")))
            .await
            .unwrap();

        let culprit = group.first_failed().await.unwrap();
        assert_eq!(culprit.map(|m| m.id()), Some("b"));
        assert!(group.failed().await.unwrap());
    }
}
