//! Handle to a single task result.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Outcome, Result, ResultStore};

/// Serialized form of a result handle.
///
/// Survives the trip through the transport between unlock attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTuple {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<ResultTuple>>,
}

impl ResultTuple {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: ResultTuple) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }
}

/// Lookup key for one task's outcome, bound to a result store.
///
/// Holds no result data itself; every query goes to the store.
#[derive(Clone)]
pub struct ResultHandle {
    id: String,
    parent: Option<Box<ResultHandle>>,
    store: Arc<dyn ResultStore>,
}

impl ResultHandle {
    pub fn new(id: impl Into<String>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            store,
        }
    }

    /// Rebuild a handle (and its parent chain) from its serialized form.
    pub fn from_tuple(tuple: &ResultTuple, store: Arc<dyn ResultStore>) -> Self {
        let parent = tuple
            .parent
            .as_deref()
            .map(|p| Box::new(Self::from_tuple(p, Arc::clone(&store))));
        Self {
            id: tuple.id.clone(),
            parent,
            store,
        }
    }

    pub fn as_tuple(&self) -> ResultTuple {
        ResultTuple {
            id: self.id.clone(),
            parent: self.parent.as_ref().map(|p| Box::new(p.as_tuple())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&ResultHandle> {
        self.parent.as_deref()
    }

    pub async fn is_ready(&self) -> Result<bool> {
        self.store.is_ready(&self.id).await
    }

    /// Whether the task finished with a failure.
    pub async fn failed(&self) -> Result<bool> {
        Ok(self.store.state(&self.id).await? == super::TaskState::Failure)
    }

    /// Fetch the stored outcome. Does not wait; unfinished tasks are an error.
    pub async fn outcome(&self) -> Result<Outcome> {
        self.store.fetch(&self.id).await
    }
}

impl fmt::Debug for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .finish()
    }
}
