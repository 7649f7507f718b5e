//! Delivering chord failures through the callback's failure channel.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, warn};

use super::{ChordError, JoinError};
use crate::result::{GroupResult, ResultStore, StoreError};
use crate::signature::Signature;
use crate::transport::TaskTransport;

/// Fails a chord callback with a `ChordError`.
///
/// The callback's task id is marked failed in the result store, then each of
/// its errbacks is submitted with that task id as sole argument.
pub struct ErrorReporter {
    store: Arc<dyn ResultStore>,
    transport: Arc<dyn TaskTransport>,
}

impl ErrorReporter {
    pub fn new(store: Arc<dyn ResultStore>, transport: Arc<dyn TaskTransport>) -> Self {
        Self { store, transport }
    }

    /// Build the error for a failed join.
    ///
    /// Names the culprit member when one can be found: the member the error
    /// is attributed to, else the first failed member of the group.
    pub async fn chord_error_for(group: &GroupResult, err: &JoinError) -> ChordError {
        let culprit = match err.member_id() {
            Some(id) => Some(id.to_string()),
            None => match group.first_failed().await {
                Ok(found) => found.map(|m| m.id().to_string()),
                Err(e) => {
                    warn!(group_id = %group.id(), error = %e, "Could not look up failed member");
                    None
                }
            },
        };

        match culprit {
            Some(id) => ChordError::new(format!("Dependency {} raised {}", id, err)),
            None => ChordError::new(err.to_string()),
        }
    }

    /// Fail `callback` with `chord_error`.
    pub async fn report(
        &self,
        callback: &Signature,
        chord_error: &ChordError,
    ) -> Result<(), StoreError> {
        let Some(callback_id) = callback.task_id() else {
            error!(
                task = %callback.task,
                reason = %chord_error,
                "Callback has no task id, chord failure not recorded"
            );
            return Ok(());
        };

        self.store
            .mark_failed(callback_id, chord_error.to_failure())
            .await?;

        for errback in &callback.options.link_error {
            let args = errback.with_prepended_args(vec![json!(callback_id)]);
            if let Err(e) = self.transport.submit(errback, args).await {
                warn!(
                    callback_id = %callback_id,
                    errback = %errback.task,
                    error = %e,
                    "Failed to submit errback"
                );
            }
        }

        Ok(())
    }
}
