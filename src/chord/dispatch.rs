//! Submitting a chord callback with the joined results.

use std::sync::Arc;

use serde_json::Value;

use crate::result::Outcome;
use crate::signature::Signature;
use crate::transport::{self, TaskTransport};

/// Submits the callback once, with the joined results as first argument.
pub struct CallbackDispatcher {
    transport: Arc<dyn TaskTransport>,
}

impl CallbackDispatcher {
    pub fn new(transport: Arc<dyn TaskTransport>) -> Self {
        Self { transport }
    }

    /// Submit `callback` with `results` (in member order). Does not wait for
    /// the callback to run.
    ///
    /// Returns the task id the callback was submitted under.
    pub async fn dispatch(
        &self,
        callback: &Signature,
        results: Vec<Outcome>,
    ) -> transport::Result<String> {
        let aggregated = Value::Array(results.into_iter().map(Outcome::into_value).collect());
        let args = callback.with_prepended_args(vec![aggregated]);
        self.transport.submit(callback, args).await
    }
}
