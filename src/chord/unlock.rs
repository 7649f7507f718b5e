//! The unlock attempt: one stateless evaluation of a chord.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use super::join::{self, JoinOutcome};
use super::{CallbackDispatcher, ChordError, ErrorReporter, UnlockRequest, UnlockSettings};
use crate::result::{GroupResult, ResultStore, StoreError};
use crate::signature::Signature;
use crate::transport::{TaskTransport, TransportError};

/// Errors that escape an unlock attempt to the scheduling layer.
///
/// Member failures never appear here; they are delivered to the callback.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Chord {group_id} exceeded max retries ({max_retries})")]
    MaxRetriesExceeded { group_id: String, max_retries: u32 },

    #[error("Scheduling failed: {0}")]
    Schedule(#[from] TransportError),

    #[error("Result store error: {0}")]
    Store(#[from] StoreError),
}

/// What an unlock attempt did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Group not ready; the next attempt is scheduled.
    Rescheduled { retries: u32, countdown: Duration },
    /// Callback submitted with the joined results.
    Dispatched { callback_id: String },
    /// Callback failed with a chord error.
    Failed { error: ChordError },
    /// Another attempt already settled this chord; nothing was done.
    AlreadySettled,
}

/// Evaluates unlock attempts.
///
/// Holds no per-chord state: everything comes from the request, so attempts
/// may run anywhere, concurrently, or more than once.
pub struct ChordUnlocker {
    store: Arc<dyn ResultStore>,
    transport: Arc<dyn TaskTransport>,
    settings: UnlockSettings,
    reporter: ErrorReporter,
    dispatcher: CallbackDispatcher,
}

impl ChordUnlocker {
    pub fn new(
        store: Arc<dyn ResultStore>,
        transport: Arc<dyn TaskTransport>,
        settings: UnlockSettings,
    ) -> Self {
        Self {
            reporter: ErrorReporter::new(Arc::clone(&store), Arc::clone(&transport)),
            dispatcher: CallbackDispatcher::new(Arc::clone(&transport)),
            store,
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &UnlockSettings {
        &self.settings
    }

    /// Run one unlock attempt.
    #[tracing::instrument(
        name = "chord.unlock",
        skip_all,
        fields(group_id = %request.args.group_id, retries = request.retries)
    )]
    pub async fn run(&self, request: UnlockRequest) -> Result<PollOutcome, PollError> {
        let args = &request.args;
        let propagate = args.propagate.unwrap_or(self.settings.default_propagate);
        let interval = args.interval().unwrap_or(self.settings.default_interval);
        let max_retries = args.max_retries.or(self.settings.default_max_retries);

        let callback = args.callback.resolve(&args.group_id);
        let group =
            GroupResult::from_tuples(&args.group_id, &args.result, Arc::clone(&self.store));

        match join::join(&group, propagate, self.settings.join_timeout).await? {
            JoinOutcome::NotReady { completed, total } => {
                debug!(completed, total, "Chord not ready");
                self.reschedule(&request, interval, max_retries).await
            }
            JoinOutcome::Joined(results) => {
                if !self.claim(&args.group_id).await? {
                    return Ok(PollOutcome::AlreadySettled);
                }
                match self.dispatcher.dispatch(&callback, results).await {
                    Ok(callback_id) => {
                        info!(callback_id = %callback_id, "Chord callback dispatched");
                        Ok(PollOutcome::Dispatched { callback_id })
                    }
                    Err(e) => {
                        error!(error = %e, "Chord callback raised");
                        let chord_error = ChordError::callback_error(&e);
                        self.fail_callback(&args.group_id, &callback, chord_error)
                            .await
                    }
                }
            }
            JoinOutcome::Failed(e) => {
                if !self.claim(&args.group_id).await? {
                    return Ok(PollOutcome::AlreadySettled);
                }
                error!(error = %e, "Chord raised");
                let chord_error = ErrorReporter::chord_error_for(&group, &e).await;
                self.fail_callback(&args.group_id, &callback, chord_error)
                    .await
            }
        }
    }

    /// Schedule the next attempt, or fail once the retry budget is spent.
    async fn reschedule(
        &self,
        request: &UnlockRequest,
        interval: Duration,
        max_retries: Option<u32>,
    ) -> Result<PollOutcome, PollError> {
        if let Some(max) = max_retries {
            if request.retries >= max {
                return Err(PollError::MaxRetriesExceeded {
                    group_id: request.args.group_id.clone(),
                    max_retries: max,
                });
            }
        }

        let next = request.next_attempt();
        let retries = next.retries;
        let remaining = next.remaining_retries(max_retries);
        self.transport.schedule_unlock(next, interval).await?;

        debug!(countdown = ?interval, ?remaining, "Retrying chord unlock");
        Ok(PollOutcome::Rescheduled {
            retries,
            countdown: interval,
        })
    }

    /// Report `chord_error` on the callback.
    ///
    /// If reporting fails the claim is released, so a later attempt reports
    /// again instead of finding the chord settled.
    async fn fail_callback(
        &self,
        group_id: &str,
        callback: &Signature,
        chord_error: ChordError,
    ) -> Result<PollOutcome, PollError> {
        if let Err(e) = self.reporter.report(callback, &chord_error).await {
            if let Err(release_err) = self.store.release_chord(group_id).await {
                error!(error = %release_err, "Failed to release chord claim");
            }
            return Err(e.into());
        }
        Ok(PollOutcome::Failed { error: chord_error })
    }

    /// Claim the chord's terminal action. `false` if already claimed.
    async fn claim(&self, group_id: &str) -> Result<bool, PollError> {
        let claimed = self.store.settle_chord(group_id).await?;
        if !claimed {
            info!("Chord already settled, skipping");
        }
        Ok(claimed)
    }
}
