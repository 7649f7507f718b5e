//! In-process channel transport for standalone mode.
//!
//! Uses tokio mpsc channels: one carries encoded unlock attempts to an
//! `UnlockWorker`, the other carries submitted tasks to whatever executes
//! them. Countdowns are honoured with a timer task per delayed delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Result, SubmittedTask, TaskTransport, TransportError};
use crate::chord::{ChordUnlocker, PollError, PollOutcome, UnlockRequest};
use crate::config::WorkerConfig;
use crate::signature::Signature;

/// Receiving halves of a `ChannelTransport`.
pub struct TransportReceivers {
    /// Encoded `UnlockRequest`s, delivered after their countdown.
    pub unlocks: mpsc::Receiver<Vec<u8>>,
    /// Submitted tasks, including chord callbacks and errbacks.
    pub tasks: mpsc::Receiver<SubmittedTask>,
}

/// Transport backed by tokio mpsc channels.
///
/// Unlock attempts travel encoded, so each delivery is decoded fresh and
/// shares nothing with the attempt that scheduled it.
#[derive(Clone)]
pub struct ChannelTransport {
    unlock_tx: mpsc::Sender<Vec<u8>>,
    task_tx: mpsc::Sender<SubmittedTask>,
}

impl ChannelTransport {
    /// Create a transport and the receivers that drain it.
    pub fn new(capacity: usize) -> (Self, TransportReceivers) {
        let (unlock_tx, unlocks) = mpsc::channel(capacity);
        let (task_tx, tasks) = mpsc::channel(capacity);

        info!(capacity, "Channel transport initialized");

        (
            Self { unlock_tx, task_tx },
            TransportReceivers { unlocks, tasks },
        )
    }

    pub fn from_config(config: &WorkerConfig) -> (Self, TransportReceivers) {
        Self::new(config.channel_capacity)
    }
}

#[async_trait]
impl TaskTransport for ChannelTransport {
    #[tracing::instrument(name = "transport.submit", skip_all, fields(task = %signature.task))]
    async fn submit(&self, signature: &Signature, args: Vec<Value>) -> Result<String> {
        let task = SubmittedTask::new(signature, args);
        let task_id = task.task_id.clone();

        self.task_tx
            .send(task)
            .await
            .map_err(|_| TransportError::Closed)?;

        debug!(task_id = %task_id, "Submitted task to channel");
        Ok(task_id)
    }

    async fn schedule_unlock(&self, request: UnlockRequest, countdown: Duration) -> Result<()> {
        let group_id = request.args.group_id.clone();
        let payload = request.encode().map_err(|e| TransportError::Schedule {
            group_id: group_id.clone(),
            message: e.to_string(),
        })?;

        if countdown.is_zero() {
            return self
                .unlock_tx
                .send(payload)
                .await
                .map_err(|_| TransportError::Closed);
        }

        let sender = self.unlock_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(countdown).await;
            if sender.send(payload).await.is_err() {
                warn!(group_id = %group_id, "Unlock channel closed before delivery");
            }
        });

        debug!(countdown = ?countdown, "Scheduled unlock attempt");
        Ok(())
    }
}

/// Consumes unlock attempts and runs each one independently.
pub struct UnlockWorker {
    unlocker: Arc<ChordUnlocker>,
}

impl UnlockWorker {
    pub fn new(unlocker: Arc<ChordUnlocker>) -> Self {
        Self { unlocker }
    }

    /// Run the worker on a background task.
    pub fn spawn(self, receiver: mpsc::Receiver<Vec<u8>>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(receiver).await })
    }

    /// Consume until every sender is dropped.
    ///
    /// Attempts run concurrently; one slow join never delays another chord.
    pub async fn run(&self, mut receiver: mpsc::Receiver<Vec<u8>>) {
        info!("Unlock worker started");

        while let Some(payload) = receiver.recv().await {
            let request = match UnlockRequest::decode(&payload) {
                Ok(request) => request,
                Err(e) => {
                    error!(error = %e, "Discarding undecodable unlock request");
                    continue;
                }
            };

            let unlocker = Arc::clone(&self.unlocker);
            tokio::spawn(async move {
                let group_id = request.args.group_id.clone();
                match unlocker.run(request).await {
                    Ok(PollOutcome::Failed { error }) => {
                        warn!(group_id = %group_id, reason = %error, "Chord failed");
                    }
                    Ok(outcome) => {
                        debug!(group_id = %group_id, ?outcome, "Unlock attempt finished");
                    }
                    Err(e @ PollError::MaxRetriesExceeded { .. }) => {
                        error!(group_id = %group_id, error = %e, "Chord abandoned");
                    }
                    Err(e) => {
                        error!(group_id = %group_id, error = %e, "Unlock attempt failed");
                    }
                }
            });
        }

        info!("Unlock channel closed, stopping worker");
    }
}
