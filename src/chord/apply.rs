//! Starting a chord: submit the header, schedule the first unlock.

use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use super::{duration_to_millis, ChordUnlock, UnlockRequest};
use crate::config::ChordConfig;
use crate::result::ResultTuple;
use crate::signature::{Signature, SignatureRef};
use crate::transport::{self, TaskTransport};

/// Delay before the first unlock attempt.
pub const DEFAULT_UNLOCK_COUNTDOWN: Duration = Duration::from_secs(1);

/// Identifiers of a started chord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChord {
    pub group_id: String,
    pub callback_id: String,
    /// Header task ids, in header order.
    pub members: Vec<String>,
}

/// A header group plus the callback (body) to run with its results.
#[derive(Debug, Clone)]
pub struct ChordBuilder {
    header: Vec<Signature>,
    body: Signature,
    interval: Option<Duration>,
    max_retries: Option<u32>,
    propagate: Option<bool>,
    countdown: Duration,
}

impl ChordBuilder {
    pub fn new(header: Vec<Signature>, body: Signature) -> Self {
        Self {
            header,
            body,
            interval: None,
            max_retries: None,
            propagate: None,
            countdown: DEFAULT_UNLOCK_COUNTDOWN,
        }
    }

    /// Delay between unlock attempts.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Bound the number of unlock retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Override the configured propagate default for this chord.
    pub fn propagate(mut self, propagate: bool) -> Self {
        self.propagate = Some(propagate);
        self
    }

    /// Delay before the first unlock attempt.
    pub fn countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    /// Submit every header task and schedule the first unlock attempt.
    ///
    /// Configuration defaults are resolved here, once; later attempts carry
    /// them explicitly and never re-read configuration.
    pub async fn apply(
        self,
        transport: &dyn TaskTransport,
        config: &ChordConfig,
    ) -> transport::Result<AppliedChord> {
        let group_id = Uuid::new_v4().to_string();

        let mut members = Vec::with_capacity(self.header.len());
        for signature in self.header {
            let mut member = signature.with_group_id(&group_id);
            if member.task_id().is_none() {
                member = member.with_task_id(Uuid::new_v4().to_string());
            }
            let task_id = transport.submit(&member, member.args.clone()).await?;
            members.push(task_id);
        }

        let body = SignatureRef::Full(self.body).resolve(&group_id);
        let callback_id = body.task_id().unwrap_or_default().to_string();

        let args = ChordUnlock {
            group_id: group_id.clone(),
            callback: SignatureRef::Full(body),
            interval_ms: Some(duration_to_millis(
                self.interval.unwrap_or_else(|| config.poll_interval()),
            )),
            propagate: Some(self.propagate.unwrap_or(config.propagate)),
            max_retries: self.max_retries.or(config.max_retries),
            result: members.iter().map(ResultTuple::new).collect(),
        };
        transport
            .schedule_unlock(UnlockRequest::new(args), self.countdown)
            .await?;

        info!(
            group_id = %group_id,
            callback_id = %callback_id,
            members = members.len(),
            "Chord applied"
        );

        Ok(AppliedChord {
            group_id,
            callback_id,
            members,
        })
    }
}
