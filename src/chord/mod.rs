//! Chord barrier: wait for a group, then fire the callback once.
//!
//! Result stores here only answer point lookups, so waiting is expressed as
//! a chain of unlock attempts. Each attempt is a fresh unit of work that
//! either settles the chord or schedules the next attempt on the transport.
//!
//! ## Flow
//!
//! ```text
//! UnlockRequest --> ChordUnlocker --> join --> NotReady --> schedule_unlock(+interval)
//!                                          \-> Joined   --> CallbackDispatcher
//!                                          \-> Failed   --> ErrorReporter
//! ```
//!
//! ## Wire Shape
//!
//! `UnlockRequest` carries everything an attempt needs: the group id, the
//! callback signature, the serialized member results, the interval, the
//! propagate flag and the retry budget. Nothing else survives between
//! attempts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ChordConfig;
use crate::result::{ResultTuple, TaskFailure};
use crate::signature::SignatureRef;

pub mod apply;
pub mod dispatch;
pub mod join;
pub mod report;
pub mod unlock;

pub use apply::{AppliedChord, ChordBuilder};
pub use dispatch::CallbackDispatcher;
pub use join::{JoinError, JoinOutcome, JoinStrategy};
pub use report::ErrorReporter;
pub use unlock::{ChordUnlocker, PollError, PollOutcome};

/// Shortest interval between unlock attempts, in milliseconds.
pub const MIN_INTERVAL_MS: u64 = 1;

/// Error kind recorded on a callback failed by the chord.
pub const CHORD_ERROR_KIND: &str = "ChordError";

/// Failure delivered to a chord callback.
///
/// Always synthesized; a member's own error is only ever quoted in `reason`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ChordError {
    pub reason: String,
}

impl ChordError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Error for a callback that could not be submitted.
    pub fn callback_error(cause: &dyn std::error::Error) -> Self {
        Self::new(format!("Callback error: {}", cause))
    }

    pub fn to_failure(&self) -> TaskFailure {
        TaskFailure::new(CHORD_ERROR_KIND, self.reason.clone())
    }
}

/// Arguments of one unlock attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordUnlock {
    pub group_id: String,
    pub callback: SignatureRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    pub result: Vec<ResultTuple>,
}

impl ChordUnlock {
    pub fn new(
        group_id: impl Into<String>,
        callback: impl Into<SignatureRef>,
        result: Vec<ResultTuple>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            callback: callback.into(),
            interval_ms: None,
            propagate: None,
            max_retries: None,
            result,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = Some(duration_to_millis(interval));
        self
    }

    pub fn with_propagate(mut self, propagate: bool) -> Self {
        self.propagate = Some(propagate);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}

/// An unlock attempt as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockRequest {
    /// Attempts already made before this one.
    #[serde(default)]
    pub retries: u32,
    pub args: ChordUnlock,
}

impl UnlockRequest {
    pub fn new(args: ChordUnlock) -> Self {
        Self { retries: 0, args }
    }

    /// The request for the attempt after this one.
    pub fn next_attempt(&self) -> Self {
        Self {
            retries: self.retries.saturating_add(1),
            args: self.args.clone(),
        }
    }

    /// Retries this attempt may still schedule, if the budget is bounded.
    pub fn remaining_retries(&self, max_retries: Option<u32>) -> Option<u32> {
        max_retries.map(|max| max.saturating_sub(self.retries))
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Process-wide defaults applied to unlock attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct UnlockSettings {
    /// Propagate flag for requests that do not carry one.
    pub default_propagate: bool,
    /// Interval for requests that do not carry one.
    pub default_interval: Duration,
    /// Retry budget for requests that do not carry one.
    pub default_max_retries: Option<u32>,
    /// Ceiling on fetching values from an already-ready group.
    pub join_timeout: Duration,
}

impl UnlockSettings {
    pub fn from_config(config: &ChordConfig) -> Self {
        Self {
            default_propagate: config.propagate,
            default_interval: Duration::from_millis(duration_to_millis(config.poll_interval())),
            default_max_retries: config.max_retries,
            join_timeout: config.join_timeout(),
        }
    }
}

impl Default for UnlockSettings {
    fn default() -> Self {
        Self::from_config(&ChordConfig::default())
    }
}

/// Whole milliseconds of a poll interval, never below 1ms so a
/// rescheduled attempt always waits on a timer.
pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis())
        .unwrap_or(u64::MAX)
        .max(MIN_INTERVAL_MS)
}

#[cfg(test)]
mod tests;
