//! Mock task transport implementation for testing.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Result, SubmittedTask, TaskTransport, TransportError};
use crate::chord::UnlockRequest;
use crate::signature::Signature;

/// An unlock attempt recorded by the mock.
#[derive(Debug, Clone)]
pub struct ScheduledUnlock {
    pub request: UnlockRequest,
    pub countdown: Duration,
}

/// Mock transport that records submissions and scheduled unlocks.
#[derive(Default)]
pub struct MockTransport {
    submitted: RwLock<Vec<SubmittedTask>>,
    scheduled: RwLock<Vec<ScheduledUnlock>>,
    fail_on_submit: RwLock<bool>,
    fail_on_submit_task: RwLock<Option<String>>,
    fail_on_schedule: RwLock<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_submit(&self, fail: bool) {
        *self.fail_on_submit.write().await = fail;
    }

    /// Fail submissions of one task name only.
    pub async fn set_fail_on_submit_task(&self, task: Option<&str>) {
        *self.fail_on_submit_task.write().await = task.map(str::to_string);
    }

    pub async fn set_fail_on_schedule(&self, fail: bool) {
        *self.fail_on_schedule.write().await = fail;
    }

    pub async fn submitted_count(&self) -> usize {
        self.submitted.read().await.len()
    }

    pub async fn submitted(&self) -> Vec<SubmittedTask> {
        self.submitted.read().await.clone()
    }

    /// Submissions of one task name.
    pub async fn submitted_for(&self, task: &str) -> Vec<SubmittedTask> {
        self.submitted
            .read()
            .await
            .iter()
            .filter(|s| s.signature.task == task)
            .cloned()
            .collect()
    }

    pub async fn scheduled_count(&self) -> usize {
        self.scheduled.read().await.len()
    }

    pub async fn take_scheduled(&self) -> Vec<ScheduledUnlock> {
        std::mem::take(&mut *self.scheduled.write().await)
    }
}

#[async_trait]
impl TaskTransport for MockTransport {
    async fn submit(&self, signature: &Signature, args: Vec<Value>) -> Result<String> {
        let failing_task = self.fail_on_submit_task.read().await.clone();
        if *self.fail_on_submit.read().await || failing_task.as_deref() == Some(&signature.task) {
            return Err(TransportError::Submit {
                task: signature.task.clone(),
                message: "Mock submit failure".to_string(),
            });
        }
        let task = SubmittedTask::new(signature, args);
        let task_id = task.task_id.clone();
        self.submitted.write().await.push(task);
        Ok(task_id)
    }

    async fn schedule_unlock(&self, request: UnlockRequest, countdown: Duration) -> Result<()> {
        if *self.fail_on_schedule.read().await {
            return Err(TransportError::Schedule {
                group_id: request.args.group_id.clone(),
                message: "Mock schedule failure".to_string(),
            });
        }
        self.scheduled
            .write()
            .await
            .push(ScheduledUnlock { request, countdown });
        Ok(())
    }
}
