//! Shared fixtures for integration tests.
//!
//! Runs a chord stack in-process: channel transport, unlock worker, and a
//! small executor that completes header tasks against an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chord_barrier::chord::{ChordUnlocker, UnlockSettings};
use chord_barrier::config::ChordConfig;
use chord_barrier::result::{InMemoryResultStore, Outcome, ResultStore, TaskFailure};
use chord_barrier::signature::Signature;
use chord_barrier::transport::{ChannelTransport, SubmittedTask, UnlockWorker};
use chord_barrier::utils::bootstrap::try_init_test_tracing;

/// How long tests wait for a callback before giving up.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Header task that returns `a + b` after `delay_ms`.
pub fn add(a: i64, b: i64, delay_ms: u64) -> Signature {
    Signature::new("add")
        .with_args(vec![json!(a), json!(b)])
        .with_kwarg("delay_ms", json!(delay_ms))
}

/// Header task that fails with `KeyError` after `delay_ms`.
pub fn fail(delay_ms: u64) -> Signature {
    Signature::new("fail").with_kwarg("delay_ms", json!(delay_ms))
}

/// Header task that is never executed.
pub fn hang() -> Signature {
    Signature::new("hang")
}

/// An in-process chord stack.
pub struct Cluster {
    pub store: Arc<InMemoryResultStore>,
    pub transport: ChannelTransport,
    pub config: ChordConfig,
    /// Every task the executor did not handle itself (callbacks, errbacks).
    others: mpsc::UnboundedReceiver<SubmittedTask>,
    handles: Vec<JoinHandle<()>>,
}

impl Cluster {
    pub fn start(config: ChordConfig) -> Self {
        try_init_test_tracing();

        let store = Arc::new(InMemoryResultStore::new());
        let (transport, receivers) = ChannelTransport::new(64);
        let unlocker = ChordUnlocker::new(
            store.clone(),
            Arc::new(transport.clone()),
            UnlockSettings::from_config(&config),
        );

        let worker = UnlockWorker::new(Arc::new(unlocker)).spawn(receivers.unlocks);
        let (others_tx, others) = mpsc::unbounded_channel();
        let executor = tokio::spawn(execute(store.clone(), receivers.tasks, others_tx));

        Self {
            store,
            transport,
            config,
            others,
            handles: vec![worker, executor],
        }
    }

    /// Next task that reached the executor without a handler.
    pub async fn next_other(&mut self) -> Option<SubmittedTask> {
        tokio::time::timeout(CALLBACK_TIMEOUT, self.others.recv())
            .await
            .ok()
            .flatten()
    }

    /// Assert nothing else reaches the executor within `window`.
    pub async fn assert_quiet_for(&mut self, window: Duration) {
        if let Ok(Some(task)) = tokio::time::timeout(window, self.others.recv()).await {
            panic!("unexpected task submitted: {}", task.signature.task);
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn execute(
    store: Arc<InMemoryResultStore>,
    mut tasks: mpsc::Receiver<SubmittedTask>,
    others: mpsc::UnboundedSender<SubmittedTask>,
) {
    while let Some(task) = tasks.recv().await {
        let delay = Duration::from_millis(
            task.signature
                .kwargs
                .get("delay_ms")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        );
        let outcome = match task.signature.task.as_str() {
            "add" => {
                let sum: i64 = task.args.iter().filter_map(Value::as_i64).sum();
                Outcome::Success(json!(sum))
            }
            "fail" => Outcome::Failure(TaskFailure::new("KeyError", "missing")),
            "hang" => continue,
            _ => {
                let _ = others.send(task);
                continue;
            }
        };

        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.store_outcome(&task.task_id, outcome).await.unwrap();
        });
    }
}
