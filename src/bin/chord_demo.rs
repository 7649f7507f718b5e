//! chord-demo: runs one chord end to end in a single process
//!
//! Submits a header of `add` tasks, completes them out of order after
//! random delays, and waits for the `tsum` callback to receive their
//! results in header order. A `backend_cleanup` task then expires stored
//! results older than `worker.result_expires_secs`.
//!
//! ## Architecture
//! ```text
//! chord-demo (single process)
//!     │
//!     ├── ChordBuilder ──submit──→ task channel ──→ executor (add, tsum, backend_cleanup)
//!     │                                               │
//!     │                                               └── InMemoryResultStore
//!     └── schedule_unlock ──→ unlock channel ──→ UnlockWorker ──→ ChordUnlocker
//! ```
//!
//! Set `CHORD_DEMO_MEMBERS` to change the header size (default 10).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::{json, Value};
use tracing::{info, warn};

use chord_barrier::chord::{ChordBuilder, ChordUnlocker, UnlockSettings};
use chord_barrier::config::Config;
use chord_barrier::result::{
    backend_cleanup, InMemoryResultStore, Outcome, ResultStore, TaskFailure, BACKEND_CLEANUP_TASK,
};
use chord_barrier::signature::Signature;
use chord_barrier::transport::{ChannelTransport, SubmittedTask, TaskTransport, UnlockWorker};
use chord_barrier::utils::bootstrap::init_tracing;

const DEFAULT_MEMBERS: i64 = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(None)?;
    init_tracing();

    let members = std::env::var("CHORD_DEMO_MEMBERS")
        .ok()
        .and_then(|n| n.parse().ok())
        .unwrap_or(DEFAULT_MEMBERS);

    let store = Arc::new(InMemoryResultStore::new());
    let (transport, mut receivers) = ChannelTransport::from_config(&config.worker);
    let unlocker = ChordUnlocker::new(
        store.clone(),
        Arc::new(transport.clone()),
        UnlockSettings::from_config(&config.chord),
    );
    let worker = UnlockWorker::new(Arc::new(unlocker)).spawn(receivers.unlocks);

    let header = (0..members)
        .map(|i| Signature::new("add").with_args(vec![json!(i), json!(i)]))
        .collect();
    let applied = ChordBuilder::new(header, Signature::new("tsum"))
        .countdown(Duration::ZERO)
        .apply(&transport, &config.chord)
        .await?;

    info!(group_id = %applied.group_id, members, "chord-demo started");

    while let Some(task) = receivers.tasks.recv().await {
        match task.signature.task.as_str() {
            "add" => {
                let store = store.clone();
                tokio::spawn(async move { run_add(store.as_ref(), task).await });
            }
            "tsum" => {
                let (total, values) = tsum(&task.args);
                store
                    .store_outcome(&task.task_id, Outcome::Success(json!(total)))
                    .await?;
                println!("tsum({}) = {}", Value::Array(values), total);
                transport
                    .submit(&Signature::new(BACKEND_CLEANUP_TASK), vec![])
                    .await?;
            }
            BACKEND_CLEANUP_TASK => {
                backend_cleanup(store.as_ref(), config.worker.result_expires()).await?;
                break;
            }
            other => warn!(task = %other, "No handler for task"),
        }
    }

    worker.abort();
    Ok(())
}

/// Complete an `add` task after a random delay.
async fn run_add(store: &dyn ResultStore, task: SubmittedTask) {
    let delay = Duration::from_millis(rand::rng().random_range(10..300));
    tokio::time::sleep(delay).await;

    let outcome = match task.args.as_slice() {
        [a, b] => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Outcome::Success(json!(a + b)),
            _ => Outcome::Failure(TaskFailure::new("TypeError", "add expects integers")),
        },
        _ => Outcome::Failure(TaskFailure::new("TypeError", "add takes 2 arguments")),
    };

    if let Err(e) = store.store_outcome(&task.task_id, outcome).await {
        warn!(task_id = %task.task_id, error = %e, "Failed to store result");
    }
}

/// Sum the joined results a chord passes as the first argument.
fn tsum(args: &[Value]) -> (i64, Vec<Value>) {
    let values = args
        .first()
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let total = values.iter().filter_map(Value::as_i64).sum();
    (total, values)
}
