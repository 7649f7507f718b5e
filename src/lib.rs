//! Chord Barrier - group-then-callback synchronization for task queues
//!
//! A chord runs a group of tasks (the header) and, once every member has
//! finished, invokes a callback (the body) with the members' results in
//! header order. Waiting is done by re-scheduling a stateless unlock attempt
//! until the group is ready, so no process holds a chord in memory.
//!
//! ## Modules
//!
//! - `chord`: unlock attempts, joining, callback dispatch, error reporting
//! - `result`: task outcomes, result handles and the `ResultStore` seam
//! - `signature`: task signatures and callback resolution
//! - `transport`: the `TaskTransport` seam and its implementations
//! - `config`: layered configuration
//! - `utils`: bootstrap helpers

pub mod chord;
pub mod config;
pub mod result;
pub mod signature;
pub mod transport;
pub mod utils;

pub use chord::{ChordBuilder, ChordError, ChordUnlocker, PollError, PollOutcome, UnlockRequest};
pub use result::{GroupResult, Outcome, ResultStore, TaskFailure, TaskState};
pub use signature::{Signature, SignatureRef};
pub use transport::TaskTransport;
