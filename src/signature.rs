//! Task signatures: a task name plus partial arguments and options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Namespace for deriving callback task ids from group ids.
const CHORD_CALLBACK_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x3c, 0x1f, 0x8e, 0x52, 0x7a, 0x04, 0x4d, 0x9b, 0xa6, 0x2e, 0x51, 0x93, 0x0d, 0xc7, 0x48,
    0xf1,
]);

/// Execution options carried with a signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureOptions {
    /// Task id to run under. Assigned on resolution if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Group the task belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Errbacks, invoked with the task id when the task fails.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub link_error: Vec<Signature>,
}

/// A task invocation template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub task: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub options: SignatureOptions,
}

impl Signature {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.options.task_id = Some(task_id.into());
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.options.group_id = Some(group_id.into());
        self
    }

    pub fn on_error(mut self, errback: Signature) -> Self {
        self.options.link_error.push(errback);
        self
    }

    pub fn task_id(&self) -> Option<&str> {
        self.options.task_id.as_deref()
    }

    /// Positional arguments for an invocation: `leading` first, then the
    /// signature's own partial args.
    pub fn with_prepended_args(&self, leading: Vec<Value>) -> Vec<Value> {
        let mut args = leading;
        args.extend(self.args.iter().cloned());
        args
    }
}

/// A signature as it appears on the wire: a bare task name or a full signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureRef {
    Name(String),
    Full(Signature),
}

impl SignatureRef {
    /// Normalize into a full signature with a stable task id.
    ///
    /// Resolving the same reference for the same group always yields the same
    /// task id, so repeated unlock attempts agree on the callback's identity.
    pub fn resolve(&self, group_id: &str) -> Signature {
        let mut signature = match self {
            Self::Name(task) => Signature::new(task.clone()),
            Self::Full(signature) => signature.clone(),
        };
        if signature.options.task_id.is_none() {
            signature.options.task_id = Some(callback_task_id(group_id));
        }
        signature
    }
}

impl From<Signature> for SignatureRef {
    fn from(signature: Signature) -> Self {
        Self::Full(signature)
    }
}

impl From<&str> for SignatureRef {
    fn from(task: &str) -> Self {
        Self::Name(task.to_string())
    }
}

/// Deterministic callback task id for a group (UUID v5).
pub fn callback_task_id(group_id: &str) -> String {
    uuid::Uuid::new_v5(&CHORD_CALLBACK_NAMESPACE, group_id.as_bytes()).to_string()
}
