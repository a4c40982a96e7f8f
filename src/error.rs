//! Error taxonomy for the mesh.
//!
//! Expected runtime conditions (closed queue, empty queue, missing view
//! entry) are expressed as `Option`/`bool` returns, not errors. The types
//! here cover the two places a caller genuinely has to branch: transport
//! delivery and configuration validation. A node is never torn down by a
//! transport or logging fault; only `stop()` terminates a node.

use crate::mesh::NodeId;

/// Delivery failures reported by a [`Transport`](crate::mesh::Transport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The addressed node is not registered. The message is dropped; the
    /// caller decides whether to recover (offload reinserts the task,
    /// gossip ignores the loss).
    #[error("no node registered for receiver {0}")]
    UnknownReceiver(NodeId),

    /// A broadcast-only message was handed to `unicast`.
    #[error("{0} message carries no receiver")]
    MissingReceiver(crate::mesh::MessageKind),
}

/// Configuration validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}
