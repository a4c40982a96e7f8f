//! Inter-node protocol messages.
//!
//! Defines the envelope exchanged between peers. The types derive serde so
//! a wire transport can replace the in-memory one without touching the
//! protocol layer; in-process they travel by value through inbox queues.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// A unique identifier for a mesh node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminant of a [`Message`], for dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Broadcast: a node announces its current queue depth (gossip).
    LoadUpdate,
    /// Pull: a node asks a peer for work. Reserved, no side effects yet.
    TaskRequest,
    /// Push: a node hands a queued task to a peer for execution.
    TaskTransfer,
    /// Membership: a node announces its presence.
    PeerDiscovery,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::LoadUpdate => "LoadUpdate",
            MessageKind::TaskRequest => "TaskRequest",
            MessageKind::TaskTransfer => "TaskTransfer",
            MessageKind::PeerDiscovery => "PeerDiscovery",
        };
        f.write_str(name)
    }
}

/// Messages exchanged between mesh peers.
///
/// Immutable once constructed. Every variant carries its sender; only the
/// point-to-point variants carry a receiver. A `LoadUpdate` or
/// `PeerDiscovery` is addressed by the broadcast fan-out, so
/// [`Message::receiver`] returns `None` for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    LoadUpdate {
        sender: NodeId,
        depth: usize,
    },
    TaskTransfer {
        sender: NodeId,
        receiver: NodeId,
        task: Arc<Task>,
    },
    TaskRequest {
        sender: NodeId,
        receiver: NodeId,
    },
    PeerDiscovery {
        sender: NodeId,
    },
}

impl Message {
    pub fn load_update(sender: NodeId, depth: usize) -> Self {
        Message::LoadUpdate { sender, depth }
    }

    pub fn task_transfer(sender: NodeId, receiver: NodeId, task: Arc<Task>) -> Self {
        Message::TaskTransfer {
            sender,
            receiver,
            task,
        }
    }

    pub fn task_request(sender: NodeId, receiver: NodeId) -> Self {
        Message::TaskRequest { sender, receiver }
    }

    pub fn peer_discovery(sender: NodeId) -> Self {
        Message::PeerDiscovery { sender }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::LoadUpdate { .. } => MessageKind::LoadUpdate,
            Message::TaskTransfer { .. } => MessageKind::TaskTransfer,
            Message::TaskRequest { .. } => MessageKind::TaskRequest,
            Message::PeerDiscovery { .. } => MessageKind::PeerDiscovery,
        }
    }

    pub fn sender(&self) -> NodeId {
        match self {
            Message::LoadUpdate { sender, .. }
            | Message::TaskTransfer { sender, .. }
            | Message::TaskRequest { sender, .. }
            | Message::PeerDiscovery { sender } => *sender,
        }
    }

    /// The addressed node, or `None` for broadcast variants.
    pub fn receiver(&self) -> Option<NodeId> {
        match self {
            Message::TaskTransfer { receiver, .. } | Message::TaskRequest { receiver, .. } => {
                Some(*receiver)
            }
            Message::LoadUpdate { .. } | Message::PeerDiscovery { .. } => None,
        }
    }

    /// The advertised queue depth. `None` unless this is a `LoadUpdate`.
    pub fn depth(&self) -> Option<usize> {
        match self {
            Message::LoadUpdate { depth, .. } => Some(*depth),
            _ => None,
        }
    }

    /// The carried task. `None` unless this is a `TaskTransfer`.
    pub fn task(&self) -> Option<&Arc<Task>> {
        match self {
            Message::TaskTransfer { task, .. } => Some(task),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message[{} from={}", self.kind(), self.sender())?;
        match self.receiver() {
            Some(receiver) => write!(f, " to={}", receiver)?,
            None => write!(f, " to=*")?,
        }
        if let Some(depth) = self.depth() {
            write!(f, " depth={}", depth)?;
        }
        if let Some(task) = self.task() {
            write!(f, " task={}", task.id())?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    #[test]
    fn load_update_accessors() {
        let msg = Message::load_update(NodeId::new(2), 5);
        assert_eq!(msg.kind(), MessageKind::LoadUpdate);
        assert_eq!(msg.sender(), NodeId::new(2));
        assert_eq!(msg.receiver(), None);
        assert_eq!(msg.depth(), Some(5));
        assert!(msg.task().is_none());
    }

    #[test]
    fn task_transfer_accessors() {
        let task = Arc::new(Task::new(42, 10));
        let msg = Message::task_transfer(NodeId::new(0), NodeId::new(3), task);
        assert_eq!(msg.kind(), MessageKind::TaskTransfer);
        assert_eq!(msg.receiver(), Some(NodeId::new(3)));
        assert_eq!(msg.task().map(|t| t.id()), Some(42));
        // Accessing a payload the variant does not carry yields absence.
        assert_eq!(msg.depth(), None);
    }

    #[test]
    fn display_shapes() {
        let update = Message::load_update(NodeId::new(2), 5);
        assert_eq!(update.to_string(), "Message[LoadUpdate from=2 to=* depth=5]");

        let task = Arc::new(Task::new(9, 10));
        let transfer = Message::task_transfer(NodeId::new(1), NodeId::new(4), task);
        assert_eq!(
            transfer.to_string(),
            "Message[TaskTransfer from=1 to=4 task=9]"
        );

        let request = Message::task_request(NodeId::new(1), NodeId::new(2));
        assert_eq!(request.to_string(), "Message[TaskRequest from=1 to=2]");
    }
}
