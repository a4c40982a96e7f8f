//! Message delivery between registered nodes.
//!
//! The transport routes by receiver id and knows nothing about node
//! internals: registration hands it an [`InboxHandle`], a capability that
//! only appends to the owning node's inbox. Ownership stays acyclic: the
//! driver owns nodes, nodes own their queues, the transport owns only the
//! handles it was given.
//!
//! [`InMemoryTransport`] delivers synchronously and reliably. A socket
//! implementation can replace it behind the same trait; the protocol types
//! already carry serde for that.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::protocol::{Message, NodeId};
use super::queue::WorkQueue;
use crate::error::TransportError;

/// Capability for appending messages to one node's inbox.
///
/// Accepting a message only enqueues it; the heavy lifting happens on the
/// receiving node's pump. Cloning the handle clones the capability, not
/// the inbox.
#[derive(Clone)]
pub struct InboxHandle {
    inbox: Arc<WorkQueue<Message>>,
}

impl InboxHandle {
    pub fn new(inbox: Arc<WorkQueue<Message>>) -> Self {
        Self { inbox }
    }

    /// Append a message to the inbox. Returns `false` once the owning
    /// node has stopped; the message is then dropped.
    pub fn accept(&self, message: Message) -> bool {
        self.inbox.push(message)
    }
}

/// Unicast and broadcast delivery to registered nodes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Install the inbox handler for a node id. Re-registering the same
    /// id replaces the previous handler.
    fn register(&self, id: NodeId, handler: InboxHandle);

    /// Deliver to the node addressed by the message's receiver.
    ///
    /// Fails with [`TransportError::UnknownReceiver`] when no handler is
    /// registered for it; the message is dropped and never retried.
    async fn unicast(&self, message: Message) -> Result<(), TransportError>;

    /// Deliver to every registered node except `sender`, best effort.
    /// Returns the number of inboxes that accepted the message.
    async fn broadcast(&self, sender: NodeId, message: Message) -> usize;

    /// Snapshot of the currently registered node ids.
    fn known_ids(&self) -> Vec<NodeId>;
}

/// Reliable in-process transport backed by a handler registry.
///
/// Delivery happens on the sender's thread and completes once the message
/// sits in the target inbox. Registry reads vastly outnumber writes, so
/// the registry is behind a read-write lock; handler snapshots are taken
/// before delivering, keeping the lock out of the delivery path.
#[derive(Default)]
pub struct InMemoryTransport {
    nodes: RwLock<HashMap<NodeId, InboxHandle>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<NodeId, InboxHandle>> {
        self.nodes.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn register(&self, id: NodeId, handler: InboxHandle) {
        let replaced = self
            .nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, handler)
            .is_some();
        if replaced {
            tracing::debug!(node = %id, "replaced registered inbox handler");
        }
    }

    async fn unicast(&self, message: Message) -> Result<(), TransportError> {
        let receiver = message
            .receiver()
            .ok_or_else(|| TransportError::MissingReceiver(message.kind()))?;
        let handler = self
            .read()
            .get(&receiver)
            .cloned()
            .ok_or(TransportError::UnknownReceiver(receiver))?;
        if !handler.accept(message) {
            tracing::debug!(node = %receiver, "receiver stopped, message dropped");
        }
        Ok(())
    }

    async fn broadcast(&self, sender: NodeId, message: Message) -> usize {
        let targets: Vec<(NodeId, InboxHandle)> = self
            .read()
            .iter()
            .filter(|(&id, _)| id != sender)
            .map(|(&id, handler)| (id, handler.clone()))
            .collect();
        let mut delivered = 0;
        for (id, handler) in targets {
            if handler.accept(message.clone()) {
                delivered += 1;
            } else {
                tracing::trace!(node = %id, "broadcast recipient stopped, message dropped");
            }
        }
        delivered
    }

    fn known_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.read().keys().copied().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mesh::protocol::MessageKind;

    fn raw_inbox(transport: &InMemoryTransport, id: u32) -> Arc<WorkQueue<Message>> {
        let inbox = Arc::new(WorkQueue::new());
        transport.register(NodeId::new(id), InboxHandle::new(Arc::clone(&inbox)));
        inbox
    }

    #[tokio::test]
    async fn unicast_reaches_the_addressed_inbox() {
        let transport = InMemoryTransport::new();
        let inbox = raw_inbox(&transport, 1);
        transport
            .unicast(Message::task_request(NodeId::new(0), NodeId::new(1)))
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(
            inbox.try_pop().map(|m| m.kind()),
            Some(MessageKind::TaskRequest)
        );
    }

    #[tokio::test]
    async fn unicast_to_unknown_receiver_fails() {
        let transport = InMemoryTransport::new();
        let err = transport
            .unicast(Message::task_request(NodeId::new(0), NodeId::new(9)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownReceiver(id) if id == NodeId::new(9)));
    }

    #[tokio::test]
    async fn unicast_of_broadcast_message_fails() {
        let transport = InMemoryTransport::new();
        raw_inbox(&transport, 1);
        let err = transport
            .unicast(Message::load_update(NodeId::new(0), 3))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MissingReceiver(_)));
    }

    #[tokio::test]
    async fn broadcast_excludes_the_sender() {
        let transport = InMemoryTransport::new();
        let sender_inbox = raw_inbox(&transport, 0);
        let peer1 = raw_inbox(&transport, 1);
        let peer2 = raw_inbox(&transport, 2);

        let delivered = transport
            .broadcast(NodeId::new(0), Message::load_update(NodeId::new(0), 4))
            .await;
        assert_eq!(delivered, 2);
        assert_eq!(sender_inbox.len(), 0);
        assert_eq!(peer1.len(), 1);
        assert_eq!(peer2.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_with_only_the_sender_delivers_nothing() {
        let transport = InMemoryTransport::new();
        let sender_inbox = raw_inbox(&transport, 0);
        let delivered = transport
            .broadcast(NodeId::new(0), Message::load_update(NodeId::new(0), 4))
            .await;
        assert_eq!(delivered, 0);
        assert_eq!(sender_inbox.len(), 0);
    }

    #[tokio::test]
    async fn re_register_replaces_the_handler() {
        let transport = InMemoryTransport::new();
        let old = raw_inbox(&transport, 1);
        let new = raw_inbox(&transport, 1);
        transport
            .unicast(Message::task_request(NodeId::new(0), NodeId::new(1)))
            .await
            .unwrap();
        assert_eq!(old.len(), 0);
        assert_eq!(new.len(), 1);
    }

    #[tokio::test]
    async fn known_ids_snapshots_the_registry() {
        let transport = InMemoryTransport::new();
        raw_inbox(&transport, 3);
        raw_inbox(&transport, 1);
        assert_eq!(transport.known_ids(), vec![NodeId::new(1), NodeId::new(3)]);
    }
}
