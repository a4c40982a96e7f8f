//! Peer-to-peer load balancing mesh.
//!
//! Symmetric nodes jointly process a task stream: each node drains its
//! own queue with a small worker pool, advertises its depth to every peer
//! on a fixed gossip period, and sheds one task per tick to the cheapest
//! known peer once its own depth crosses a threshold. There is no
//! coordinator; balance emerges from greedy local decisions over stale
//! views.

pub mod node;
pub mod protocol;
pub mod queue;
pub mod transport;
pub mod view;

pub use node::{NodeConfig, PeerNode};
pub use protocol::{Message, MessageKind, NodeId};
pub use queue::{TaskQueue, WorkQueue};
pub use transport::{InMemoryTransport, InboxHandle, Transport};
pub use view::PeerView;
