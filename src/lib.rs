//! Decentralized peer-to-peer load balancing mesh.
//!
//! A set of symmetric [`PeerNode`]s jointly processes a stream of
//! [`Task`]s. Each node owns a local queue drained by a small worker
//! pool, periodically gossips its queue depth to every peer, and sheds
//! work to the peer it currently believes cheapest once its own depth
//! crosses a threshold. No coordinator exists; global balance emerges
//! from per-node greedy decisions over stale, partial views.
//!
//! Messages travel through a pluggable [`Transport`]; the bundled
//! [`InMemoryTransport`] delivers synchronously in-process, and the
//! protocol types carry serde so a socket transport can replace it.
//! Nodes report their lifecycle and metrics through an injected
//! [`LogSink`].

pub mod config;
pub mod error;
pub mod logging;
pub mod mesh;
pub mod task;

pub use config::SimConfig;
pub use error::{ConfigError, TransportError};
pub use logging::{LogSink, MemoryLog, SimLog};
pub use mesh::{
    InMemoryTransport, InboxHandle, Message, MessageKind, NodeConfig, NodeId, PeerNode, PeerView,
    TaskQueue, Transport, WorkQueue,
};
pub use task::Task;
