//! The autonomous mesh node.
//!
//! Each `PeerNode` owns a local task queue and balances load with its
//! peers without any central coordinator. A running node drives four
//! cooperating units, all spawned on the runtime:
//!
//! 1. Workers (default 2): drain the task queue and execute tasks.
//! 2. Gossiper: every period, broadcast the local queue depth to all
//!    peers and, above the configured threshold, shed one task to the
//!    peer currently believed cheapest.
//! 3. Pump: drain the inbox and dispatch incoming messages.
//!
//! Routing decisions are greedy over the stale, partial [`PeerView`];
//! the mesh converges statistically, one task per node per tick.
//!
//! Lock discipline: node code holds at most one of the node's locks
//! (task queue, inbox, view, peer list) at any moment, and calls into
//! the transport only with all of them released.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::protocol::{Message, NodeId};
use super::queue::{TaskQueue, WorkQueue};
use super::transport::{InboxHandle, Transport};
use super::view::PeerView;
use crate::logging::LogSink;
use crate::task::Task;

/// Tuning knobs for a single node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Queue depth above which a tick attempts one offload (strictly
    /// greater than).
    pub load_threshold: usize,
    /// Number of concurrent workers draining the task queue.
    pub workers: usize,
    /// Period between gossip/offload evaluations.
    pub gossip_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            load_threshold: 10,
            workers: 2,
            gossip_interval: Duration::from_millis(500),
        }
    }
}

/// An autonomous worker node in the load balancing mesh.
///
/// Constructed stopped; [`start`](PeerNode::start) spawns the units and
/// [`stop`](PeerNode::stop) signals, joins, and discards whatever is
/// still queued. A node instance runs at most once; after `stop()` the
/// queues stay closed.
pub struct PeerNode {
    id: NodeId,
    config: NodeConfig,
    transport: Arc<dyn Transport>,
    log: Arc<dyn LogSink>,
    tasks: Arc<TaskQueue>,
    inbox: Arc<WorkQueue<Message>>,
    view: PeerView,
    peers: Mutex<Vec<NodeId>>,
    tasks_processed: AtomicU64,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    units: Mutex<Vec<JoinHandle<()>>>,
}

impl PeerNode {
    pub fn new(
        id: NodeId,
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            id,
            config,
            transport,
            log,
            tasks: Arc::new(TaskQueue::new()),
            inbox: Arc::new(WorkQueue::new()),
            view: PeerView::new(),
            peers: Mutex::new(Vec::new()),
            tasks_processed: AtomicU64::new(0),
            running: AtomicBool::new(false),
            shutdown,
            units: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Spawn the node's units. No-op when already running or already
    /// stopped.
    pub fn start(self: &Arc<Self>) {
        if self.tasks.is_closed() {
            tracing::warn!(node = %self.id, "node already stopped, not restarting");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.log.node_event(self.id, "Starting node");

        let mut handles = Vec::with_capacity(self.config.workers + 2);
        for worker in 0..self.config.workers {
            let node = Arc::clone(self);
            handles.push(tokio::spawn(async move { node.worker_loop(worker).await }));
        }
        let node = Arc::clone(self);
        handles.push(tokio::spawn(async move { node.gossip_loop().await }));
        let node = Arc::clone(self);
        handles.push(tokio::spawn(async move { node.pump_loop().await }));

        self.lock_units().extend(handles);
    }

    /// Signal every unit, wake all blocked waits, and join.
    ///
    /// A worker mid-execute finishes its task first, so this returns
    /// within roughly one task cost. Tasks still queued are discarded
    /// (they remain countable via [`current_load`](PeerNode::current_load)).
    /// Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.log.node_event(self.id, "Stopping node");

        let _ = self.shutdown.send(true);
        self.tasks.close();
        self.inbox.close();

        let handles: Vec<JoinHandle<()>> = self.lock_units().drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(node = %self.id, error = %err, "unit terminated abnormally");
            }
        }
    }

    /// Queue a task locally and wake at most one worker.
    ///
    /// Safe to call from any thread; on a stopped node the task is
    /// silently discarded.
    pub fn add_task(&self, task: Arc<Task>) {
        let task_id = task.id();
        if !self.tasks.push(task) {
            tracing::debug!(node = %self.id, task = task_id, "node stopped, task discarded");
            return;
        }
        self.log.node_event(
            self.id,
            &format!("Added task {} (queue depth: {})", task_id, self.current_load()),
        );
    }

    /// Instantaneous local queue depth. Stale the moment it returns.
    pub fn current_load(&self) -> usize {
        self.tasks.len()
    }

    /// Total tasks completed by this node's workers. Monotone.
    pub fn tasks_processed(&self) -> u64 {
        self.tasks_processed.load(Ordering::Relaxed)
    }

    /// Accept an inbound message. Only enqueues; processing happens on
    /// the pump. Messages arriving after `stop()` are dropped.
    pub fn handle_message(&self, message: Message) {
        if !self.inbox.push(message) {
            tracing::trace!(node = %self.id, "node stopped, message dropped");
        }
    }

    /// The registration capability for the transport: a handle that
    /// appends to this node's inbox.
    pub fn inbox_handle(&self) -> InboxHandle {
        InboxHandle::new(Arc::clone(&self.inbox))
    }

    /// Register a peer id. Idempotent; the node never peers with itself.
    pub fn add_peer(&self, peer: NodeId) {
        if peer == self.id {
            return;
        }
        let added = {
            let mut peers = self.lock_peers();
            if peers.contains(&peer) {
                false
            } else {
                peers.push(peer);
                true
            }
        };
        if added {
            self.log
                .node_event(self.id, &format!("Added peer {}", peer));
        }
    }

    /// Snapshot of the known peer ids, in registration order.
    pub fn peers(&self) -> Vec<NodeId> {
        self.lock_peers().clone()
    }

    /// The advisory peer-load view. Exposed so tests can seed stale
    /// observations.
    pub fn view(&self) -> &PeerView {
        &self.view
    }

    /// Messages sitting in the inbox, not yet dispatched.
    pub fn pending_messages(&self) -> usize {
        self.inbox.len()
    }

    /// One gossip/offload evaluation: report metrics, broadcast the
    /// current depth, and above the threshold try to shed one task.
    ///
    /// This is the body of the periodic ticker; it is callable directly
    /// to drive a tick by hand.
    pub async fn gossip_tick(&self) {
        let depth = self.current_load();
        self.log.metrics(self.id, depth, self.tasks_processed());
        // Gossip is advisory: nothing to do about peers that miss it.
        self.transport
            .broadcast(self.id, Message::load_update(self.id, depth))
            .await;
        if depth > self.config.load_threshold {
            self.offload_one(depth).await;
        }
    }

    async fn worker_loop(&self, worker: usize) {
        while let Some(task) = self.tasks.pop().await {
            self.log
                .node_event(self.id, &format!("Processing task {}", task.id()));
            task.execute().await;
            let total = self.tasks_processed.fetch_add(1, Ordering::Relaxed) + 1;
            self.log.node_event(
                self.id,
                &format!("Completed task {} (total processed: {})", task.id(), total),
            );
        }
        tracing::debug!(node = %self.id, worker, "worker exiting");
    }

    async fn gossip_loop(&self) {
        let mut shutdown = self.shutdown.subscribe();
        let period = self.config.gossip_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    self.gossip_tick().await;
                }
            }
        }
        tracing::debug!(node = %self.id, "gossiper exiting");
    }

    async fn pump_loop(&self) {
        while let Some(message) = self.inbox.pop().await {
            self.dispatch(message);
        }
        tracing::debug!(node = %self.id, "pump exiting");
    }

    fn dispatch(&self, message: Message) {
        match message {
            Message::LoadUpdate { sender, depth } => {
                tracing::trace!(node = %self.id, peer = %sender, depth, "load update");
                self.view.observe(sender, depth);
            }
            Message::TaskTransfer { sender, task, .. } => {
                self.log.node_event(
                    self.id,
                    &format!("Received task {} from node {}", task.id(), sender),
                );
                self.add_task(task);
            }
            Message::PeerDiscovery { sender } => {
                self.add_peer(sender);
            }
            Message::TaskRequest { sender, .. } => {
                // Pull-based stealing is a reserved extension.
                tracing::trace!(node = %self.id, peer = %sender, "task request ignored");
            }
        }
    }

    /// Attempt to shed the oldest queued task to the cheapest known peer.
    ///
    /// The task is never lost: with no strictly cheaper peer, or when
    /// delivery fails, it goes back to the tail of the local queue.
    async fn offload_one(&self, depth: usize) {
        let Some(task) = self.tasks.try_pop() else {
            return;
        };
        let Some(peer) = self.view.pick_cheaper_than(depth) else {
            self.requeue(task);
            return;
        };
        let message = Message::task_transfer(self.id, peer, Arc::clone(&task));
        match self.transport.unicast(message).await {
            Ok(()) => {
                self.log.node_event(
                    self.id,
                    &format!("Offloaded task {} to node {}", task.id(), peer),
                );
            }
            Err(err) => {
                tracing::info!(
                    node = %self.id,
                    peer = %peer,
                    error = %err,
                    "offload failed, requeueing task"
                );
                self.requeue(task);
            }
        }
    }

    fn requeue(&self, task: Arc<Task>) {
        if !self.tasks.push(task) {
            tracing::debug!(node = %self.id, "queue closed during offload, task discarded");
        }
    }

    fn lock_peers(&self) -> std::sync::MutexGuard<'_, Vec<NodeId>> {
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_units(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.units.lock().unwrap_or_else(|e| e.into_inner())
    }
}
