//! Simulation driver.
//!
//! Builds a fully connected mesh of nodes, feeds it a stream of random
//! tasks, reports aggregate progress once a second, and shuts everything
//! down cleanly. Exit code 0 on clean completion; configuration errors
//! exit nonzero before any node starts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use hivemesh::config::SimConfig;
use hivemesh::logging::{LogSink, SimLog};
use hivemesh::mesh::{InMemoryTransport, NodeId, PeerNode, Transport};
use hivemesh::task::Task;

#[derive(Parser)]
#[command(name = "hivemesh", about = "Decentralized load balancer simulation")]
struct Cli {
    /// Number of nodes in the mesh
    #[arg(long, default_value_t = 5, env = "HIVEMESH_NODES")]
    nodes: usize,

    /// Queue depth above which a node sheds work
    #[arg(long, default_value_t = 10, env = "HIVEMESH_LOAD_THRESHOLD")]
    load_threshold: usize,

    /// Simulation duration in seconds
    #[arg(long, default_value_t = 30, env = "HIVEMESH_SIM_DURATION_SECS")]
    sim_duration_secs: u64,

    /// Interval between generated tasks in milliseconds
    #[arg(long, default_value_t = 100, env = "HIVEMESH_TASK_INTERVAL_MS")]
    task_interval_ms: u64,

    /// Minimum simulated task cost in milliseconds
    #[arg(long, default_value_t = 50, env = "HIVEMESH_MIN_COST_MS")]
    min_cost_ms: u64,

    /// Maximum simulated task cost in milliseconds
    #[arg(long, default_value_t = 200, env = "HIVEMESH_MAX_COST_MS")]
    max_cost_ms: u64,

    /// Gossip/offload period in milliseconds
    #[arg(long, default_value_t = 500, env = "HIVEMESH_GOSSIP_INTERVAL_MS")]
    gossip_interval_ms: u64,

    /// Worker count per node
    #[arg(long, default_value_t = 2, env = "HIVEMESH_WORKERS")]
    workers: usize,

    /// Append the event log to this file instead of stdout
    #[arg(long, env = "HIVEMESH_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> SimConfig {
        SimConfig {
            num_nodes: self.nodes,
            load_threshold: self.load_threshold,
            sim_duration: Duration::from_secs(self.sim_duration_secs),
            task_interval: Duration::from_millis(self.task_interval_ms),
            min_cost_ms: self.min_cost_ms,
            max_cost_ms: self.max_cost_ms,
            gossip_interval: Duration::from_millis(self.gossip_interval_ms),
            workers_per_node: self.workers,
            log_file: self.log_file,
        }
    }
}

#[derive(Serialize)]
struct NodeSummary {
    node: u32,
    processed: u64,
    remaining: usize,
}

#[derive(Serialize)]
struct SimSummary {
    generated: u64,
    processed: u64,
    remaining: u64,
    nodes: Vec<NodeSummary>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Cli::parse().into_config();
    if let Err(err) = config.validate() {
        eprintln!("hivemesh: {}", err);
        std::process::exit(2);
    }

    run(config).await;
}

async fn run(config: SimConfig) {
    let log: Arc<dyn LogSink> = match &config.log_file {
        Some(path) => Arc::new(SimLog::to_file(path)),
        None => Arc::new(SimLog::stdout()),
    };

    tracing::info!(
        nodes = config.num_nodes,
        load_threshold = config.load_threshold,
        duration_secs = config.sim_duration.as_secs(),
        gossip_interval_ms = config.gossip_interval.as_millis() as u64,
        "starting load balancer simulation"
    );
    log.log("=== Simulation Started ===");

    let transport = Arc::new(InMemoryTransport::new());
    let node_config = config.node_config();

    // Build the mesh: register every node, then make it fully connected.
    let nodes: Vec<Arc<PeerNode>> = (0..config.num_nodes as u32)
        .map(|id| {
            let node = Arc::new(PeerNode::new(
                NodeId::new(id),
                node_config.clone(),
                Arc::clone(&transport) as Arc<dyn Transport>,
                Arc::clone(&log),
            ));
            transport.register(node.id(), node.inbox_handle());
            node
        })
        .collect();
    for node in &nodes {
        for peer in &nodes {
            if peer.id() != node.id() {
                node.add_peer(peer.id());
            }
        }
    }

    for node in &nodes {
        node.start();
    }
    tracing::info!(nodes = nodes.len(), "all nodes started");

    // Task generator: one task per interval, random target and cost.
    let generated = Arc::new(AtomicU64::new(0));
    let (stop_generating, mut generating) = watch::channel(false);
    let generator = {
        let nodes = nodes.clone();
        let generated = Arc::clone(&generated);
        let interval = config.task_interval;
        let (min_cost, max_cost) = (config.min_cost_ms, config.max_cost_ms);
        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = generating.changed() => break,
                    _ = ticker.tick() => {
                        let id = generated.fetch_add(1, Ordering::Relaxed);
                        let cost = rng.gen_range(min_cost..=max_cost);
                        let target = rng.gen_range(0..nodes.len());
                        nodes[target].add_task(Arc::new(Task::new(id, cost)));
                    }
                }
            }
        })
    };

    // Per-second aggregate progress for the duration of the run.
    for second in 1..=config.sim_duration.as_secs() {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let total_queued: usize = nodes.iter().map(|n| n.current_load()).sum();
        let total_processed: u64 = nodes.iter().map(|n| n.tasks_processed()).sum();
        tracing::info!(second, total_queued, total_processed, "progress");
    }

    let _ = stop_generating.send(true);
    if let Err(err) = generator.await {
        tracing::warn!(error = %err, "task generator terminated abnormally");
    }

    // Let the mesh drain what it can before the books are closed.
    tracing::info!("task generation stopped, draining remaining tasks");
    tokio::time::sleep(Duration::from_secs(3)).await;

    let summary = SimSummary {
        generated: generated.load(Ordering::Relaxed),
        processed: nodes.iter().map(|n| n.tasks_processed()).sum(),
        remaining: nodes.iter().map(|n| n.current_load() as u64).sum(),
        nodes: nodes
            .iter()
            .map(|n| NodeSummary {
                node: n.id().raw(),
                processed: n.tasks_processed(),
                remaining: n.current_load(),
            })
            .collect(),
    };

    log.log("=== Final Statistics ===");
    log.log(&format!("Total tasks generated: {}", summary.generated));
    log.log(&format!("Total tasks processed: {}", summary.processed));
    log.log(&format!("Total tasks remaining: {}", summary.remaining));
    for node in &summary.nodes {
        log.log(&format!(
            "Node {}: Processed={}, Remaining={}",
            node.node, node.processed, node.remaining
        ));
    }

    for node in &nodes {
        node.stop().await;
    }
    log.log("=== Simulation Completed ===");

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(err) => tracing::warn!(error = %err, "failed to serialize summary"),
    }
    tracing::info!(
        generated = summary.generated,
        processed = summary.processed,
        remaining = summary.remaining,
        "simulation completed"
    );
}
