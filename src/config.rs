//! Simulation configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::mesh::NodeConfig;

/// Knobs for one simulation run.
///
/// Defaults match a small interactive run: five nodes gossiping every
/// 500 ms, tasks of 50 to 200 ms arriving every 100 ms for 30 seconds.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub num_nodes: usize,
    pub load_threshold: usize,
    pub sim_duration: Duration,
    pub task_interval: Duration,
    pub min_cost_ms: u64,
    pub max_cost_ms: u64,
    pub gossip_interval: Duration,
    pub workers_per_node: usize,
    /// Append the event log here; `None` logs to stdout.
    pub log_file: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_nodes: 5,
            load_threshold: 10,
            sim_duration: Duration::from_secs(30),
            task_interval: Duration::from_millis(100),
            min_cost_ms: 50,
            max_cost_ms: 200,
            gossip_interval: Duration::from_millis(500),
            workers_per_node: 2,
            log_file: None,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_nodes == 0 {
            return Err(ConfigError::invalid("num_nodes", "must be at least 1"));
        }
        if self.load_threshold == 0 {
            return Err(ConfigError::invalid("load_threshold", "must be at least 1"));
        }
        if self.workers_per_node == 0 {
            return Err(ConfigError::invalid(
                "workers_per_node",
                "must be at least 1",
            ));
        }
        if self.min_cost_ms > self.max_cost_ms {
            return Err(ConfigError::invalid(
                "min_cost_ms",
                format!(
                    "must not exceed max_cost_ms ({} > {})",
                    self.min_cost_ms, self.max_cost_ms
                ),
            ));
        }
        if self.task_interval.is_zero() {
            return Err(ConfigError::invalid("task_interval", "must be non-zero"));
        }
        if self.gossip_interval.is_zero() {
            return Err(ConfigError::invalid("gossip_interval", "must be non-zero"));
        }
        Ok(())
    }

    /// The per-node configuration derived from this run.
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            load_threshold: self.load_threshold,
            workers: self.workers_per_node,
            gossip_interval: self.gossip_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_nodes_rejected() {
        let config = SimConfig {
            num_nodes: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_cost_range_rejected() {
        let config = SimConfig {
            min_cost_ms: 300,
            max_cost_ms: 200,
            ..SimConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_cost_ms"));
    }

    #[test]
    fn zero_threshold_rejected() {
        let config = SimConfig {
            load_threshold: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
