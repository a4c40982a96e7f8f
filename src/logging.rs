//! Injected event/metrics sink.
//!
//! Nodes record their lifecycle events and periodic metrics through a
//! [`LogSink`] capability handed to them at construction, so tests can
//! capture output in memory while the simulation appends to a file. This
//! sink is the system's byproduct of record; ambient diagnostics go
//! through `tracing` and are configured by the driver, not here.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::mesh::NodeId;

/// Thread-safe append-only sink for simulation events.
pub trait LogSink: Send + Sync {
    /// Append one line. Implementations never propagate I/O failures.
    fn log(&self, message: &str);

    /// A node lifecycle event: `Node[id] <event>`.
    fn node_event(&self, node: NodeId, event: &str) {
        self.log(&format!("Node[{}] {}", node, event));
    }

    /// A periodic metrics record: `Node[id] Load=<d> TasksProcessed=<p>`.
    fn metrics(&self, node: NodeId, depth: usize, processed: u64) {
        self.log(&format!(
            "Node[{}] Load={} TasksProcessed={}",
            node, depth, processed
        ));
    }
}

/// Local-time timestamp with millisecond precision.
fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

enum Output {
    File(File),
    Stdout,
}

/// File-or-stdout sink used by the simulation driver.
///
/// When a log file is configured and opens, lines are appended there;
/// otherwise they go to stdout. The first open or write failure is
/// reported once on stderr and the sink degrades to stdout for the rest
/// of the run.
pub struct SimLog {
    out: Mutex<Output>,
}

impl SimLog {
    /// Sink writing to stdout.
    pub fn stdout() -> Self {
        Self {
            out: Mutex::new(Output::Stdout),
        }
    }

    /// Sink appending to `path`, degrading to stdout if the file cannot
    /// be opened.
    pub fn to_file(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                out: Mutex::new(Output::File(file)),
            },
            Err(err) => {
                eprintln!(
                    "hivemesh: cannot open log file {}: {}; logging to stdout",
                    path.display(),
                    err
                );
                Self::stdout()
            }
        }
    }
}

impl LogSink for SimLog {
    fn log(&self, message: &str) {
        let line = format!("[{}] {}", timestamp(), message);
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Output::File(file) = &mut *out {
            match writeln!(file, "{}", line) {
                Ok(()) => return,
                Err(err) => {
                    eprintln!("hivemesh: log write failed: {}; logging to stdout", err);
                    *out = Output::Stdout;
                }
            }
        }
        println!("{}", line);
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines recorded so far, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl LogSink for MemoryLog {
    fn log(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_event_line_shape() {
        let log = MemoryLog::new();
        log.node_event(NodeId::new(2), "Starting node");
        assert_eq!(log.lines(), vec!["Node[2] Starting node"]);
    }

    #[test]
    fn metrics_line_shape() {
        let log = MemoryLog::new();
        log.metrics(NodeId::new(0), 7, 42);
        assert_eq!(log.lines(), vec!["Node[0] Load=7 TasksProcessed=42"]);
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = timestamp();
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(ts.len(), 23);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[19..20], ".");
        assert!(ts[20..].chars().all(|c| c.is_ascii_digit()));
    }
}
