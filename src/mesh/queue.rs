//! Closeable FIFO with async blocking pop.
//!
//! One structure backs both per-node queues: the task queue
//! (producer-consumer between `add_task` callers and the worker pool) and
//! the message inbox (between the transport and the pump). `close()` is
//! the single shutdown signal: it wakes every blocked `pop` with absence
//! and rejects further pushes.
//!
//! Items still queued at close time are deliberately not handed out:
//! stopping a node discards its backlog, and `len()` keeps counting the
//! leftovers so the caller can account for them.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Mutex;

use tokio::sync::Notify;

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A FIFO shared between producers and async consumers.
pub struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

/// The per-node task queue.
pub type TaskQueue = WorkQueue<std::sync::Arc<crate::task::Task>>;

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append an item and wake one waiting consumer.
    ///
    /// Returns `false` (dropping the item) once the queue is closed.
    pub fn push(&self, item: T) -> bool {
        {
            let mut inner = self.lock();
            if inner.closed {
                return false;
            }
            inner.items.push_back(item);
        }
        self.notify.notify_one();
        true
    }

    /// Remove the head without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Wait until an item is available and remove it.
    ///
    /// Returns `None` once the queue has been closed; consumers treat that
    /// as the shutdown signal and exit.
    pub async fn pop(&self) -> Option<T> {
        loop {
            // Register for wakeups before inspecting state, so a push or
            // close between the check and the await cannot be lost.
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
            }
            notified.await;
        }
    }

    /// Instantaneous item count, including items stranded by `close()`.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Close the queue and wake every blocked `pop` with absence.
    /// Idempotent. Queued items stay in place but are no longer handed out.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        // The mutex is only ever held for queue bookkeeping, never across
        // an await, so a poisoning panic cannot leave the state torn.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::WorkQueue;

    #[tokio::test]
    async fn pop_preserves_fifo_order() {
        let queue = WorkQueue::new();
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(queue.push(3));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.try_pop(), Some(3));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        queue.push(7u32);
        assert_eq!(waiter.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn close_wakes_all_waiters_with_absence() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.pop().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn close_strands_queued_items() {
        let queue = WorkQueue::new();
        queue.push(1u32);
        queue.push(2u32);
        queue.close();
        // Consumers see absence, but the leftovers remain countable.
        assert_eq!(queue.pop().await, None);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn push_after_close_is_rejected() {
        let queue = WorkQueue::new();
        queue.close();
        assert!(!queue.push(1u32));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let queue: WorkQueue<u32> = WorkQueue::new();
        queue.close();
        queue.close();
        assert!(queue.is_closed());
    }
}
