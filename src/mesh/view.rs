//! Last-known peer load tracking (gossip protocol state).

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::protocol::NodeId;

/// A node's advisory view of its peers' queue depths.
///
/// Entries are upserted from incoming `LoadUpdate`s and never removed, so
/// every value is at most one gossip period fresh and arbitrarily stale.
/// Routing decisions made over this view are best-effort by design.
#[derive(Debug, Default)]
pub struct PeerView {
    // BTreeMap keeps iteration in ascending id order, which makes the
    // tie-break in `pick_cheaper_than` deterministic.
    loads: Mutex<BTreeMap<NodeId, usize>>,
}

impl PeerView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the most recent advertised depth for a peer.
    pub fn observe(&self, peer: NodeId, depth: usize) {
        self.lock().insert(peer, depth);
    }

    /// The peer with the minimum recorded depth strictly below `my_depth`.
    ///
    /// Ties are broken by the smallest peer id. Returns `None` when the
    /// view is empty or no peer is cheaper; the caller then keeps the
    /// work local rather than making the imbalance worse.
    pub fn pick_cheaper_than(&self, my_depth: usize) -> Option<NodeId> {
        let loads = self.lock();
        let mut best: Option<NodeId> = None;
        let mut min_depth = my_depth;
        for (&peer, &depth) in loads.iter() {
            if depth < min_depth {
                min_depth = depth;
                best = Some(peer);
            }
        }
        best
    }

    /// Copy of the current view.
    pub fn snapshot(&self) -> BTreeMap<NodeId, usize> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<NodeId, usize>> {
        self.loads.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_upserts() {
        let view = PeerView::new();
        view.observe(NodeId::new(1), 4);
        view.observe(NodeId::new(1), 9);
        assert_eq!(view.snapshot().get(&NodeId::new(1)), Some(&9));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn empty_view_yields_absence() {
        let view = PeerView::new();
        assert_eq!(view.pick_cheaper_than(10), None);
    }

    #[test]
    fn only_strictly_cheaper_peers_qualify() {
        let view = PeerView::new();
        view.observe(NodeId::new(1), 5);
        view.observe(NodeId::new(2), 7);
        // Equal depth does not qualify; nothing below 5 exists.
        assert_eq!(view.pick_cheaper_than(5), None);
        assert_eq!(view.pick_cheaper_than(6), Some(NodeId::new(1)));
    }

    #[test]
    fn ties_break_toward_smallest_id() {
        let view = PeerView::new();
        view.observe(NodeId::new(2), 0);
        view.observe(NodeId::new(1), 0);
        view.observe(NodeId::new(3), 2);
        assert_eq!(view.pick_cheaper_than(5), Some(NodeId::new(1)));
    }

    #[test]
    fn picks_global_minimum() {
        let view = PeerView::new();
        view.observe(NodeId::new(1), 4);
        view.observe(NodeId::new(2), 1);
        view.observe(NodeId::new(3), 3);
        assert_eq!(view.pick_cheaper_than(5), Some(NodeId::new(2)));
    }
}
