use crate::key::Key;
use crate::node::node_data::NodeData;
use crate::KEY_BITS;

/// A single finger-table row: the best known successor of `start`.
#[derive(Clone, Debug)]
pub struct FingerEntry {
    pub start: Key,
    pub node: NodeData,
}

/// A node's finger table.
///
/// Row `i` covers `start_i = (local + 2^i) mod 2^KEY_BITS` and holds the best
/// known successor of `start_i`. Row 0 always mirrors the node's successor.
/// The table is plain data; the owning node guards it together with the
/// successor and predecessor pointers under a single lock so a row fix and a
/// routing read never interleave on inconsistent rows.
#[derive(Clone, Debug)]
pub struct FingerTable {
    entries: Vec<FingerEntry>,
}

impl FingerTable {
    /// Constructs a finger table with every row pointing at the local node
    /// itself, the state of a founding node before any lookup refined it.
    pub fn new(local: &NodeData) -> Self {
        let entries = (0..KEY_BITS)
            .map(|i| FingerEntry {
                start: local.id.finger_start(i),
                node: local.clone(),
            })
            .collect();
        FingerTable { entries }
    }

    /// Returns the node's successor: row 0's node.
    pub fn successor(&self) -> &NodeData {
        &self.entries[0].node
    }

    /// Points row 0 at `node`. The caller updates its successor pointer under
    /// the same lock acquisition.
    pub fn set_successor(&mut self, node: NodeData) {
        self.entries[0].node = node;
    }

    /// Returns the start identifier of row `i`.
    pub fn start(&self, i: usize) -> &Key {
        &self.entries[i].start
    }

    /// Returns the node stored in row `i`.
    pub fn node_at(&self, i: usize) -> &NodeData {
        &self.entries[i].node
    }

    /// Stores `node` in row `i`.
    pub fn set_node(&mut self, i: usize, node: NodeData) {
        self.entries[i].node = node;
    }

    /// Returns the number of rows in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the closest preceding finger for `target`: scanning from the
    /// highest row down, the first node whose id lies in the open arc
    /// `(local, target)`. The scan stops at that first match; it is the
    /// highest-index hint and continuing past it would forfeit the logarithmic
    /// hop bound. Returns `None` when no row precedes the target.
    pub fn closest_preceding_node(&self, local: &Key, target: &Key) -> Option<&NodeData> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.node.id.is_between(local, target))
            .map(|entry| &entry.node)
    }

    /// Returns a copy of every row, for diagnostics.
    pub fn entries(&self) -> Vec<FingerEntry> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::FingerTable;
    use crate::key::Key;
    use crate::node::node_data::NodeData;
    use crate::{KEY_BITS, KEY_LENGTH};

    fn node(id: u8) -> NodeData {
        let mut bytes = [0u8; KEY_LENGTH];
        bytes[KEY_LENGTH - 1] = id;
        NodeData {
            id: Key::new(bytes),
            addr: format!("127.0.0.1:{}", 9000 + u16::from(id)),
        }
    }

    #[test]
    fn test_new_table_points_at_self() {
        let local = node(10);
        let table = FingerTable::new(&local);
        assert_eq!(table.len(), KEY_BITS);
        for i in 0..table.len() {
            assert_eq!(*table.start(i), local.id.finger_start(i));
            assert_eq!(*table.node_at(i), local);
        }
        assert_eq!(*table.successor(), local);
    }

    #[test]
    fn test_set_successor_updates_row_zero() {
        let local = node(10);
        let mut table = FingerTable::new(&local);
        table.set_successor(node(42));
        assert_eq!(*table.successor(), node(42));
        assert_eq!(*table.node_at(0), node(42));
    }

    #[test]
    fn test_closest_preceding_stops_at_highest_match() {
        let local = node(0);
        let mut table = FingerTable::new(&local);
        // rows 0..3 hold progressively further nodes; both 10 and 60 precede
        // the target 100, and the scan must pick the higher row's 60
        table.set_node(0, node(10));
        table.set_node(1, node(10));
        table.set_node(2, node(60));
        table.set_node(3, node(120));

        let hint = table.closest_preceding_node(&local.id, &node(100).id);
        assert_eq!(hint, Some(&node(60)));
    }

    #[test]
    fn test_closest_preceding_none_when_no_row_precedes() {
        let local = node(0);
        let table = FingerTable::new(&local);
        // every row is the local node itself, which never lies in (local, t)
        assert_eq!(table.closest_preceding_node(&local.id, &node(100).id), None);
    }

    #[test]
    fn test_closest_preceding_wrapped_target() {
        let local = node(200);
        let mut table = FingerTable::new(&local);
        table.set_node(1, node(250));
        table.set_node(4, node(30));

        // target 50 lies across zero from 200; 30 is the closest preceding
        let hint = table.closest_preceding_node(&local.id, &node(50).id);
        assert_eq!(hint, Some(&node(30)));
    }
}
