//! Equivalence recording between original and rewritten commits.
//!
//! When the host tracks successor edges, every rewritten commit gets an
//! old -> new marker so clients can migrate their local state instead of
//! seeing duplicate history. Hosts without such tracking simply skip this;
//! the rewrite itself is unaffected.

use std::collections::BTreeMap;

use tracing::debug;

use crate::store::Transaction;
use crate::types::NodeId;

/// Records one marker per rewritten commit inside the open transaction.
///
/// Identity entries never reach this function: `replacements` holds only
/// pairs whose old and new ids differ.
pub fn record(txn: &mut Transaction<'_>, replacements: &BTreeMap<NodeId, NodeId>) {
    if !txn.obsolescence_enabled() {
        debug!("host does not track equivalence, skipping markers");
        return;
    }
    for (old, new) in replacements {
        txn.add_marker(*old, *new);
    }
    debug!(count = replacements.len(), "recorded equivalence markers");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ReadStore};
    use crate::test_utils::commit_value;

    fn two_nodes(store: &mut MemoryStore) -> (NodeId, NodeId) {
        let a = store.append(commit_value([NodeId::NULL, NodeId::NULL], &["a"]));
        let b = store.append(commit_value([NodeId::NULL, NodeId::NULL], &["b"]));
        (a, b)
    }

    #[test]
    fn markers_recorded_and_visible_after_commit() {
        let mut store = MemoryStore::new();
        let (old, new) = two_nodes(&mut store);
        let mut txn = store.transaction();
        record(&mut txn, &BTreeMap::from([(old, new)]));
        txn.commit();
        assert_eq!(store.markers(), &[(old, new)]);
        assert!(store.is_obsolete(&old));
        assert!(!store.is_obsolete(&new));
    }

    #[test]
    fn skipped_when_host_does_not_track() {
        let mut store = MemoryStore::without_obsolescence();
        let (old, new) = two_nodes(&mut store);
        let mut txn = store.transaction();
        record(&mut txn, &BTreeMap::from([(old, new)]));
        txn.commit();
        assert!(store.markers().is_empty());
        assert!(!store.is_obsolete(&old));
    }

    #[test]
    fn empty_replacement_set_records_nothing() {
        let mut store = MemoryStore::new();
        let mut txn = store.transaction();
        record(&mut txn, &BTreeMap::new());
        txn.commit();
        assert!(store.markers().is_empty());
    }
}
