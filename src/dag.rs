//! Ancestry queries over a commit store.
//!
//! Pure graph walks; nothing here mutates the store. The walks tolerate
//! nodes the store does not know about (a client may declare common heads
//! the server never had) by treating them as having no parents.

use std::collections::HashSet;

use crate::store::ReadStore;
use crate::types::NodeId;

/// All commits reachable from `heads` (inclusive), walking parent edges.
///
/// The null sentinel and unknown nodes terminate the walk.
pub fn ancestors<S: ReadStore>(store: &S, heads: &[NodeId]) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut queue: Vec<NodeId> = heads.iter().copied().filter(|n| !n.is_null()).collect();
    while let Some(node) = queue.pop() {
        if !seen.insert(node) {
            continue;
        }
        if let Some(commit) = store.get(&node) {
            queue.extend(commit.parent_nodes());
        }
    }
    seen
}

/// Returns true if `anc` is an ancestor of `desc` (or equal to it).
///
/// The null sentinel is an ancestor of everything.
pub fn is_ancestor<S: ReadStore>(store: &S, anc: NodeId, desc: NodeId) -> bool {
    if anc.is_null() {
        return true;
    }
    if anc == desc {
        return true;
    }
    ancestors(store, &[desc]).contains(&anc)
}

/// Commits reachable from `heads` but not from `common_heads`, ordered by
/// local revision (parents before children).
///
/// This is the discovery step behind the pushback payload: it computes
/// exactly what the other side is missing.
pub fn outgoing<S: ReadStore>(
    store: &S,
    common_heads: &[NodeId],
    heads: &[NodeId],
) -> Vec<NodeId> {
    let common = ancestors(store, common_heads);
    let mut missing: Vec<NodeId> = ancestors(store, heads)
        .into_iter()
        .filter(|n| !common.contains(n))
        .collect();
    missing.sort_by_key(|n| store.local_rev(n).unwrap_or(u64::MAX));
    missing
}
