//! Pushback reply construction.
//!
//! After a successful rebase the client's local chain is stale: the server
//! kept rewritten copies. When the client declared its common heads and
//! advertised the pushback capability, the reply carries exactly the commits
//! the client is missing, plus the equivalence markers covering them, so one
//! round trip leaves both sides in sync. Without both preconditions the
//! reply is empty and the client discovers the rewrite on its next pull.

use tracing::debug;

use crate::dag::outgoing;
use crate::protocol::{CapabilitySet, ReplyPart};
use crate::store::{MemoryStore, ReadStore};
use crate::types::NodeId;

/// Builds the reply parts for a completed rebase.
///
/// Reads the committed store state, so call this after the transaction has
/// published. `rewritten` holds the new-side ids of the replacement table;
/// a push that rewrote nothing (a fast-forward) gets an empty reply.
pub fn build(
    store: &MemoryStore,
    common_heads: Option<&[NodeId]>,
    caps: &CapabilitySet,
    rewritten: &[NodeId],
) -> Vec<ReplyPart> {
    let common_heads = match common_heads {
        Some(heads) if caps.supports_pushback() => heads,
        _ => {
            debug!("no pushback: missing common heads or capability");
            return Vec::new();
        }
    };

    let missing = outgoing(store, common_heads, rewritten);
    if missing.is_empty() {
        debug!("nothing was rewritten that the client lacks, empty reply");
        return Vec::new();
    }

    let commits = missing
        .iter()
        .map(|node| {
            let commit = store.get(node).expect("outgoing nodes are stored").clone();
            (*node, commit)
        })
        .collect();

    let mut parts = vec![ReplyPart::ChangeGroup(commits)];

    let relevant: Vec<(NodeId, NodeId)> = store
        .markers()
        .iter()
        .filter(|(_, new)| missing.contains(new))
        .copied()
        .collect();
    if !relevant.is_empty() {
        parts.push(ReplyPart::ObsolescenceMarkers(relevant));
    }

    debug!(commits = missing.len(), "built pushback reply");
    parts
}
