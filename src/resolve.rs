//! Destination and graft-base resolution.
//!
//! Given the staged incoming chain and the (possibly unresolved) destination
//! reference, this module decides what the rebase actually does: nothing
//! (fast-forward), a graft onto a common ancestor, or a disjoint-history
//! import. It is also the sole place conflicts are detected, at the
//! granularity of modified paths; no content merge is ever attempted.

use std::collections::BTreeSet;

use tracing::debug;

use crate::bundle::IncomingSet;
use crate::dag::is_ancestor;
use crate::error::RebaseError;
use crate::store::ReadStore;
use crate::types::{NodeId, RepoPath};
use crate::validate::validate;

/// Outcome of destination resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The effective destination (null when the chain lands nowhere in
    /// existing history).
    pub destination: NodeId,
    /// The commit the incoming chain diverges from; equals `destination` on
    /// a fast-forward, null on a disjoint-history import.
    pub graft_base: NodeId,
    /// True when every incoming commit already descends from the
    /// destination, so no rewriting is needed.
    pub fast_forward: bool,
}

/// Resolves the effective destination and graft base for `incoming`.
///
/// `destination` is the result of looking up the client's reference; `None`
/// means the reference does not exist yet and the fallback rule applies: the
/// most recent commit outside the incoming set that is a parent of one of
/// its members, or null when there is none.
pub fn resolve<S: ReadStore>(
    store: &S,
    incoming: &IncomingSet,
    destination: Option<NodeId>,
) -> Result<Resolution, RebaseError> {
    let destination = destination.unwrap_or_else(|| fallback_destination(store, incoming));

    validate(store, incoming)?;

    // Fast forward: the chain already sits on top of the destination.
    if incoming
        .iter()
        .all(|(node, _)| is_ancestor(store, destination, node))
    {
        debug!(destination = %destination.short(), "fast-forward push, no rebase needed");
        return Ok(Resolution {
            destination,
            graft_base: destination,
            fast_forward: true,
        });
    }

    // The graft base is the most recent outside parent of the incoming set
    // that is also an ancestor of the destination.
    let graft_base = incoming
        .outside_parents()
        .into_iter()
        .filter(|p| is_ancestor(store, *p, destination))
        .max_by_key(|p| store.local_rev(p));

    let graft_base = match graft_base {
        Some(base) => base,
        None => {
            if incoming.outside_parents().is_empty() {
                // No shared history at all: a disjoint-history import is
                // allowed, grafting the chain's root onto the destination.
                debug!(destination = %destination.short(), "disjoint-history import");
                return Ok(Resolution {
                    destination,
                    graft_base: NodeId::NULL,
                    fast_forward: false,
                });
            }
            return Err(RebaseError::UnrelatedHistory { destination });
        }
    };

    let conflicts = conflicting_paths(store, incoming, graft_base, destination)?;
    if !conflicts.is_empty() {
        return Err(RebaseError::ConflictingChanges {
            paths: conflicts.into_iter().collect(),
        });
    }

    debug!(
        destination = %destination.short(),
        graft_base = %graft_base.short(),
        "resolved rebase destination"
    );
    Ok(Resolution {
        destination,
        graft_base,
        fast_forward: false,
    })
}

/// The most recent outside parent of the incoming set, or null.
fn fallback_destination<S: ReadStore>(store: &S, incoming: &IncomingSet) -> NodeId {
    incoming
        .outside_parents()
        .into_iter()
        .max_by_key(|p| store.local_rev(p))
        .unwrap_or(NodeId::NULL)
}

/// Paths touched by the incoming set whose entries differ between the graft
/// base tree and the destination tree.
///
/// `graft_base..destination` is the distance of the rebase, so any path both
/// sides touched shows up here; untouched paths never do.
fn conflicting_paths<S: ReadStore>(
    store: &S,
    incoming: &IncomingSet,
    graft_base: NodeId,
    destination: NodeId,
) -> Result<BTreeSet<RepoPath>, RebaseError> {
    let mut touched: BTreeSet<&RepoPath> = BTreeSet::new();
    for (_, commit) in incoming.iter() {
        touched.extend(commit.files.iter());
    }

    let base = store.require(&graft_base)?;
    let dest = store.require(&destination)?;
    Ok(touched
        .into_iter()
        .filter(|path| base.manifest.get(*path) != dest.manifest.get(*path))
        .cloned()
        .collect())
}
