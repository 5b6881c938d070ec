//! The storage seam between the rebase engine and the host repository.
//!
//! The engine only ever reads commits through the [`ReadStore`] trait; the
//! concrete store, its hash scheme and its persistence are the host's
//! business. [`memory::MemoryStore`] is the reference implementation used by
//! the session tests and by embedders that want a self-contained repository.

pub mod memory;

pub use memory::{MemoryStore, Transaction};

use crate::error::RebaseError;
use crate::types::{Commit, NodeId, Phase};

/// Read access to a set of commits.
///
/// Implemented by the store itself, by an open [`Transaction`] (which sees
/// its own buffered appends) and by [`crate::bundle::BundleOverlay`] (which
/// sees staged incoming commits on top of the store).
pub trait ReadStore {
    /// Looks up a commit by node id. The null sentinel is never present.
    fn get(&self, node: &NodeId) -> Option<&Commit>;

    /// The insertion index the store assigned to `node`, if present.
    ///
    /// Later commits have higher indices; the resolver uses this to pick the
    /// "most recent" of a set of candidate ancestors.
    fn local_rev(&self, node: &NodeId) -> Option<u64>;

    /// One past the highest local revision; overlays number their layered
    /// commits starting here.
    fn rev_count(&self) -> u64;

    /// The phase recorded for `node`. Unknown nodes are draft.
    fn phase(&self, node: &NodeId) -> Phase;

    /// Whether `node` has been superseded by an equivalence marker.
    fn is_obsolete(&self, node: &NodeId) -> bool;

    fn contains(&self, node: &NodeId) -> bool {
        self.get(node).is_some()
    }

    /// Like [`ReadStore::get`], but a missing commit is a hard error.
    fn require(&self, node: &NodeId) -> Result<&Commit, RebaseError> {
        self.get(node).ok_or(RebaseError::UnknownCommit(*node))
    }
}
