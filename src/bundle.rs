//! Staging of the pushed change-group payload.
//!
//! The raw payload is spooled to a temporary file before decoding, mirroring
//! how the incoming bytes would be materialized for tree inspection against
//! a real store. The spool file is a scoped resource: [`StagedBundle`] owns
//! it and the file is removed on every exit path, success or abort, when the
//! value drops.
//!
//! Decoding yields an [`IncomingSet`], the topologically ordered commit
//! chain, and a [`BundleOverlay`] lets ancestry queries see those commits on
//! top of the store without mutating it.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use tempfile::NamedTempFile;

use crate::error::RebaseError;
use crate::store::ReadStore;
use crate::types::{Commit, NodeId, Phase};

/// Encodes a change group as its staged representation.
///
/// Wire framing proper is the transport's concern; this is the form the
/// payload takes once extracted from the rebase-request part.
pub fn encode_change_group(entries: &[(NodeId, Commit)]) -> Vec<u8> {
    serde_json::to_vec(entries).expect("change group serialization cannot fail")
}

/// The pushed payload, spooled to a temporary file.
pub struct StagedBundle {
    spool: NamedTempFile,
}

impl StagedBundle {
    /// Writes the raw payload to a fresh spool file.
    pub fn materialize(payload: &[u8]) -> Result<StagedBundle, RebaseError> {
        let mut spool = NamedTempFile::new().map_err(|e| RebaseError::StagingFailed {
            reason: e.to_string(),
        })?;
        spool
            .write_all(payload)
            .and_then(|_| spool.flush())
            .map_err(|e| RebaseError::StagingFailed {
                reason: e.to_string(),
            })?;
        Ok(StagedBundle { spool })
    }

    /// Decodes the spooled payload into a topologically ordered commit set.
    pub fn decode(&self) -> Result<IncomingSet, RebaseError> {
        let bytes = std::fs::read(self.spool.path()).map_err(|e| RebaseError::StagingFailed {
            reason: e.to_string(),
        })?;
        let entries: Vec<(NodeId, Commit)> =
            serde_json::from_slice(&bytes).map_err(|e| RebaseError::MalformedChangeGroup {
                reason: e.to_string(),
            })?;
        IncomingSet::new(entries)
    }

    /// Path of the spool file (exists only while the bundle is alive).
    pub fn path(&self) -> &std::path::Path {
        self.spool.path()
    }
}

/// The ordered sequence of commits extracted from the pushed payload.
///
/// Commits are held in topological order: every commit's in-set parents
/// precede it. Order among independent commits is stable with respect to the
/// payload.
#[derive(Debug, Clone)]
pub struct IncomingSet {
    commits: Vec<(NodeId, Commit)>,
    index: HashMap<NodeId, usize>,
}

impl IncomingSet {
    /// Builds the set, re-sorting entries topologically.
    ///
    /// Duplicate ids, a null id, or a parent cycle make the payload
    /// malformed.
    pub fn new(entries: Vec<(NodeId, Commit)>) -> Result<IncomingSet, RebaseError> {
        let mut ids = HashSet::new();
        for (id, _) in &entries {
            if id.is_null() {
                return Err(RebaseError::MalformedChangeGroup {
                    reason: "null commit id".to_string(),
                });
            }
            if !ids.insert(*id) {
                return Err(RebaseError::MalformedChangeGroup {
                    reason: format!("duplicate commit {id}"),
                });
            }
        }

        // Kahn's algorithm, taking the earliest eligible payload entry each
        // round to keep the payload order stable.
        let mut remaining: Vec<Option<(NodeId, Commit)>> = entries.into_iter().map(Some).collect();
        let mut emitted: HashSet<NodeId> = HashSet::new();
        let mut commits = Vec::with_capacity(remaining.len());
        loop {
            let mut progressed = false;
            for slot in remaining.iter_mut() {
                let ready = match slot {
                    Some((_, commit)) => commit
                        .parent_nodes()
                        .all(|p| !ids.contains(&p) || emitted.contains(&p)),
                    None => false,
                };
                if ready {
                    let (id, commit) = slot.take().expect("checked above");
                    emitted.insert(id);
                    commits.push((id, commit));
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        if remaining.iter().any(Option::is_some) {
            return Err(RebaseError::MalformedChangeGroup {
                reason: "parent cycle in change group".to_string(),
            });
        }

        let index = commits
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i))
            .collect();
        Ok(IncomingSet { commits, index })
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.index.contains_key(node)
    }

    pub fn get(&self, node: &NodeId) -> Option<&Commit> {
        self.index.get(node).map(|i| &self.commits[*i].1)
    }

    /// Commits in topological order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Commit)> {
        self.commits.iter().map(|(id, c)| (*id, c))
    }

    /// Members no other member lists as a parent.
    pub fn heads(&self) -> Vec<NodeId> {
        let referenced: HashSet<NodeId> = self
            .commits
            .iter()
            .flat_map(|(_, c)| c.parent_nodes())
            .collect();
        self.commits
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !referenced.contains(id))
            .collect()
    }

    /// Non-null parents of members that are not themselves members,
    /// deduplicated, in first-appearance order.
    pub fn outside_parents(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (_, commit) in &self.commits {
            for p in commit.parent_nodes() {
                if !self.contains(&p) && seen.insert(p) {
                    out.push(p);
                }
            }
        }
        out
    }
}

/// Read view of a store with an incoming set layered on top.
///
/// Incoming commits get local revisions above every store revision, matching
/// how a staged bundle would be numbered if applied.
pub struct BundleOverlay<'a, S> {
    base: &'a S,
    incoming: &'a IncomingSet,
}

impl<'a, S: ReadStore> BundleOverlay<'a, S> {
    pub fn new(base: &'a S, incoming: &'a IncomingSet) -> Self {
        BundleOverlay { base, incoming }
    }
}

impl<S: ReadStore> ReadStore for BundleOverlay<'_, S> {
    fn get(&self, node: &NodeId) -> Option<&Commit> {
        self.incoming.get(node).or_else(|| self.base.get(node))
    }

    fn local_rev(&self, node: &NodeId) -> Option<u64> {
        if let Some(i) = self.incoming.index.get(node) {
            return Some(self.base.rev_count() + *i as u64);
        }
        self.base.local_rev(node)
    }

    fn rev_count(&self) -> u64 {
        self.base.rev_count() + self.incoming.len() as u64
    }

    fn phase(&self, node: &NodeId) -> Phase {
        // A staged commit the store already knows keeps its recorded phase;
        // genuinely new commits are drafts until the session decides
        // otherwise.
        if self.base.contains(node) {
            self.base.phase(node)
        } else {
            Phase::Draft
        }
    }

    fn is_obsolete(&self, node: &NodeId) -> bool {
        self.base.is_obsolete(node)
    }
}
