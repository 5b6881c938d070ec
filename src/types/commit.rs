//! The commit value type and its tree entries.
//!
//! A [`Commit`] is an immutable snapshot: identity lives in the
//! content-addressed [`NodeId`] the store assigns, never in the value itself.
//! All rewriting state during a push-rebase is kept in session-owned tables,
//! so these types carry no back-pointers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{NodeId, RepoPath};

/// Link/executable flags recorded per tree entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFlags {
    /// Entry is a symlink.
    pub link: bool,
    /// Entry has the executable bit set.
    pub exec: bool,
}

impl FileFlags {
    pub fn plain() -> Self {
        FileFlags::default()
    }
}

/// One entry in a commit's tree: content id, flags and optional copy source.
///
/// Byte content is stored host-side under `content`; grafting carries the
/// entry over verbatim, so the content id, flags and copy source of a
/// rewritten commit are identical to the original's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Content hash of the file's bytes in the host's blob store.
    pub content: NodeId,
    pub flags: FileFlags,
    /// Path this file was copied/renamed from, if recorded. Not remapped by
    /// grafting.
    pub copy_from: Option<RepoPath>,
}

impl FileEntry {
    pub fn new(content: NodeId) -> Self {
        FileEntry {
            content,
            flags: FileFlags::plain(),
            copy_from: None,
        }
    }
}

/// Mutability phase of a commit, by host policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Published: immutable, never eligible for rebase.
    Public,
    /// Draft: still mutable, eligible for rebase.
    Draft,
}

/// An immutable commit node.
///
/// Holds up to two parent references (either may be [`NodeId::NULL`]), the
/// author, timestamp, free-form metadata, message, the full tree snapshot
/// (`manifest`) and the changed-file set recorded when the commit was made
/// (`files`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub parents: [NodeId; 2],
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    /// Free-form metadata carried through grafting unchanged.
    pub extra: BTreeMap<String, String>,
    /// Full tree: path -> (content id, flags, copy source).
    pub manifest: BTreeMap<RepoPath, FileEntry>,
    /// Paths this commit changed, recorded at commit time: relative to the
    /// first parent, or for a merge relative to both parents.
    pub files: Vec<RepoPath>,
}

impl Commit {
    /// First parent (may be the null sentinel).
    pub fn p1(&self) -> NodeId {
        self.parents[0]
    }

    /// Second parent (may be the null sentinel).
    pub fn p2(&self) -> NodeId {
        self.parents[1]
    }

    /// Returns true if both parents are non-null.
    pub fn is_merge(&self) -> bool {
        !self.p1().is_null() && !self.p2().is_null()
    }

    /// Returns true if both parents are the null sentinel (a true root).
    pub fn is_root(&self) -> bool {
        self.p1().is_null() && self.p2().is_null()
    }

    /// Non-null parents, in order.
    pub fn parent_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.parents.iter().copied().filter(|p| !p.is_null())
    }

    /// Paths whose manifest entries differ between this commit and `other`.
    ///
    /// A path counts as different if it is present on only one side or if
    /// its entry (content, flags or copy source) differs.
    pub fn manifest_diff<'a>(&'a self, other: &'a Commit) -> Vec<&'a RepoPath> {
        let mut changed = Vec::new();
        for (path, entry) in &self.manifest {
            match other.manifest.get(path) {
                Some(theirs) if theirs == entry => {}
                _ => changed.push(path),
            }
        }
        for path in other.manifest.keys() {
            if !self.manifest.contains_key(path) {
                changed.push(path);
            }
        }
        changed.sort();
        changed.dedup();
        changed
    }
}
