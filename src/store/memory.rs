//! Content-addressed in-memory repository.
//!
//! [`MemoryStore`] is the reference host: commits are keyed by a SHA-256
//! digest (truncated to the 20-byte wire width) of their serialized value,
//! so appending an identical commit twice yields the same id and creates
//! nothing. [`Transaction`] buffers every write a push session performs
//! (appended commits, phase moves, equivalence markers, bookmark moves) and
//! publishes them atomically on [`Transaction::commit`]; dropping an
//! uncommitted transaction discards all of it, which is the rollback
//! guarantee the session relies on.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::RebaseError;
use crate::store::ReadStore;
use crate::types::{Commit, NodeId, Phase, NODE_ID_LEN};

/// Computes the content-addressed id of a commit value.
fn commit_id(commit: &Commit) -> NodeId {
    // BTreeMap fields serialize in key order, so the encoding is canonical.
    let encoded = serde_json::to_vec(commit).expect("commit serialization cannot fail");
    let digest = Sha256::digest(&encoded);
    let mut bytes = [0u8; NODE_ID_LEN];
    bytes.copy_from_slice(&digest[..NODE_ID_LEN]);
    NodeId(bytes)
}

/// An in-memory content-addressed commit store with refs, phases, blobs and
/// equivalence markers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    commits: HashMap<NodeId, Commit>,
    /// Insertion order; index is the local revision number.
    order: Vec<NodeId>,
    phases: HashMap<NodeId, Phase>,
    bookmarks: HashMap<String, NodeId>,
    blobs: HashMap<NodeId, Bytes>,
    /// old -> new equivalence edges.
    markers: Vec<(NodeId, NodeId)>,
    obsolete: HashSet<NodeId>,
    /// Whether the host tracks equivalence/successor edges at all.
    track_obsolescence: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            track_obsolescence: true,
            ..MemoryStore::default()
        }
    }

    /// A store with equivalence tracking disabled.
    pub fn without_obsolescence() -> Self {
        MemoryStore::default()
    }

    pub fn obsolescence_enabled(&self) -> bool {
        self.track_obsolescence
    }

    /// Appends a commit, returning its content-addressed id.
    ///
    /// Idempotent: an identical commit maps to the same id and is not stored
    /// again.
    pub fn append(&mut self, commit: Commit) -> NodeId {
        let id = commit_id(&commit);
        if !self.commits.contains_key(&id) {
            self.commits.insert(id, commit);
            self.order.push(id);
        }
        id
    }

    /// Stores file content, returning its content id.
    pub fn put_blob(&mut self, data: impl Into<Bytes>) -> NodeId {
        let data = data.into();
        let digest = Sha256::digest(&data);
        let mut bytes = [0u8; NODE_ID_LEN];
        bytes.copy_from_slice(&digest[..NODE_ID_LEN]);
        let id = NodeId(bytes);
        self.blobs.insert(id, data);
        id
    }

    pub fn get_blob(&self, id: &NodeId) -> Option<&Bytes> {
        self.blobs.get(id)
    }

    pub fn set_phase(&mut self, node: NodeId, phase: Phase) {
        self.phases.insert(node, phase);
    }

    pub fn set_bookmark(&mut self, name: impl Into<String>, node: NodeId) {
        self.bookmarks.insert(name.into(), node);
    }

    /// Resolves a reference: a bookmark name or a full hex node id.
    pub fn resolve_ref(&self, name: &str) -> Option<NodeId> {
        if let Some(node) = self.bookmarks.get(name) {
            return Some(*node);
        }
        let node = NodeId::from_hex(name).ok()?;
        self.commits.contains_key(&node).then_some(node)
    }

    pub fn bookmark(&self, name: &str) -> Option<NodeId> {
        self.bookmarks.get(name).copied()
    }

    /// Returns true if no stored commit lists `node` as a parent.
    pub fn is_head(&self, node: &NodeId) -> bool {
        self.commits.contains_key(node)
            && !self.commits.values().any(|c| c.parents.contains(node))
    }

    /// All heads, in insertion order.
    pub fn heads(&self) -> Vec<NodeId> {
        let mut referenced: HashSet<NodeId> = HashSet::new();
        for commit in self.commits.values() {
            referenced.extend(commit.parent_nodes());
        }
        self.order
            .iter()
            .copied()
            .filter(|n| !referenced.contains(n))
            .collect()
    }

    pub fn markers(&self) -> &[(NodeId, NodeId)] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Opens a transaction. All writes a push session performs go through
    /// the transaction and become visible only when it commits.
    pub fn transaction(&mut self) -> Transaction<'_> {
        Transaction {
            store: self,
            pending: HashMap::new(),
            pending_order: Vec::new(),
            pending_phases: HashMap::new(),
            pending_markers: Vec::new(),
            pending_bookmarks: Vec::new(),
        }
    }
}

impl ReadStore for MemoryStore {
    fn get(&self, node: &NodeId) -> Option<&Commit> {
        self.commits.get(node)
    }

    fn local_rev(&self, node: &NodeId) -> Option<u64> {
        self.order.iter().position(|n| n == node).map(|i| i as u64)
    }

    fn rev_count(&self) -> u64 {
        self.order.len() as u64
    }

    fn phase(&self, node: &NodeId) -> Phase {
        self.phases.get(node).copied().unwrap_or(Phase::Draft)
    }

    fn is_obsolete(&self, node: &NodeId) -> bool {
        self.obsolete.contains(node)
    }
}

/// A buffered write scope over a [`MemoryStore`].
///
/// Reads see both the underlying store and the transaction's own appends.
/// Dropping the transaction without calling [`Transaction::commit`] discards
/// every buffered write.
pub struct Transaction<'a> {
    store: &'a mut MemoryStore,
    pending: HashMap<NodeId, Commit>,
    pending_order: Vec<NodeId>,
    pending_phases: HashMap<NodeId, Phase>,
    pending_markers: Vec<(NodeId, NodeId)>,
    pending_bookmarks: Vec<(String, NodeId)>,
}

impl Transaction<'_> {
    /// Appends a commit within the transaction, returning its id.
    ///
    /// Idempotent against both the store and earlier buffered appends, so
    /// re-creating an existing commit (a fast-forward graft) creates
    /// nothing.
    pub fn append(&mut self, commit: Commit) -> NodeId {
        let id = commit_id(&commit);
        if !self.store.commits.contains_key(&id) && !self.pending.contains_key(&id) {
            self.pending.insert(id, commit);
            self.pending_order.push(id);
        }
        id
    }

    /// Node ids appended by this transaction, in order.
    pub fn added(&self) -> &[NodeId] {
        &self.pending_order
    }

    pub fn obsolescence_enabled(&self) -> bool {
        self.store.obsolescence_enabled()
    }

    /// Marks `node` and all of its draft ancestors public.
    pub fn advance_phase_public(&mut self, node: NodeId) {
        let mut queue = vec![node];
        let mut seen = HashSet::new();
        while let Some(n) = queue.pop() {
            if n.is_null() || !seen.insert(n) {
                continue;
            }
            if self.phase(&n) == Phase::Public {
                continue;
            }
            self.pending_phases.insert(n, Phase::Public);
            if let Some(commit) = self.get(&n) {
                queue.extend(commit.parent_nodes());
            }
        }
    }

    /// Records an old -> new equivalence marker.
    pub fn add_marker(&mut self, old: NodeId, new: NodeId) {
        self.pending_markers.push((old, new));
    }

    /// Moves a bookmark with compare-and-set semantics against `old`.
    ///
    /// `old` of `None` asserts the bookmark does not exist yet.
    pub fn move_bookmark(
        &mut self,
        name: &str,
        old: Option<NodeId>,
        new: NodeId,
    ) -> Result<(), RebaseError> {
        let current = self
            .pending_bookmarks
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .or_else(|| self.store.bookmark(name));
        if current != old {
            return Err(RebaseError::BookmarkMoveRace {
                bookmark: name.to_string(),
                expected: old.unwrap_or(NodeId::NULL),
            });
        }
        self.pending_bookmarks.push((name.to_string(), new));
        Ok(())
    }

    /// Publishes every buffered write to the underlying store.
    pub fn commit(self) {
        for id in self.pending_order {
            let commit = self.pending.get(&id).expect("pending order tracks pending");
            self.store.commits.insert(id, commit.clone());
            self.store.order.push(id);
        }
        for (node, phase) in self.pending_phases {
            self.store.phases.insert(node, phase);
        }
        for (old, new) in self.pending_markers {
            self.store.obsolete.insert(old);
            self.store.markers.push((old, new));
        }
        for (name, node) in self.pending_bookmarks {
            self.store.bookmarks.insert(name, node);
        }
    }
}

impl ReadStore for Transaction<'_> {
    fn get(&self, node: &NodeId) -> Option<&Commit> {
        self.pending.get(node).or_else(|| self.store.get(node))
    }

    fn local_rev(&self, node: &NodeId) -> Option<u64> {
        if let Some(i) = self.pending_order.iter().position(|n| n == node) {
            return Some(self.store.order.len() as u64 + i as u64);
        }
        self.store.local_rev(node)
    }

    fn rev_count(&self) -> u64 {
        self.store.rev_count() + self.pending_order.len() as u64
    }

    fn phase(&self, node: &NodeId) -> Phase {
        self.pending_phases
            .get(node)
            .copied()
            .unwrap_or_else(|| self.store.phase(node))
    }

    fn is_obsolete(&self, node: &NodeId) -> bool {
        self.pending_markers.iter().any(|(old, _)| old == node)
            || self.store.is_obsolete(node)
    }
}
