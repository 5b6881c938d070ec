//! The graft engine: rewriting incoming commits onto their new parents.
//!
//! Each incoming commit is duplicated with parents substituted through the
//! session's mapping and its recorded file changes replayed on top of the
//! remapped first parent. Commits are processed strictly in the incoming
//! set's topological order, so a commit's parents are always mapped before
//! it is grafted. All rewriting state lives in the [`GraftReport`]; commits
//! themselves stay immutable values.
//!
//! File projections are computed up front against the staged originals
//! (see [`project_files`]); grafting itself only reads through the open
//! transaction.

use std::collections::BTreeMap;

use tracing::debug;

use crate::bundle::IncomingSet;
use crate::error::RebaseError;
use crate::resolve::Resolution;
use crate::store::{ReadStore, Transaction};
use crate::types::{Commit, NodeId, RepoPath};

/// The old -> new tables produced by grafting.
#[derive(Debug, Clone, Default)]
pub struct GraftReport {
    /// Every translation, seeded with graft base -> destination and extended
    /// by one entry per grafted commit (identity entries included).
    pub mapping: BTreeMap<NodeId, NodeId>,
    /// The mapping restricted to entries where old differs from new; the
    /// authoritative substitution table for everything downstream.
    pub replacements: BTreeMap<NodeId, NodeId>,
    /// The rewritten head of the incoming chain.
    pub new_head: NodeId,
}

impl GraftReport {
    /// Translates a node through the replacement table (identity if absent).
    pub fn translate(&self, node: NodeId) -> NodeId {
        self.replacements.get(&node).copied().unwrap_or(node)
    }
}

/// Computes the changed-path set each incoming commit will replay.
///
/// For a merge commit the recorded changed-file set only covers paths that
/// differ from both parents, which would drop second-parent contributions.
/// The new commit is built by applying changed files atop the remapped first
/// parent, so the right set for a merge is the diff against the original
/// first parent alone; every other commit replays its own recorded set.
pub fn project_files<S: ReadStore>(
    originals: &S,
    incoming: &IncomingSet,
) -> Result<BTreeMap<NodeId, Vec<RepoPath>>, RebaseError> {
    let mut projected = BTreeMap::new();
    for (node, commit) in incoming.iter() {
        let files = if commit.is_merge() {
            let p1 = originals.require(&commit.p1())?;
            commit.manifest_diff(p1).into_iter().cloned().collect()
        } else {
            commit.files.clone()
        };
        projected.insert(node, files);
    }
    Ok(projected)
}

/// Grafts the whole incoming set per `resolution`, appending rewritten
/// commits to the transaction.
///
/// On a fast-forward the mapping seed is the identity and every graft
/// reproduces its original commit value, so the content-addressed append
/// creates nothing and the report carries no replacements.
pub fn graft_incoming(
    txn: &mut Transaction<'_>,
    incoming: &IncomingSet,
    resolution: &Resolution,
    projected: &BTreeMap<NodeId, Vec<RepoPath>>,
) -> Result<GraftReport, RebaseError> {
    let mut report = GraftReport::default();
    report
        .mapping
        .insert(resolution.graft_base, resolution.destination);

    let mut head = resolution.destination;
    for (node, commit) in incoming.iter() {
        let files = projected
            .get(&node)
            .ok_or(RebaseError::UnknownCommit(node))?;
        let new_node = graft_one(txn, commit, files, &mut report.mapping)?;
        report.mapping.insert(node, new_node);
        if node != new_node {
            report.replacements.insert(node, new_node);
        }
        head = new_node;
    }
    report.new_head = head;

    debug!(
        grafted = incoming.len(),
        rewritten = report.replacements.len(),
        head = %report.new_head.short(),
        "grafted incoming chain"
    );
    Ok(report)
}

/// Duplicates one commit with parents substituted through `mapping` and the
/// given changed paths replayed onto the new first parent.
fn graft_one(
    txn: &mut Transaction<'_>,
    commit: &Commit,
    files: &[RepoPath],
    mapping: &mut BTreeMap<NodeId, NodeId>,
) -> Result<NodeId, RebaseError> {
    let old_p1 = commit.p1();
    let old_p2 = commit.p2();
    let new_p1 = mapping.get(&old_p1).copied().unwrap_or(old_p1);
    let mut new_p2 = mapping.get(&old_p2).copied().unwrap_or(old_p2);

    // A true root being attached to the destination lineage becomes
    // single-parented, and the null translation is consumed so that only the
    // first root in the ordered set reattaches; later unrelated roots must
    // not be silently merged into the destination lineage.
    if old_p1.is_null() && old_p2.is_null() && !new_p1.is_null() {
        new_p2 = NodeId::NULL;
        mapping.remove(&NodeId::NULL);
    }

    // Replay: new parent's tree plus exactly the original per-path changes.
    // Content, flags and copy sources carry over verbatim; copy sources are
    // not remapped.
    let mut manifest = if new_p1.is_null() {
        BTreeMap::new()
    } else {
        txn.require(&new_p1)?.manifest.clone()
    };
    for path in files {
        match commit.manifest.get(path) {
            Some(entry) => {
                manifest.insert(path.clone(), entry.clone());
            }
            None => {
                manifest.remove(path);
            }
        }
    }

    // The changed-file set is recorded the way commit-time recording does
    // it: against the first parent, or for a merge against both parents.
    // The replay projection above is deliberately wider for merges; storing
    // it would change the value (and therefore the id) of a commit whose
    // parents and tree did not move.
    let recorded = if commit.is_merge() {
        let p1_manifest = &txn.require(&new_p1)?.manifest;
        let p2_manifest = &txn.require(&new_p2)?.manifest;
        let mut paths: Vec<RepoPath> = manifest
            .keys()
            .chain(p1_manifest.keys())
            .chain(p2_manifest.keys())
            .filter(|p| {
                manifest.get(*p) != p1_manifest.get(*p)
                    && manifest.get(*p) != p2_manifest.get(*p)
            })
            .cloned()
            .collect();
        paths.sort();
        paths.dedup();
        paths
    } else {
        files.to_vec()
    };

    let new_commit = Commit {
        parents: [new_p1, new_p2],
        author: commit.author.clone(),
        date: commit.date,
        message: commit.message.clone(),
        extra: commit.extra.clone(),
        manifest,
        files: recorded,
    };
    Ok(txn.append(new_commit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleOverlay;
    use crate::resolve::resolve;
    use crate::store::MemoryStore;
    use crate::test_utils::{client_chain, CommitBuilder};

    /// Resolves and grafts `incoming` against `store`, committing the
    /// transaction.
    fn run_graft(
        store: &mut MemoryStore,
        incoming: &IncomingSet,
        destination: Option<NodeId>,
    ) -> GraftReport {
        let (resolution, projected) = {
            let overlay = BundleOverlay::new(store, incoming);
            let resolution = resolve(&overlay, incoming, destination).unwrap();
            let projected = project_files(&overlay, incoming).unwrap();
            (resolution, projected)
        };
        let mut txn = store.transaction();
        let report = graft_incoming(&mut txn, incoming, &resolution, &projected).unwrap();
        txn.commit();
        report
    }

    fn server_repo() -> (MemoryStore, NodeId, NodeId) {
        let mut store = MemoryStore::new();
        let (shared, _) = CommitBuilder::new()
            .message("shared")
            .add_file("base.txt", b"base")
            .build(&mut store);
        let (tip, _) = CommitBuilder::new()
            .parent(shared)
            .message("server tip")
            .add_file("server_file", b"server data")
            .build(&mut store);
        (store, shared, tip)
    }

    #[test]
    fn grafted_commits_sit_on_destination() {
        let (mut store, shared, tip) = server_repo();
        let incoming = client_chain(&store, shared, &["one", "two"]);
        let report = run_graft(&mut store, &incoming, Some(tip));

        assert_eq!(report.replacements.len(), 2);
        let (first_old, _) = incoming.iter().next().unwrap();
        let first_new = report.translate(first_old);
        assert_eq!(store.get(&first_new).unwrap().p1(), tip);
        assert_eq!(store.get(&report.new_head).unwrap().p1(), first_new);
    }

    #[test]
    fn replay_preserves_per_path_changes() {
        let (mut store, shared, tip) = server_repo();
        let incoming = client_chain(&store, shared, &["mine.txt"]);
        let report = run_graft(&mut store, &incoming, Some(tip));

        let new_head = store.get(&report.new_head).unwrap();
        let parent = store.get(&tip).unwrap();
        // The new tree equals the new parent's tree plus exactly the
        // original change.
        let (_, original) = incoming.iter().next().unwrap();
        let mut expected = parent.manifest.clone();
        expected.insert(
            RepoPath::from("mine.txt"),
            original.manifest[&RepoPath::from("mine.txt")].clone(),
        );
        assert_eq!(new_head.manifest, expected);
        assert_eq!(new_head.files, vec![RepoPath::from("mine.txt")]);
    }

    #[test]
    fn metadata_carries_over_unchanged() {
        let (mut store, shared, tip) = server_repo();
        let mut client = store.clone();
        let (id, commit) = CommitBuilder::new()
            .parent(shared)
            .message("with extras")
            .author("someone <s@example.com>")
            .extra("topic", "feature-x")
            .add_file("mine.txt", b"data")
            .build(&mut client);
        let incoming = IncomingSet::new(vec![(id, commit.clone())]).unwrap();
        let report = run_graft(&mut store, &incoming, Some(tip));

        let grafted = store.get(&report.new_head).unwrap();
        assert_ne!(report.new_head, id);
        assert_eq!(grafted.message, commit.message);
        assert_eq!(grafted.author, commit.author);
        assert_eq!(grafted.date, commit.date);
        assert_eq!(grafted.extra, commit.extra);
    }

    #[test]
    fn fast_forward_creates_nothing() {
        let (mut store, _, tip) = server_repo();
        let incoming = client_chain(&store, tip, &["one", "two"]);
        let report = run_graft(&mut store, &incoming, Some(tip));

        assert!(report.replacements.is_empty());
        // The incoming commits land as themselves; no rewritten ids.
        for (node, _) in incoming.iter() {
            assert!(store.contains(&node));
            assert_eq!(report.mapping[&node], node);
        }
    }

    #[test]
    fn deletion_replays_as_removal() {
        let (mut store, shared, tip) = server_repo();
        let mut client = store.clone();
        let (id, commit) = CommitBuilder::new()
            .parent(shared)
            .message("delete base")
            .delete_file("base.txt")
            .build(&mut client);
        let incoming = IncomingSet::new(vec![(id, commit)]).unwrap();
        let report = run_graft(&mut store, &incoming, Some(tip));

        let grafted = store.get(&report.new_head).unwrap();
        assert!(!grafted.manifest.contains_key(&RepoPath::from("base.txt")));
        assert!(grafted.manifest.contains_key(&RepoPath::from("server_file")));
    }

    #[test]
    fn exec_flag_survives_graft() {
        let (mut store, shared, tip) = server_repo();
        let mut client = store.clone();
        let (id, commit) = CommitBuilder::new()
            .parent(shared)
            .message("script")
            .add_exec_file("run.sh", b"#!/bin/sh")
            .build(&mut client);
        let incoming = IncomingSet::new(vec![(id, commit)]).unwrap();
        let report = run_graft(&mut store, &incoming, Some(tip));

        let grafted = store.get(&report.new_head).unwrap();
        assert!(grafted.manifest[&RepoPath::from("run.sh")].flags.exec);
    }

    #[test]
    fn copy_source_is_not_remapped() {
        let (mut store, shared, tip) = server_repo();
        let mut client = store.clone();
        let (id, commit) = CommitBuilder::new()
            .parent(shared)
            .message("copy")
            .copy_file("copy.txt", b"base", "base.txt")
            .build(&mut client);
        let incoming = IncomingSet::new(vec![(id, commit)]).unwrap();
        let report = run_graft(&mut store, &incoming, Some(tip));

        let grafted = store.get(&report.new_head).unwrap();
        assert_eq!(
            grafted.manifest[&RepoPath::from("copy.txt")].copy_from,
            Some(RepoPath::from("base.txt"))
        );
    }

    #[test]
    fn only_first_root_reattaches() {
        let (mut store, _, tip) = server_repo();
        let mut client = MemoryStore::new();
        let (a, commit_a) = CommitBuilder::new()
            .message("root a")
            .add_file("a.txt", b"a")
            .build(&mut client);
        let (b, commit_b) = CommitBuilder::new()
            .parent(a)
            .message("child of a")
            .add_file("b.txt", b"b")
            .build(&mut client);
        let (c, commit_c) = CommitBuilder::new()
            .message("second root")
            .add_file("c.txt", b"c")
            .build(&mut client);
        let (m, commit_m) = CommitBuilder::new()
            .parent(b)
            .parent2(c)
            .message("merge roots")
            .build(&mut client);

        let incoming = IncomingSet::new(vec![
            (a, commit_a),
            (b, commit_b),
            (c, commit_c),
            (m, commit_m),
        ])
        .unwrap();
        let report = run_graft(&mut store, &incoming, Some(tip));

        let new_a = store.get(&report.translate(a)).unwrap();
        assert_eq!(new_a.parents, [tip, NodeId::NULL]);

        // The second root keeps its null parents: the null translation was
        // consumed by the first root.
        let new_c = report.translate(c);
        assert_eq!(new_c, c);
        assert!(store.get(&new_c).unwrap().is_root());
    }

    #[test]
    fn merge_commit_diffs_against_first_parent_only() {
        let (mut store, shared, tip) = server_repo();
        let mut client = store.clone();
        let (left, commit_left) = CommitBuilder::new()
            .parent(shared)
            .message("left")
            .add_file("left.txt", b"l")
            .build(&mut client);
        let (right, commit_right) = CommitBuilder::new()
            .parent(shared)
            .message("right")
            .add_file("right.txt", b"r")
            .build(&mut client);
        // A merge whose recorded changed-file set is empty (nothing differs
        // from both parents), yet whose tree carries right's file.
        let (m, commit_m) = CommitBuilder::new()
            .parent(left)
            .parent2(right)
            .message("merge")
            .inherit_file(&client, right, "right.txt")
            .build(&mut client);
        assert!(commit_m.files.is_empty());

        let incoming = IncomingSet::new(vec![
            (left, commit_left),
            (right, commit_right),
            (m, commit_m),
        ])
        .unwrap();
        let report = run_graft(&mut store, &incoming, Some(tip));

        let new_m = store.get(&report.translate(m)).unwrap();
        // right.txt came only from the second parent, but the projection
        // diffs against the first parent, so it is carried.
        assert!(new_m.manifest.contains_key(&RepoPath::from("right.txt")));
        assert!(new_m.manifest.contains_key(&RepoPath::from("server_file")));
        // The recorded changed-file set stays empty, as it was on the
        // original merge: nothing differs from both new parents.
        assert!(new_m.files.is_empty());
    }

    #[test]
    fn fast_forward_merge_recreates_identical_commit() {
        let (mut store, _, tip) = server_repo();
        let mut client = store.clone();
        let (left, commit_left) = CommitBuilder::new()
            .parent(tip)
            .message("left")
            .add_file("left.txt", b"l")
            .build(&mut client);
        let (right, commit_right) = CommitBuilder::new()
            .parent(tip)
            .message("right")
            .add_file("right.txt", b"r")
            .build(&mut client);
        let (m, commit_m) = CommitBuilder::new()
            .parent(left)
            .parent2(right)
            .message("merge")
            .inherit_file(&client, right, "right.txt")
            .build(&mut client);

        let incoming = IncomingSet::new(vec![
            (left, commit_left),
            (right, commit_right),
            (m, commit_m.clone()),
        ])
        .unwrap();
        let report = run_graft(&mut store, &incoming, Some(tip));

        // The merge lands as itself: same id, no replacement.
        assert!(report.replacements.is_empty());
        assert_eq!(report.new_head, m);
        assert_eq!(store.get(&m), Some(&commit_m));
    }
}
