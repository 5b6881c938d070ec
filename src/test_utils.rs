//! Shared fixtures and generators for tests.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use crate::bundle::IncomingSet;
use crate::store::{MemoryStore, ReadStore};
use crate::types::{Commit, FileEntry, FileFlags, NodeId, RepoPath};

/// Fixed timestamp so fixture commits are deterministic.
pub fn fixed_date() -> DateTime<Utc> {
    Utc.timestamp_opt(1_400_000_000, 0).unwrap()
}

/// A bare commit value with the given parents, touching the named files with
/// a constant content id. For tests where only graph shape matters.
pub fn commit_value(parents: [NodeId; 2], files: &[&str]) -> Commit {
    let mut manifest = BTreeMap::new();
    for file in files {
        manifest.insert(RepoPath::from(*file), FileEntry::new(NodeId([1; 20])));
    }
    Commit {
        parents,
        author: "test <test@example.com>".to_string(),
        date: fixed_date(),
        message: String::new(),
        extra: BTreeMap::new(),
        manifest,
        files: files.iter().map(|f| RepoPath::from(*f)).collect(),
    }
}

pub fn arb_node_id() -> impl Strategy<Value = NodeId> {
    any::<[u8; 20]>().prop_map(NodeId)
}

pub fn arb_repo_path() -> impl Strategy<Value = RepoPath> {
    "[a-z][a-z0-9_/]{0,20}".prop_map(RepoPath::from)
}

/// Builds realistic commits against a [`MemoryStore`]: the tree starts from
/// the first parent's manifest and the builder applies adds, copies and
/// deletions, recording them as the changed-file set.
#[derive(Debug, Clone)]
pub struct CommitBuilder {
    parents: [NodeId; 2],
    message: String,
    author: String,
    extra: BTreeMap<String, String>,
    adds: Vec<(RepoPath, Vec<u8>, FileFlags, Option<RepoPath>)>,
    deletes: Vec<RepoPath>,
    inherits: Vec<(RepoPath, FileEntry)>,
}

impl CommitBuilder {
    pub fn new() -> Self {
        CommitBuilder {
            parents: [NodeId::NULL, NodeId::NULL],
            message: "a commit".to_string(),
            author: "test <test@example.com>".to_string(),
            extra: BTreeMap::new(),
            adds: Vec::new(),
            deletes: Vec::new(),
            inherits: Vec::new(),
        }
    }

    pub fn parent(mut self, p1: NodeId) -> Self {
        self.parents[0] = p1;
        self
    }

    pub fn parent2(mut self, p2: NodeId) -> Self {
        self.parents[1] = p2;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn add_file(mut self, path: impl Into<RepoPath>, content: &[u8]) -> Self {
        self.adds
            .push((path.into(), content.to_vec(), FileFlags::plain(), None));
        self
    }

    pub fn add_exec_file(mut self, path: impl Into<RepoPath>, content: &[u8]) -> Self {
        let flags = FileFlags {
            link: false,
            exec: true,
        };
        self.adds.push((path.into(), content.to_vec(), flags, None));
        self
    }

    pub fn copy_file(
        mut self,
        path: impl Into<RepoPath>,
        content: &[u8],
        from: impl Into<RepoPath>,
    ) -> Self {
        self.adds.push((
            path.into(),
            content.to_vec(),
            FileFlags::plain(),
            Some(from.into()),
        ));
        self
    }

    pub fn delete_file(mut self, path: impl Into<RepoPath>) -> Self {
        self.deletes.push(path.into());
        self
    }

    /// Carries a tree entry over from another commit without recording it in
    /// the changed-file set, the shape a merge leaves behind.
    pub fn inherit_file(mut self, store: &MemoryStore, from: NodeId, path: &str) -> Self {
        let entry = store
            .get(&from)
            .expect("inherit source exists")
            .manifest[&RepoPath::from(path)]
            .clone();
        self.inherits.push((RepoPath::from(path), entry));
        self
    }

    /// Appends the commit to `store` and returns its id and value.
    pub fn build(self, store: &mut MemoryStore) -> (NodeId, Commit) {
        let mut manifest = match store.get(&self.parents[0]) {
            Some(parent) => parent.manifest.clone(),
            None => BTreeMap::new(),
        };
        for (path, entry) in &self.inherits {
            manifest.insert(path.clone(), entry.clone());
        }
        let mut files = Vec::new();
        for path in &self.deletes {
            manifest.remove(path);
            files.push(path.clone());
        }
        for (path, content, flags, copy_from) in &self.adds {
            let content_id = store.put_blob(content.clone());
            manifest.insert(
                path.clone(),
                FileEntry {
                    content: content_id,
                    flags: *flags,
                    copy_from: copy_from.clone(),
                },
            );
            files.push(path.clone());
        }
        let commit = Commit {
            parents: self.parents,
            author: self.author,
            date: fixed_date(),
            message: self.message,
            extra: self.extra,
            manifest,
            files,
        };
        let id = store.append(commit.clone());
        (id, commit)
    }
}

impl Default for CommitBuilder {
    fn default() -> Self {
        CommitBuilder::new()
    }
}

/// A client-side chain branching from `base`, one commit per file name,
/// built against a clone of `server` so trees are complete.
pub fn client_chain(server: &MemoryStore, base: NodeId, files: &[&str]) -> IncomingSet {
    let mut client = server.clone();
    let mut parent = base;
    let mut entries = Vec::new();
    for file in files {
        let (id, commit) = CommitBuilder::new()
            .parent(parent)
            .message(*file)
            .add_file(*file, file.as_bytes())
            .build(&mut client);
        entries.push((id, commit));
        parent = id;
    }
    IncomingSet::new(entries).expect("fixture chain is well formed")
}
