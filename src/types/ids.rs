//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifier kinds (e.g.
//! using a bookmark name where a node id is expected) and make the code more
//! self-documenting.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The width of a node identifier in bytes, fixed by the wire protocol.
pub const NODE_ID_LEN: usize = 20;

/// Error returned when a string cannot be parsed as a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node id {value:?}: expected {} hex characters", NODE_ID_LEN * 2)]
pub struct InvalidNodeId {
    pub value: String,
}

/// A content hash identifying a commit (20 bytes, displayed as 40 hex chars).
///
/// The all-zero value is the null sentinel: it stands for "no parent" in a
/// commit's parent pair and for "no shared history" as a graft base. It never
/// names a real commit.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl NodeId {
    /// The null sentinel (all zero bytes).
    pub const NULL: NodeId = NodeId([0; NODE_ID_LEN]);

    /// Returns true if this is the null sentinel.
    pub fn is_null(&self) -> bool {
        *self == NodeId::NULL
    }

    /// Parses a 40-character hex string into a node id.
    pub fn from_hex(s: &str) -> Result<NodeId, InvalidNodeId> {
        let mut bytes = [0u8; NODE_ID_LEN];
        if s.len() != NODE_ID_LEN * 2 {
            return Err(InvalidNodeId {
                value: s.to_string(),
            });
        }
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidNodeId {
            value: s.to_string(),
        })?;
        Ok(NodeId(bytes))
    }

    /// Returns the id as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// Returns a short (12 hex character) version for display.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

impl From<[u8; NODE_ID_LEN]> for NodeId {
    fn from(bytes: [u8; NODE_ID_LEN]) -> Self {
        NodeId(bytes)
    }
}

/// A repository-relative file path inside a commit's tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoPath(pub String);

impl RepoPath {
    pub fn new(s: impl Into<String>) -> Self {
        RepoPath(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RepoPath {
    fn from(s: &str) -> Self {
        RepoPath(s.to_string())
    }
}

impl From<String> for RepoPath {
    fn from(s: String) -> Self {
        RepoPath(s)
    }
}
