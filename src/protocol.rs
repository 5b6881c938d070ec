//! Protocol message types exchanged over a push session.
//!
//! The transport framing around these messages is the host's concern; this
//! module defines the typed contents the engine consumes and produces:
//!
//! - the mandatory rebase-request part (destination, newhead flag, raw
//!   change-group payload)
//! - the common-heads part, a bare concatenation of fixed-width node ids
//! - the reply parts the server may attach for the client (pushback)
//! - generic key-push messages (bookmarks, phases)

use serde::{Deserialize, Serialize};

use crate::error::RebaseError;
use crate::types::{Commit, NodeId, NODE_ID_LEN};

/// Part type of the rebase request; mandatory, so a receiver without a
/// handler for it must abort the push.
pub const REBASE_PART_TYPE: &str = "b2x:rebase";

/// Part type of the client's common-heads declaration.
pub const COMMON_HEADS_PART_TYPE: &str = "b2x:commonheads";

/// Capability a client advertises when it can consume reply parts.
pub const PUSHBACK_CAPABILITY: &str = "pushback";

/// The mandatory rebase-request part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebaseRequest {
    /// Reference name or hex hash the chain should land on.
    pub destination: String,
    /// Whether the push may create a new head on the server.
    pub newhead: bool,
    /// Raw change-group encoding of the incoming commit chain.
    pub payload: Vec<u8>,
}

/// The set of capabilities the client advertised for this session.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    caps: Vec<String>,
}

impl CapabilitySet {
    pub fn new(caps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        CapabilitySet {
            caps: caps.into_iter().map(Into::into).collect(),
        }
    }

    pub fn supports(&self, cap: &str) -> bool {
        self.caps.iter().any(|c| c == cap)
    }

    pub fn supports_pushback(&self) -> bool {
        self.supports(PUSHBACK_CAPABILITY)
    }
}

/// Decodes a common-heads payload: a concatenation of 20-byte node ids.
///
/// A payload that does not split evenly into node ids is a protocol error.
pub fn decode_common_heads(payload: &[u8]) -> Result<Vec<NodeId>, RebaseError> {
    if payload.len() % NODE_ID_LEN != 0 {
        return Err(RebaseError::MalformedCommonHeads {
            len: payload.len(),
        });
    }
    Ok(payload
        .chunks_exact(NODE_ID_LEN)
        .map(|chunk| {
            let mut bytes = [0u8; NODE_ID_LEN];
            bytes.copy_from_slice(chunk);
            NodeId(bytes)
        })
        .collect())
}

/// Encodes node ids as a common-heads payload.
pub fn encode_common_heads(heads: &[NodeId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(heads.len() * NODE_ID_LEN);
    for head in heads {
        out.extend_from_slice(head.as_bytes());
    }
    out
}

/// A part the server attaches to its reply when the client supports
/// pushback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyPart {
    /// Commits the client is missing, parents before children.
    ChangeGroup(Vec<(NodeId, Commit)>),
    /// old -> new equivalence edges relevant to the change group.
    ObsolescenceMarkers(Vec<(NodeId, NodeId)>),
}

/// A generic named-value update pushed in the same session.
///
/// Namespaces `phases` and `bookmarks` reference commits by hex node id and
/// are rewritten by the key translator before delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPush {
    pub namespace: String,
    pub key: String,
    pub old: String,
    pub new: String,
}
