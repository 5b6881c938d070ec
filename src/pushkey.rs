//! Rewriting of key-push messages against the replacement table.
//!
//! A push often bundles bookmark and phase updates naming the client's
//! original commit ids. Once those commits are rewritten the names would
//! dangle, so before delegating to the host's key handling the references
//! are translated: phase updates carry the node in the key, bookmark updates
//! carry it in the new value. Anything else passes through untouched.

use std::collections::BTreeMap;

use tracing::debug;

use crate::protocol::KeyPush;
use crate::types::NodeId;

/// Namespace of phase-advancement key pushes.
pub const PHASES_NAMESPACE: &str = "phases";

/// Namespace of bookmark-move key pushes.
pub const BOOKMARKS_NAMESPACE: &str = "bookmarks";

/// Maps a hex node reference through the replacement table.
///
/// References that do not parse as a node id, or that were not rewritten,
/// come back unchanged.
fn translate_ref(replacements: &BTreeMap<NodeId, NodeId>, reference: &str) -> String {
    match NodeId::from_hex(reference) {
        Ok(node) => match replacements.get(&node) {
            Some(new) => new.to_hex(),
            None => reference.to_string(),
        },
        Err(_) => reference.to_string(),
    }
}

/// Rewrites one key push so its node references point at rewritten commits.
pub fn translate(replacements: &BTreeMap<NodeId, NodeId>, push: KeyPush) -> KeyPush {
    match push.namespace.as_str() {
        PHASES_NAMESPACE => {
            let key = translate_ref(replacements, &push.key);
            if key != push.key {
                debug!(old = %push.key, new = %key, "translated phase key push");
            }
            KeyPush { key, ..push }
        }
        BOOKMARKS_NAMESPACE => {
            let new = translate_ref(replacements, &push.new);
            if new != push.new {
                debug!(bookmark = %push.key, old = %push.new, target = %new, "translated bookmark key push");
            }
            KeyPush { new, ..push }
        }
        _ => push,
    }
}
