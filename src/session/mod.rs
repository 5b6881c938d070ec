//! The push session: one request, one transaction, one outcome.
//!
//! [`handle_push_session`] runs the full pipeline for a single push: stage
//! the payload, resolve the destination, graft, record equivalence, apply
//! key pushes, publish, and build the reply. Every fallible step happens
//! before or inside the transaction, so an abort at any point leaves the
//! repository exactly as it was.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use crate::bundle::{BundleOverlay, StagedBundle};
use crate::equivalence;
use crate::error::RebaseError;
use crate::graft::{graft_incoming, project_files};
use crate::protocol::{CapabilitySet, KeyPush, RebaseRequest, ReplyPart, REBASE_PART_TYPE};
use crate::pushkey;
use crate::resolve::resolve;
use crate::response;
use crate::store::{MemoryStore, ReadStore, Transaction};
use crate::types::NodeId;
use crate::validate::validate;


/// Server-side policy for push sessions.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Whether the server handles the rebase-request part at all. A disabled
    /// server must refuse the session, since the part is mandatory.
    pub rebase_enabled: bool,
    /// Whether commits landed on this server are published immediately.
    pub publishing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            rebase_enabled: true,
            publishing: true,
        }
    }
}

/// Everything the client sent for one push session.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub rebase: RebaseRequest,
    /// Heads the client believes both sides share; enables pushback.
    pub common_heads: Option<Vec<NodeId>>,
    pub caps: CapabilitySet,
    /// Key pushes bundled with the rebase, in order.
    pub key_pushes: Vec<KeyPush>,
}

/// Outcome of a successful push session.
#[derive(Debug, Clone)]
pub struct PushResult {
    /// Head of the grafted chain on the server.
    pub new_head: NodeId,
    /// old -> new for every rewritten commit.
    pub replacements: BTreeMap<NodeId, NodeId>,
    /// Reply parts for the client (empty without pushback).
    pub reply: Vec<ReplyPart>,
    /// The key pushes after translation, as applied.
    pub key_pushes: Vec<KeyPush>,
}

/// Progress of a session through the pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SessionStage {
    Received,
    Validated,
    DestinationResolved,
    Grafted,
    EquivalenceRecorded,
    Committed,
    ResponseBuilt,
}

fn enter(stage: SessionStage) {
    debug!(?stage, "session stage");
}

/// Runs one push session against the repository.
///
/// Aborts leave the repository untouched: the staging spool is removed when
/// the bundle drops, and the transaction discards buffered writes unless it
/// reaches `commit()`.
#[instrument(skip(store, request, config), fields(destination = %request.rebase.destination))]
pub fn handle_push_session(
    store: &mut MemoryStore,
    request: PushRequest,
    config: &ServerConfig,
) -> Result<PushResult, RebaseError> {
    if !config.rebase_enabled {
        // The rebase-request part is mandatory: a server that does not
        // handle it must refuse the whole push.
        return Err(RebaseError::UnsupportedPart {
            part: REBASE_PART_TYPE.to_string(),
        });
    }
    enter(SessionStage::Received);

    let staged = StagedBundle::materialize(&request.rebase.payload)?;
    let incoming = staged.decode()?;

    let destination = store.resolve_ref(&request.rebase.destination);
    if !request.rebase.newhead {
        match destination {
            Some(node) if store.is_head(&node) => {}
            _ => return Err(RebaseError::NewHeadForbidden),
        }
    }

    let (resolution, projected) = {
        let overlay = BundleOverlay::new(store, &incoming);
        validate(&overlay, &incoming)?;
        enter(SessionStage::Validated);
        // The resolver re-validates as its own first step.
        let resolution = resolve(&overlay, &incoming, destination)?;
        let projected = project_files(&overlay, &incoming)?;
        (resolution, projected)
    };
    enter(SessionStage::DestinationResolved);

    let mut txn = store.transaction();
    let report = graft_incoming(&mut txn, &incoming, &resolution, &projected)?;
    enter(SessionStage::Grafted);

    if config.publishing {
        txn.advance_phase_public(report.new_head);
    }
    equivalence::record(&mut txn, &report.replacements);
    enter(SessionStage::EquivalenceRecorded);

    let mut key_pushes = Vec::with_capacity(request.key_pushes.len());
    for push in request.key_pushes {
        let push = pushkey::translate(&report.replacements, push);
        apply_key_push(&mut txn, &push)?;
        key_pushes.push(push);
    }

    txn.commit();
    enter(SessionStage::Committed);

    let rewritten: Vec<NodeId> = report.replacements.values().copied().collect();
    let reply = response::build(
        store,
        request.common_heads.as_deref(),
        &request.caps,
        &rewritten,
    );
    enter(SessionStage::ResponseBuilt);

    info!(
        new_head = %report.new_head.short(),
        rewritten = report.replacements.len(),
        "push session complete"
    );
    Ok(PushResult {
        new_head: report.new_head,
        replacements: report.replacements,
        reply,
        key_pushes,
    })
}

/// Applies one translated key push inside the transaction.
///
/// Bookmark moves use compare-and-set against the pushed `old` value; phase
/// pushes advance the named node to public. Pushes in other namespaces, or
/// with values that are not node ids, are left to the host.
fn apply_key_push(txn: &mut Transaction<'_>, push: &KeyPush) -> Result<(), RebaseError> {
    match push.namespace.as_str() {
        pushkey::BOOKMARKS_NAMESPACE => {
            let new = match NodeId::from_hex(&push.new) {
                Ok(node) => node,
                Err(_) => return Ok(()),
            };
            if !txn.contains(&new) {
                return Err(RebaseError::UnknownCommit(new));
            }
            let old = NodeId::from_hex(&push.old).ok();
            txn.move_bookmark(&push.key, old, new)
        }
        pushkey::PHASES_NAMESPACE => {
            if let Ok(node) = NodeId::from_hex(&push.key) {
                // "0" is the public phase in key-push encoding.
                if push.new == "0" {
                    txn.advance_phase_public(node);
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
