//! Eligibility checks for an incoming commit set.
//!
//! Pure checks, no side effects. A set is rebasable when it is non-empty,
//! contains no published or superseded commit, and has exactly one head.

use crate::bundle::IncomingSet;
use crate::error::RebaseError;
use crate::store::ReadStore;
use crate::types::Phase;

/// Aborts unless `incoming` is eligible for rebase.
///
/// Phases and obsolescence are read through `store`, which should be the
/// bundle overlay so re-pushed commits the server already knows keep their
/// recorded state.
pub fn validate<S: ReadStore>(store: &S, incoming: &IncomingSet) -> Result<(), RebaseError> {
    if incoming.is_empty() {
        return Err(RebaseError::NothingToRebase);
    }

    for (node, _) in incoming.iter() {
        if store.phase(&node) == Phase::Public {
            return Err(RebaseError::PublicChangesets);
        }
    }

    for (node, _) in incoming.iter() {
        if store.is_obsolete(&node) {
            return Err(RebaseError::ObsoleteChangesets);
        }
    }

    if incoming.heads().len() > 1 {
        return Err(RebaseError::DivergentChangesets);
    }

    Ok(())
}
