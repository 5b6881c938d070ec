//! Error taxonomy for the push-rebase engine.
//!
//! Every error aborts the entire push session: nothing is retried internally
//! and the host transaction discards any commit created before the failing
//! step. The [`ErrorKind`] classification exists so callers can map aborts
//! onto protocol-level responses without matching on individual variants.

use thiserror::Error;

use crate::types::{NodeId, RepoPath, NODE_ID_LEN};

/// Coarse classification of a push-rebase abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The incoming commit set is not eligible for rebase.
    Validation,
    /// A required protocol capability or server policy is missing.
    Capability,
    /// The destination cannot accept the incoming commits.
    DestinationConflict,
    /// A message payload was malformed.
    Protocol,
    /// The host store failed a lookup the engine relied on.
    Storage,
}

/// An abort reason for a push-rebase session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RebaseError {
    // -- validation --
    #[error("nothing to rebase")]
    NothingToRebase,

    #[error("cannot rebase public changesets")]
    PublicChangesets,

    #[error("cannot rebase obsolete changesets")]
    ObsoleteChangesets,

    #[error("cannot rebase divergent changesets")]
    DivergentChangesets,

    // -- capability / policy --
    #[error("no server support for {part:?}")]
    UnsupportedPart { part: String },

    // -- destination --
    #[error("pushed commits do not branch from an ancestor of the desired destination {destination}")]
    UnrelatedHistory { destination: NodeId },

    #[error("conflicting changes in {}", format_paths(.paths))]
    ConflictingChanges { paths: Vec<RepoPath> },

    #[error("rebase would produce a new head on server")]
    NewHeadForbidden,

    // -- protocol --
    #[error(
        "malformed common-heads payload: {len} bytes is not a multiple of {}",
        NODE_ID_LEN
    )]
    MalformedCommonHeads { len: usize },

    #[error("malformed change-group payload: {reason}")]
    MalformedChangeGroup { reason: String },

    #[error("could not stage change-group payload: {reason}")]
    StagingFailed { reason: String },

    // -- storage --
    #[error("unknown commit {0}")]
    UnknownCommit(NodeId),

    #[error("bookmark {bookmark:?} does not point at {expected}")]
    BookmarkMoveRace {
        bookmark: String,
        expected: NodeId,
    },
}

impl RebaseError {
    /// Classifies this abort per the error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RebaseError::NothingToRebase
            | RebaseError::PublicChangesets
            | RebaseError::ObsoleteChangesets
            | RebaseError::DivergentChangesets => ErrorKind::Validation,

            RebaseError::UnsupportedPart { .. } => ErrorKind::Capability,

            RebaseError::UnrelatedHistory { .. }
            | RebaseError::ConflictingChanges { .. }
            | RebaseError::NewHeadForbidden => ErrorKind::DestinationConflict,

            RebaseError::MalformedCommonHeads { .. }
            | RebaseError::MalformedChangeGroup { .. }
            | RebaseError::StagingFailed { .. } => ErrorKind::Protocol,

            RebaseError::UnknownCommit(_) | RebaseError::BookmarkMoveRace { .. } => {
                ErrorKind::Storage
            }
        }
    }
}

fn format_paths(paths: &[RepoPath]) -> String {
    let joined = paths
        .iter()
        .map(|p| format!("{:?}", p.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_classified() {
        assert_eq!(RebaseError::NothingToRebase.kind(), ErrorKind::Validation);
        assert_eq!(RebaseError::PublicChangesets.kind(), ErrorKind::Validation);
        assert_eq!(
            RebaseError::DivergentChangesets.kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn destination_errors_classified() {
        assert_eq!(
            RebaseError::NewHeadForbidden.kind(),
            ErrorKind::DestinationConflict
        );
        assert_eq!(
            RebaseError::ConflictingChanges { paths: vec![] }.kind(),
            ErrorKind::DestinationConflict
        );
    }

    #[test]
    fn protocol_errors_classified() {
        assert_eq!(
            RebaseError::MalformedCommonHeads { len: 21 }.kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn conflict_message_lists_paths() {
        let err = RebaseError::ConflictingChanges {
            paths: vec![RepoPath::from("a.txt"), RepoPath::from("b/c.rs")],
        };
        let msg = err.to_string();
        assert!(msg.contains("\"a.txt\""), "{msg}");
        assert!(msg.contains("\"b/c.rs\""), "{msg}");
    }

    #[test]
    fn common_heads_message_names_width() {
        let msg = RebaseError::MalformedCommonHeads { len: 21 }.to_string();
        assert!(msg.contains("21"), "{msg}");
        assert!(msg.contains("20"), "{msg}");
    }
}
