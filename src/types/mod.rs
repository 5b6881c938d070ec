//! Core domain types for the push-rebase engine.
//!
//! This module contains the fundamental value types used throughout the
//! crate, designed to encode invariants via the type system.

pub mod commit;
pub mod ids;

// Re-export commonly used types at the module level
pub use commit::{Commit, FileEntry, FileFlags, Phase};
pub use ids::{InvalidNodeId, NodeId, RepoPath, NODE_ID_LEN};
