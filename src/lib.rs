//! Server-side push-rebase engine.
//!
//! When a client pushes a chain of draft commits, the server rewrites the
//! chain onto the current destination head in one atomic step instead of
//! rejecting the push as non-fast-forward. This library provides the whole
//! pipeline behind that: validation, destination resolution, grafting,
//! equivalence recording, pushback reply construction and key-push
//! translation, over a pluggable read seam and an in-memory reference store.

pub mod bundle;
pub mod dag;
pub mod equivalence;
pub mod error;
pub mod graft;
pub mod protocol;
pub mod pushkey;
pub mod resolve;
pub mod response;
pub mod session;
pub mod store;
pub mod types;
pub mod validate;

#[cfg(test)]
pub mod test_utils;
