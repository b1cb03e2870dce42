//! Error types for the account-tree and weighted-walk engine.

use thiserror::Error;

/// Errors raised while building or walking an account-node hierarchy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The walk's rank cursor reached zero while users remained to emit.
    ///
    /// This is a walker-internal invariant violation: `subtree_leaf_size`
    /// of the root did not match the number of leaves actually visited.
    #[error("rank exhausted before all leaves were ranked")]
    RankExhausted,

    /// A node reference was out of bounds for the arena it was looked up in.
    #[error("invalid node reference: {0:?}")]
    InvalidNode(crate::node::NodeId),

    /// An operation that requires a leaf was applied to an internal node,
    /// or vice versa.
    #[error("node {0:?} is not a {1}")]
    WrongNodeKind(crate::node::NodeId, &'static str),
}

/// Result alias used throughout `fairshare-core`.
pub type CoreResult<T> = Result<T, CoreError>;
