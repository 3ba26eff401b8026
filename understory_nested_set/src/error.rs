// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by the engine.

use thiserror::Error;

use crate::check::InvariantViolation;

/// Result type for engine operations over a store whose error type is `E`.
pub type TreeResult<T, E> = Result<T, TreeError<E>>;

/// A re-parenting request that would break the tree shape.
///
/// Raised before anything is written.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum InvalidParent {
    /// The new parent is the node itself or one of its descendants.
    #[error("A node may not have its parent changed to itself or any of its descendants.")]
    SelfOrDescendant,
    /// A root was asked to hang below a node of its own tree.
    #[error("A root node may not have its parent changed to any node in its own tree.")]
    RootIntoOwnTree,
}

/// A positional move that cannot be carried out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum InvalidMove {
    /// The target is the node itself or one of its descendants.
    #[error("A node may not be moved relative to itself or any of its descendants.")]
    IntoOwnSubtree,
    /// Roots have no parent to share, so nothing can sit beside them.
    #[error("A node may not be made a sibling of a root node.")]
    SiblingOfRoot,
}

/// Everything that can go wrong in a tree operation.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum TreeError<E> {
    /// See [`InvalidParent`].
    #[error(transparent)]
    InvalidParent(#[from] InvalidParent),
    /// See [`InvalidMove`].
    #[error(transparent)]
    InvalidMove(#[from] InvalidMove),
    /// A key handed to the engine has no stored row.
    #[error("node not found")]
    NodeNotFound,
    /// Non-cascading delete of a node that still has children.
    #[error("node has children and cascading deletes are disabled")]
    HasChildren,
    /// Every `u32` tree id is taken.
    #[error("no tree ids left to allocate")]
    TreeIdsExhausted,
    /// The stored encoding is inconsistent.
    #[error(transparent)]
    Corrupted(#[from] InvariantViolation),
    /// The store failed; the surrounding transaction has been rolled back.
    #[error("store operation failed")]
    Store(#[source] E),
}
