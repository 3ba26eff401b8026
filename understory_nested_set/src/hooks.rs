// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle hooks a record layer invokes around its own writes.

use understory_nested_store::Store;

use crate::error::TreeError;
use crate::manager::TreeManager;
use crate::types::TreeNode;

/// Callbacks run by a record layer immediately before it writes a node.
///
/// The record layer owns the transaction: it opens one, calls the hook,
/// performs its own write with the fields the hook left on the node, and
/// commits, or rolls back if either step failed.
pub trait LifecycleHooks<N: TreeNode> {
    /// Failure type of the hooks.
    type Error;

    /// The node is about to be stored for the first time.
    ///
    /// Computes its fields from its parent assignment.
    fn before_insert(&mut self, node: &mut N) -> Result<(), Self::Error>;

    /// An already stored node is about to be saved again.
    ///
    /// If its parent assignment differs from the stored one, the tree is
    /// rewritten and the node's fields updated; otherwise its fields are
    /// refreshed from the store.
    fn before_update(&mut self, node: &mut N) -> Result<(), Self::Error>;

    /// The node is about to be removed. Its descendants must be removed first.
    fn before_delete(&mut self, node: &N) -> Result<(), Self::Error>;
}

impl<S, N> LifecycleHooks<N> for TreeManager<S>
where
    S: Store,
    N: TreeNode<Key = S::Key>,
{
    type Error = TreeError<S::Error>;

    fn before_insert(&mut self, node: &mut N) -> Result<(), Self::Error> {
        self.place(node)
    }

    fn before_update(&mut self, node: &mut N) -> Result<(), Self::Error> {
        self.reparent(node)
    }

    fn before_delete(&mut self, node: &N) -> Result<(), Self::Error> {
        let key = node.key().ok_or(TreeError::NodeNotFound)?;
        self.release(key)
    }
}
