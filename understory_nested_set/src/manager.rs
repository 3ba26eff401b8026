// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The tree manager: store handle, range-rewrite primitives, tree-id allocation.

use alloc::vec::Vec;
use core::fmt;

use understory_nested_store::{
    Filter, RangeUpdate, Record, Span, Store, StoredRow, TreeFields, TreeId,
};

use crate::error::{TreeError, TreeResult};

/// Nested-set maintenance over a [`Store`].
///
/// The manager owns the store handle. Lifecycle operations (placement,
/// deletion, re-parenting, positional moves) and the read-side queries are
/// all methods on it; each lifecycle operation runs in its own store
/// transaction, nested inside any transaction the caller already opened.
///
/// Stored fields are always re-read before they are used, so a node value
/// held by the caller may be stale without harm.
///
/// ## Example
///
/// ```rust
/// use understory_nested_set::{LifecycleHooks, Node, TreeManager, TreeNode};
/// use understory_nested_store::backends::MemoryStore;
/// use understory_nested_store::RecordStore;
///
/// let mut tree = TreeManager::new(MemoryStore::new());
///
/// // Place a root, then persist it with the fields the engine computed.
/// let mut root = Node::new(None, "root");
/// tree.before_insert(&mut root).unwrap();
/// let fields = root.tree_fields().unwrap();
/// let key = tree.store_mut().insert(None, fields, "root").unwrap();
///
/// assert_eq!((fields.left, fields.right, fields.level), (1, 2, 0));
/// assert_eq!(tree.descendant_count(key).unwrap(), 0);
/// ```
///
/// Most callers use [`Forest`][crate::Forest], which drives these steps.
pub struct TreeManager<S: Store> {
    store: S,
}

impl<S: Store + fmt::Debug> fmt::Debug for TreeManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeManager")
            .field("store", &self.store)
            .finish()
    }
}

impl<S: Store + Default> Default for TreeManager<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Store> TreeManager<S> {
    /// Wrap a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the underlying store, for persisting rows.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Unwrap the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Add `width` to every `left` and `right` greater than `target` in `tree`.
    pub fn create_space(
        &mut self,
        width: u32,
        target: u32,
        tree: TreeId,
    ) -> TreeResult<usize, S::Error> {
        self.apply(&RangeUpdate::new(tree).shift_bounds(Span::above(target), i64::from(width)))
    }

    /// Subtract `width` from every `left` and `right` greater than `target` in `tree`.
    pub fn close_gap(
        &mut self,
        width: u32,
        target: u32,
        tree: TreeId,
    ) -> TreeResult<usize, S::Error> {
        self.apply(&RangeUpdate::new(tree).shift_bounds(Span::above(target), -i64::from(width)))
    }

    /// Shift two disjoint ranges of boundary values at once and re-level the
    /// rows of the first.
    ///
    /// Values inside `moving` get `moving_delta`, values inside `other` get
    /// `other_delta`, and rows whose `left` lies in `moving` get `level_delta`.
    /// Every condition tests the values from before the update.
    pub fn shift_range_and_relevel(
        &mut self,
        tree: TreeId,
        moving: Span,
        moving_delta: i64,
        other: Span,
        other_delta: i64,
        level_delta: i64,
    ) -> TreeResult<usize, S::Error> {
        debug_assert!(
            !moving.overlaps(&other),
            "shifted ranges must be disjoint: {moving:?} / {other:?}"
        );
        self.apply(
            &RangeUpdate::new(tree)
                .shift_bounds(moving, moving_delta)
                .shift_bounds(other, other_delta)
                .shift_level(moving, level_delta),
        )
    }

    /// One more than the largest tree id in use, or [`TreeId::FIRST`] for an
    /// empty store.
    ///
    /// Call it inside the transaction that creates the tree it serves.
    pub fn next_tree_id(&self) -> TreeResult<TreeId, S::Error> {
        match self.store.max_tree_id().map_err(TreeError::Store)? {
            None => Ok(TreeId::FIRST),
            Some(max) => max.next().ok_or(TreeError::TreeIdsExhausted),
        }
    }

    pub(crate) fn apply(&mut self, update: &RangeUpdate) -> TreeResult<usize, S::Error> {
        if update.is_noop() {
            return Ok(0);
        }
        let changed = self.store.update(update).map_err(TreeError::Store)?;
        tracing::trace!(tree = %update.tree_id, changed, ?update, "range update");
        Ok(changed)
    }

    /// Run `op` inside a store transaction, rolling back if it fails.
    pub(crate) fn atomic<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self) -> TreeResult<T, S::Error>,
    ) -> TreeResult<T, S::Error> {
        self.store.begin().map_err(TreeError::Store)?;
        let err = match op(self) {
            Ok(value) => match self.store.commit() {
                Ok(()) => return Ok(value),
                Err(commit) => TreeError::Store(commit),
            },
            Err(err) => err,
        };
        tracing::warn!(op = name, error = %err, "rolling back");
        if let Err(rollback) = self.store.rollback() {
            tracing::warn!(op = name, error = %rollback, "rollback failed");
        }
        Err(err)
    }

    /// Stored parent and fields of `key`.
    pub(crate) fn stored(&self, key: S::Key) -> TreeResult<StoredRow<S::Key>, S::Error> {
        self.store
            .row(key)
            .map_err(TreeError::Store)?
            .ok_or(TreeError::NodeNotFound)
    }

    /// Stored fields of `key`.
    pub(crate) fn fields_of(&self, key: S::Key) -> TreeResult<TreeFields, S::Error> {
        self.stored(key).map(|row| row.fields)
    }

    /// Rows matching `filter`, ordered by tree id and then `left`.
    pub(crate) fn select(&self, filter: &Filter) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        self.store.query(filter).map_err(TreeError::Store)
    }
}
