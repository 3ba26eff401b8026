// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the engine: the node capability trait, a plain node, move positions and options.

use core::fmt::Debug;
use core::hash::Hash;

use understory_nested_store::TreeFields;

/// What the engine needs from a caller's node type.
///
/// A node knows its persisted identity (once it has one), the parent the
/// caller assigned to it, and the encoded fields the engine last computed.
/// The engine writes the fields; callers only ever change the parent.
pub trait TreeNode {
    /// Row identity, shared with the store.
    type Key: Copy + Eq + Hash + Debug;

    /// Persisted identity, `None` until the node has been stored.
    fn key(&self) -> Option<Self::Key>;

    /// Parent currently assigned by the caller.
    fn parent(&self) -> Option<Self::Key>;

    /// Assign a new parent.
    fn set_parent(&mut self, parent: Option<Self::Key>);

    /// Encoded fields as last computed by the engine.
    fn tree_fields(&self) -> Option<TreeFields>;

    /// Store freshly computed fields on the node.
    fn set_tree_fields(&mut self, fields: TreeFields);

    /// Whether the node has no parent.
    fn is_root_node(&self) -> bool {
        self.parent().is_none()
    }

    /// Whether the node has a parent.
    fn is_child_node(&self) -> bool {
        self.parent().is_some()
    }

    /// Whether the node's last known fields enclose no descendants.
    fn is_leaf_node(&self) -> bool {
        self.tree_fields().is_some_and(|f| f.is_leaf())
    }
}

/// A plain node carrying a payload, used by [`Forest`][crate::Forest].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node<K, V> {
    pub(crate) key: Option<K>,
    pub(crate) fields: Option<TreeFields>,
    /// Assigned parent; change it and save the node to re-parent it.
    pub parent: Option<K>,
    /// Caller payload.
    pub value: V,
}

impl<K, V> Node<K, V> {
    /// A new, unsaved node.
    pub fn new(parent: Option<K>, value: V) -> Self {
        Self {
            key: None,
            fields: None,
            parent,
            value,
        }
    }

    /// Key assigned by the store, `None` until the node has been saved.
    pub fn key(&self) -> Option<K>
    where
        K: Copy,
    {
        self.key
    }

    /// Fields as of the last save or load.
    pub fn fields(&self) -> Option<TreeFields> {
        self.fields
    }

    pub(crate) fn stored(key: K, parent: Option<K>, fields: TreeFields, value: V) -> Self {
        Self {
            key: Some(key),
            fields: Some(fields),
            parent,
            value,
        }
    }
}

impl<K: Copy + Eq + Hash + Debug, V> TreeNode for Node<K, V> {
    type Key = K;

    fn key(&self) -> Option<K> {
        self.key
    }

    fn parent(&self) -> Option<K> {
        self.parent
    }

    fn set_parent(&mut self, parent: Option<K>) {
        self.parent = parent;
    }

    fn tree_fields(&self) -> Option<TreeFields> {
        self.fields
    }

    fn set_tree_fields(&mut self, fields: TreeFields) {
        self.fields = Some(fields);
    }
}

/// Where [`TreeManager::move_to`][crate::TreeManager::move_to] places a node
/// relative to its target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Position {
    /// Leftmost child of the target.
    FirstChild,
    /// Rightmost child of the target.
    LastChild,
    /// Sibling immediately before the target.
    Left,
    /// Sibling immediately after the target.
    Right,
}

/// Behavior switches for [`Forest`][crate::Forest].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeOptions {
    /// Validate the touched trees after every committed operation and panic
    /// on a violation. Defaults to on in debug builds.
    pub check_invariants: bool,
    /// Delete a node's descendants along with it. When off, deleting a node
    /// that still has children fails before anything is changed.
    pub cascade_deletes: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            check_invariants: cfg!(debug_assertions),
            cascade_deletes: true,
        }
    }
}

impl TreeOptions {
    /// Options with their default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn post-commit validation on or off.
    pub fn check_invariants(mut self, on: bool) -> Self {
        self.check_invariants = on;
        self
    }

    /// Turn cascading deletes on or off.
    pub fn cascade_deletes(mut self, on: bool) -> Self {
        self.cascade_deletes = on;
        self
    }
}
