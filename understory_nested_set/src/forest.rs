// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A minimal record layer: persists [`Node`]s and drives the lifecycle hooks.

use core::fmt;

use smallvec::SmallVec;
use understory_nested_store::{RecordStore, TreeFields, TreeId};

use crate::check;
use crate::error::{TreeError, TreeResult};
use crate::hooks::LifecycleHooks;
use crate::manager::TreeManager;
use crate::types::{Node, Position, TreeOptions};

type Touched = SmallVec<[TreeId; 2]>;

/// A forest of payload-carrying nodes over a [`RecordStore`].
///
/// Every mutating call runs in one store transaction: the lifecycle hook
/// first, then the row write. Any failure rolls back both and leaves the
/// caller's node as it was. When [`TreeOptions::check_invariants`] is on, the
/// trees touched by a committed call are validated afterwards and a
/// violation panics.
///
/// ## Example
///
/// ```rust
/// use understory_nested_set::Forest;
/// use understory_nested_store::backends::MemoryStore;
///
/// let mut forest = Forest::new(MemoryStore::new());
/// let games = forest.create(None, "games").unwrap();
/// let wii = forest.create(games.key(), "wii").unwrap();
/// let mut ps3 = forest.create(games.key(), "ps3").unwrap();
///
/// // Re-parent by assigning the parent and saving.
/// ps3.parent = wii.key();
/// forest.save(&mut ps3).unwrap();
///
/// let below_wii = forest.manager().descendants(wii.key().unwrap(), false).unwrap();
/// assert_eq!(below_wii.len(), 1);
/// assert_eq!(forest.delete(games.key().unwrap()).unwrap(), 3);
/// ```
pub struct Forest<S: RecordStore> {
    manager: TreeManager<S>,
    options: TreeOptions,
}

impl<S: RecordStore + fmt::Debug> fmt::Debug for Forest<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("manager", &self.manager)
            .field("options", &self.options)
            .finish()
    }
}

impl<S: RecordStore> Forest<S> {
    /// A forest over `store` with default options.
    pub fn new(store: S) -> Self {
        Self::with_options(store, TreeOptions::default())
    }

    /// A forest over `store` with explicit options.
    pub fn with_options(store: S, options: TreeOptions) -> Self {
        Self {
            manager: TreeManager::new(store),
            options,
        }
    }

    /// Options in effect.
    pub fn options(&self) -> TreeOptions {
        self.options
    }

    /// The engine, for queries.
    pub fn manager(&self) -> &TreeManager<S> {
        &self.manager
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        self.manager.store()
    }

    /// Unwrap the store.
    pub fn into_store(self) -> S {
        self.manager.into_store()
    }

    /// Create and store a node below `parent`, or as a new root.
    pub fn create(
        &mut self,
        parent: Option<S::Key>,
        value: S::Value,
    ) -> TreeResult<Node<S::Key, S::Value>, S::Error> {
        let mut node = Node::new(parent, value);
        self.save(&mut node)?;
        Ok(node)
    }

    /// Load a stored node.
    pub fn get(&self, key: S::Key) -> TreeResult<Node<S::Key, S::Value>, S::Error> {
        let row = self.manager.stored(key)?;
        let value = self
            .manager
            .store()
            .value(key)
            .map_err(TreeError::Store)?
            .ok_or(TreeError::NodeNotFound)?;
        Ok(Node::stored(key, row.parent, row.fields, value))
    }

    /// Store a node: insert it if it is new, otherwise write back its parent
    /// and payload, re-parenting it if the parent changed.
    ///
    /// On success the node carries its key and current fields.
    pub fn save(&mut self, node: &mut Node<S::Key, S::Value>) -> TreeResult<(), S::Error> {
        let mut touched = Touched::new();
        if let Some(key) = node.key {
            touched.push(self.manager.fields_of(key)?.tree_id);
        }
        let before = (node.key, node.parent, node.fields);
        let result = self.manager.atomic("save", |m| match node.key {
            None => {
                m.before_insert(node)?;
                let fields = computed(node);
                let key = m
                    .store_mut()
                    .insert(node.parent, fields, node.value.clone())
                    .map_err(TreeError::Store)?;
                node.key = Some(key);
                Ok(fields)
            }
            Some(key) => {
                m.before_update(node)?;
                let fields = computed(node);
                let store = m.store_mut();
                store
                    .write(key, node.parent, fields)
                    .map_err(TreeError::Store)?;
                store
                    .write_value(key, node.value.clone())
                    .map_err(TreeError::Store)?;
                Ok(fields)
            }
        });
        match result {
            Ok(fields) => {
                touched.push(fields.tree_id);
                self.verify("save", &touched)
            }
            Err(err) => {
                (node.key, node.parent, node.fields) = before;
                Err(err)
            }
        }
    }

    /// Move a stored node relative to `target` and persist the result.
    pub fn move_to(
        &mut self,
        node: &mut Node<S::Key, S::Value>,
        target: S::Key,
        position: Position,
    ) -> TreeResult<(), S::Error> {
        let key = node.key.ok_or(TreeError::NodeNotFound)?;
        let mut touched = Touched::new();
        touched.push(self.manager.fields_of(key)?.tree_id);
        let before = (node.parent, node.fields);
        let result = self.manager.atomic("move_to", |m| {
            m.move_to(node, target, position)?;
            let fields = computed(node);
            m.store_mut()
                .write(key, node.parent, fields)
                .map_err(TreeError::Store)?;
            Ok(fields)
        });
        match result {
            Ok(fields) => {
                touched.push(fields.tree_id);
                self.verify("move_to", &touched)
            }
            Err(err) => {
                (node.parent, node.fields) = before;
                Err(err)
            }
        }
    }

    /// Delete a node and return how many rows were removed.
    ///
    /// With [`TreeOptions::cascade_deletes`] the node's descendants go first,
    /// deepest first; without it a node that still has children is refused
    /// with [`TreeError::HasChildren`].
    pub fn delete(&mut self, key: S::Key) -> TreeResult<usize, S::Error> {
        let cascade = self.options.cascade_deletes;
        let (tree, removed) = self.manager.atomic("delete", |m| {
            let tree = m.fields_of(key)?.tree_id;
            let doomed = m.descendants(key, true)?;
            if doomed.len() > 1 && !cascade {
                return Err(TreeError::HasChildren);
            }
            // Reverse preorder reaches every child before its parent.
            for record in doomed.iter().rev() {
                let node: Node<S::Key, ()> = Node::stored(record.key, None, record.fields, ());
                m.before_delete(&node)?;
                m.store_mut()
                    .remove(record.key)
                    .map_err(TreeError::Store)?;
            }
            Ok((tree, doomed.len()))
        })?;
        self.verify("delete", &[tree])?;
        Ok(removed)
    }

    fn verify(&self, op: &'static str, trees: &[TreeId]) -> TreeResult<(), S::Error> {
        if !self.options.check_invariants {
            return Ok(());
        }
        for &tree in trees {
            match check::validate(self.manager.store(), tree) {
                Err(TreeError::Corrupted(violation)) => {
                    panic!("nested-set invariants violated after {op}: {violation}")
                }
                other => other?,
            }
        }
        Ok(())
    }
}

fn computed<K, V>(node: &Node<K, V>) -> TreeFields {
    node.fields
        .expect("lifecycle hook invariant violated: fields not set")
}
