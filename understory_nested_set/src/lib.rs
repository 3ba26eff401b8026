// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_nested_set --heading-base-level=0

//! Understory Nested Set: a nested-set (MPTT) tree engine over a flat store.
//!
//! Understory Nested Set keeps a forest of hierarchical records in a flat,
//! table-like store and answers hierarchy questions with range comparisons
//! instead of recursive walks.
//!
//! - Every node carries `left`, `right`, `tree_id` and `level`
//!   ([`TreeFields`]), computed by the engine.
//! - Ancestors, descendants and subtree sizes are single range scans or pure
//!   arithmetic on the boundaries.
//! - Insertion, deletion, re-parenting (also across trees) and positional
//!   moves rewrite whole ranges of rows, atomically, inside a store
//!   transaction.
//!
//! ## Encoding
//!
//! Within one tree of `n` nodes the boundary values are exactly `1..=2n`. A
//! node's descendants are the rows whose `left` lies strictly between its own
//! `left` and `right`, so `(right - left - 1) / 2` is its descendant count.
//! Trees are partitioned by `tree_id`; boundaries of different trees are
//! unrelated.
//!
//! ## Where this fits
//!
//! Storage is pluggable through the [`Store`][understory_nested_store::Store]
//! trait from `understory_nested_store`. The engine only ever issues one write
//! shape, a conditional bulk [`RangeUpdate`][understory_nested_store::RangeUpdate],
//! which maps onto a single SQL `UPDATE ... CASE` statement or an equivalent
//! batch in other engines. An in-memory reference store is included there.
//!
//! ## API overview
//!
//! - [`TreeManager`]: the engine. Owns the store handle.
//!   - Primitives: [`create_space`](TreeManager::create_space),
//!     [`close_gap`](TreeManager::close_gap),
//!     [`shift_range_and_relevel`](TreeManager::shift_range_and_relevel),
//!     [`next_tree_id`](TreeManager::next_tree_id).
//!   - Re-parenting: [`make_root_node`](TreeManager::make_root_node),
//!     [`make_child_node`](TreeManager::make_child_node),
//!     [`move_to_new_tree`](TreeManager::move_to_new_tree),
//!     [`move_within_tree`](TreeManager::move_within_tree), and the positional
//!     [`move_to`](TreeManager::move_to) with a [`Position`].
//!   - Queries: [`ancestors`](TreeManager::ancestors),
//!     [`descendants`](TreeManager::descendants),
//!     [`descendant_count`](TreeManager::descendant_count),
//!     [`children`](TreeManager::children), [`siblings`](TreeManager::siblings),
//!     [`root`](TreeManager::root), [`drilldown`](TreeManager::drilldown) and more.
//! - [`LifecycleHooks`]: `before_insert` / `before_update` / `before_delete`,
//!   implemented by [`TreeManager`] for any [`TreeNode`].
//! - [`Forest`]: a small record layer over a
//!   [`RecordStore`][understory_nested_store::RecordStore] that drives the hooks
//!   transactionally. Configured with [`TreeOptions`].
//! - [`check::validate`]: verifies every encoding invariant of a tree.
//! - [`tree_item_iterator`]: annotates rows in tree order with where levels open
//!   and close.
//!
//! ## Errors
//!
//! Every fallible call returns [`TreeResult`]. Shape violations
//! ([`InvalidParent`], [`InvalidMove`]) are detected before the first write;
//! store failures roll the whole operation back.
//!
//! # Example
//!
//! ```rust
//! use understory_nested_set::{Forest, TreeNode};
//! use understory_nested_store::backends::MemoryStore;
//!
//! let mut forest = Forest::new(MemoryStore::new());
//! let action = forest.create(None, "Action").unwrap();
//! let platformer = forest.create(action.key(), "Platformer").unwrap();
//! let two_d = forest.create(platformer.key(), "2D Platformer").unwrap();
//!
//! let f = forest.get(action.key().unwrap()).unwrap().tree_fields().unwrap();
//! assert_eq!((f.left, f.right), (1, 6));
//!
//! let tree = forest.manager();
//! let path = tree.ancestors(two_d.key().unwrap(), false).unwrap();
//! assert_eq!(path.len(), 2);
//! assert_eq!(tree.descendant_count(action.key().unwrap()).unwrap(), 2);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod check;
mod error;
mod forest;
mod hooks;
mod lifecycle;
mod manager;
mod query;
mod types;
mod util;

pub use check::InvariantViolation;
pub use error::{InvalidMove, InvalidParent, TreeError, TreeResult};
pub use forest::Forest;
pub use hooks::LifecycleHooks;
pub use manager::TreeManager;
pub use types::{Node, Position, TreeNode, TreeOptions};
pub use util::{Leveled, TreeItemInfo, TreeItems, tree_item_iterator};

pub use understory_nested_store::{Record, TreeFields, TreeId};
