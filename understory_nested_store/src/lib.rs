// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_nested_store --heading-base-level=0

//! Understory Nested Store: the row model and storage seam of a nested-set forest.
//!
//! A forest of trees is stored as flat rows. Each row carries four derived
//! integers, its [`TreeFields`]: `left` and `right` boundaries from a preorder
//! walk, the [`TreeId`] of the tree it belongs to, and its `level` below the root.
//! Ancestry becomes interval containment, so subtree reads are single range scans.
//!
//! This crate holds everything a storage engine needs to know:
//!
//! - The row model: [`TreeFields`], [`Span`], [`StoredRow`] and [`Record`].
//! - Read predicates: [`Filter`].
//! - The single write shape: [`RangeUpdate`], a conditional bulk rewrite of one
//!   tree, equivalent to one `UPDATE ... SET x = CASE ... END WHERE tree_id = ?`.
//! - The storage traits: [`Store`] (used by the tree engine) and [`RecordStore`]
//!   (row persistence for record layers).
//!
//! The tree algorithms themselves live in `understory_nested_set`.
//!
//! ## Features
//!
//! - `memory_store` *(default)*: enables [`backends::MemoryStore`], backed by
//!   `hashbrown` and logging through `tracing`. Disable it to avoid both
//!   dependencies when bringing your own store.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "memory_store")]
//! # {
//! use understory_nested_store::backends::MemoryStore;
//! use understory_nested_store::{Filter, RangeUpdate, RecordStore, Span, Store, TreeFields, TreeId};
//!
//! let mut store = MemoryStore::new();
//! let root = store
//!     .insert(None, TreeFields::root(TreeId::FIRST), "root")
//!     .unwrap();
//!
//! // Make room for a child: every boundary after 1 moves right by two.
//! store
//!     .update(&RangeUpdate::new(TreeId::FIRST).shift_bounds(Span::above(1), 2))
//!     .unwrap();
//! let child = TreeFields { left: 2, right: 3, tree_id: TreeId::FIRST, level: 1 };
//! store.insert(Some(root), child, "child").unwrap();
//!
//! let rows = store.query(&Filter::tree(TreeId::FIRST)).unwrap();
//! assert_eq!(rows.len(), 2);
//! assert_eq!((rows[0].fields.left, rows[0].fields.right), (1, 4));
//! # }
//! ```

#![no_std]

extern crate alloc;

pub mod backends;
mod error;
mod store;
mod types;
mod update;

pub use error::{StoreError, StoreResult};
pub use store::{RecordStore, Store};
pub use types::{Filter, Record, Span, StoredRow, TreeFields, TreeId};
pub use update::{RangeUpdate, Rewrite, Shift};
