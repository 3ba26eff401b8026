// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Consistency checks for the stored encoding.
//!
//! [`validate`] walks one tree in `left` order and verifies that
//!
//! - its boundary values are exactly `1..=2n`,
//! - every interval is non-empty and encloses an even number of values,
//! - intervals nest without crossing under a single root,
//! - each row's stored parent is its nearest enclosing row,
//! - levels grow by one per step.
//!
//! It reports the first problem found.

use alloc::collections::BTreeSet;
use alloc::vec;

use smallvec::SmallVec;
use thiserror::Error;
use understory_nested_store::{Filter, Store, TreeId};

use crate::error::{TreeError, TreeResult};

/// A broken encoding invariant.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// A boundary value in `1..=2n` is unused, or a value lies outside it.
    #[error("{tree}: boundary value {value} is missing or out of range")]
    Gap {
        /// Tree being checked.
        tree: TreeId,
        /// Offending value.
        value: u32,
    },
    /// Two rows share a boundary value.
    #[error("{tree}: boundary value {value} is used twice")]
    Duplicate {
        /// Tree being checked.
        tree: TreeId,
        /// Offending value.
        value: u32,
    },
    /// `left >= right`, or the interval holds an odd number of inner values.
    #[error("{tree}: interval ({left}, {right}) is malformed")]
    EmptyInterval {
        /// Tree being checked.
        tree: TreeId,
        /// Left boundary of the row.
        left: u32,
        /// Right boundary of the row.
        right: u32,
    },
    /// The stored parent is not the nearest enclosing row.
    #[error("{tree}: row at {left} has the wrong parent")]
    WrongParent {
        /// Tree being checked.
        tree: TreeId,
        /// Left boundary of the row.
        left: u32,
    },
    /// The stored level disagrees with the nesting depth.
    #[error("{tree}: row at {left} has level {found}, expected {expected}")]
    WrongLevel {
        /// Tree being checked.
        tree: TreeId,
        /// Left boundary of the row.
        left: u32,
        /// Depth implied by the nesting.
        expected: u32,
        /// Stored level.
        found: u32,
    },
    /// The row is not enclosed by the tree's root, or its interval crosses
    /// the interval of an enclosing row.
    #[error("{tree}: row at {left} is not nested under the root")]
    OrphanedRow {
        /// Tree being checked.
        tree: TreeId,
        /// Left boundary of the row.
        left: u32,
    },
}

/// Check every invariant for one tree.
///
/// An empty tree is valid. Store failures are reported as
/// [`TreeError::Store`], broken invariants as [`TreeError::Corrupted`].
pub fn validate<S: Store>(store: &S, tree: TreeId) -> TreeResult<(), S::Error> {
    let rows = store.query(&Filter::tree(tree)).map_err(TreeError::Store)?;
    let top = u32::try_from(rows.len() * 2).unwrap_or(u32::MAX);

    let mut seen = vec![false; rows.len() * 2 + 1];
    for row in &rows {
        let f = row.fields;
        if f.left >= f.right || (f.right - f.left) % 2 == 0 {
            return Err(InvariantViolation::EmptyInterval {
                tree,
                left: f.left,
                right: f.right,
            }
            .into());
        }
        for value in [f.left, f.right] {
            if value == 0 || value > top {
                return Err(InvariantViolation::Gap { tree, value }.into());
            }
            let slot = &mut seen[value as usize];
            if *slot {
                return Err(InvariantViolation::Duplicate { tree, value }.into());
            }
            *slot = true;
        }
    }
    if let Some(missing) = seen.iter().skip(1).position(|used| !used) {
        let value = u32::try_from(missing + 1).unwrap_or(u32::MAX);
        return Err(InvariantViolation::Gap { tree, value }.into());
    }

    // Enclosing rows of the current one: (key, right, level).
    let mut open: SmallVec<[(S::Key, u32, u32); 16]> = SmallVec::new();
    for row in &rows {
        let f = row.fields;
        while open.last().is_some_and(|&(_, right, _)| right < f.left) {
            open.pop();
        }
        let stored = store.row(row.key).map_err(TreeError::Store)?;
        let parent = stored.and_then(|s| s.parent);
        let (expected_parent, expected_level) = match open.last() {
            None if f.left == 1 => (None, 0),
            None => {
                return Err(InvariantViolation::OrphanedRow { tree, left: f.left }.into());
            }
            Some(&(key, right, level)) => {
                if f.right > right {
                    return Err(InvariantViolation::OrphanedRow { tree, left: f.left }.into());
                }
                (Some(key), level + 1)
            }
        };
        if parent != expected_parent {
            return Err(InvariantViolation::WrongParent { tree, left: f.left }.into());
        }
        if f.level != expected_level {
            return Err(InvariantViolation::WrongLevel {
                tree,
                left: f.left,
                expected: expected_level,
                found: f.level,
            }
            .into());
        }
        open.push((row.key, f.right, f.level));
    }
    Ok(())
}

/// Check every tree in the store, in tree id order.
pub fn validate_all<S: Store>(store: &S) -> TreeResult<(), S::Error> {
    let mut trees = BTreeSet::new();
    store
        .visit(&Filter::all(), |record| {
            trees.insert(record.fields.tree_id);
        })
        .map_err(TreeError::Store)?;
    for tree in trees {
        validate(store, tree)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_nested_store::backends::{MemoryStore, RowId};
    use understory_nested_store::{RecordStore, StoreError, TreeFields};

    fn put(
        store: &mut MemoryStore<()>,
        parent: Option<RowId>,
        (left, right, level): (u32, u32, u32),
    ) -> RowId {
        let fields = TreeFields {
            left,
            right,
            tree_id: TreeId(1),
            level,
        };
        store.insert(parent, fields, ()).unwrap()
    }

    fn violation(store: &MemoryStore<()>) -> InvariantViolation {
        match validate(store, TreeId(1)) {
            Err(TreeError::Corrupted(v)) => v,
            other => panic!("expected a violation, got {other:?}"),
        }
    }

    #[test]
    fn well_formed_tree_passes() {
        let mut store = MemoryStore::new();
        let root = put(&mut store, None, (1, 6, 0));
        let a = put(&mut store, Some(root), (2, 5, 1));
        put(&mut store, Some(a), (3, 4, 2));
        assert_eq!(validate(&store, TreeId(1)), Ok::<(), TreeError<StoreError>>(()));
        assert_eq!(validate(&store, TreeId(7)), Ok(()));
        assert_eq!(validate_all(&store), Ok(()));
    }

    #[test]
    fn gaps_and_duplicates() {
        let mut store = MemoryStore::new();
        let root = put(&mut store, None, (1, 6, 0));
        put(&mut store, Some(root), (2, 3, 1));
        assert_eq!(
            violation(&store),
            InvariantViolation::Gap {
                tree: TreeId(1),
                value: 6
            }
        );

        let mut store = MemoryStore::new();
        let root = put(&mut store, None, (1, 4, 0));
        put(&mut store, Some(root), (1, 2, 1));
        assert_eq!(
            violation(&store),
            InvariantViolation::Duplicate {
                tree: TreeId(1),
                value: 1
            }
        );
    }

    #[test]
    fn validate_all_reports_the_lowest_broken_tree() {
        let mut store = MemoryStore::new();
        let at = |tree, right| TreeFields {
            left: 1,
            right,
            tree_id: TreeId(tree),
            level: 0,
        };
        store.insert(None, at(5, 4), ()).unwrap();
        store.insert(None, at(1, 2), ()).unwrap();
        store.insert(None, at(3, 6), ()).unwrap();
        assert_eq!(
            validate_all(&store),
            Err(TreeError::Corrupted(InvariantViolation::Gap {
                tree: TreeId(3),
                value: 6
            }))
        );
    }

    #[test]
    fn malformed_intervals() {
        let mut store = MemoryStore::new();
        put(&mut store, None, (1, 3, 0));
        assert!(matches!(
            violation(&store),
            InvariantViolation::EmptyInterval { left: 1, right: 3, .. }
        ));
    }

    #[test]
    fn crossing_intervals_are_orphans() {
        let mut store = MemoryStore::new();
        let root = put(&mut store, None, (1, 4, 0));
        put(&mut store, Some(root), (2, 5, 1));
        put(&mut store, Some(root), (3, 6, 1));
        assert!(matches!(
            violation(&store),
            InvariantViolation::OrphanedRow { left: 2, .. }
        ));
    }

    #[test]
    fn parent_and_level_must_match_nesting() {
        let mut store = MemoryStore::new();
        let root = put(&mut store, None, (1, 6, 0));
        put(&mut store, Some(root), (2, 5, 1));
        put(&mut store, Some(root), (3, 4, 2));
        assert_eq!(
            violation(&store),
            InvariantViolation::WrongParent {
                tree: TreeId(1),
                left: 3
            }
        );

        let mut store = MemoryStore::new();
        let root = put(&mut store, None, (1, 4, 0));
        put(&mut store, Some(root), (2, 3, 2));
        assert_eq!(
            violation(&store),
            InvariantViolation::WrongLevel {
                tree: TreeId(1),
                left: 2,
                expected: 1,
                found: 2
            }
        );
    }
}
