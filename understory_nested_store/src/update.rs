// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bulk conditional updates over one tree.
//!
//! A [`RangeUpdate`] is the only write shape the engine issues against a store.
//! It corresponds to a single SQL statement of the form
//!
//! ```text
//! UPDATE rows
//! SET left  = CASE WHEN left  IN span_a THEN left  + da WHEN left  IN span_b THEN left  + db ELSE left  END,
//!     right = CASE WHEN right IN span_a THEN right + da WHEN right IN span_b THEN right + db ELSE right END,
//!     level = CASE WHEN left  IN span_c THEN level + dc ELSE level END,
//!     tree_id = <retag or unchanged>
//! WHERE tree_id = <tree> AND left IN <rows>
//! ```
//!
//! Every condition reads the row's values from before the update, so the
//! clauses never observe each other's output.

use smallvec::SmallVec;

use crate::error::{StoreError, StoreResult};
use crate::types::{Span, TreeFields, TreeId};

/// Add `delta` to values that fall in `span`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Shift {
    /// Values the shift applies to, tested before the update.
    pub span: Span,
    /// Signed amount added to matching values.
    pub delta: i64,
}

/// Ordered clauses for one column; the first clause whose span matches wins.
pub type Rewrite = SmallVec<[Shift; 2]>;

/// One bulk rewrite of the rows of a single tree.
///
/// ```rust
/// use understory_nested_store::{RangeUpdate, Span, TreeFields, TreeId};
///
/// // Open a gap of two values after boundary 3 in tree 1.
/// let update = RangeUpdate::new(TreeId(1)).shift_bounds(Span::above(3), 2);
///
/// let root = TreeFields { left: 1, right: 4, tree_id: TreeId(1), level: 0 };
/// let moved = update.apply(&root).unwrap().unwrap();
/// assert_eq!((moved.left, moved.right), (1, 6));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeUpdate {
    /// Tree whose rows are candidates.
    pub tree_id: TreeId,
    /// Only rows whose `left` lies in this span are touched.
    pub rows: Span,
    /// Clauses rewriting `left`, keyed on `left`.
    pub left: Rewrite,
    /// Clauses rewriting `right`, keyed on `right`.
    pub right: Rewrite,
    /// Clauses rewriting `level`, keyed on `left`.
    pub level: Rewrite,
    /// New tree id for every touched row.
    pub retag: Option<TreeId>,
}

impl RangeUpdate {
    /// An update of `tree_id` that selects every row and changes nothing yet.
    pub fn new(tree_id: TreeId) -> Self {
        Self {
            tree_id,
            rows: Span::ALL,
            left: Rewrite::new(),
            right: Rewrite::new(),
            level: Rewrite::new(),
            retag: None,
        }
    }

    /// Restrict the touched rows to those whose `left` lies in `span`.
    pub fn rows(mut self, span: Span) -> Self {
        self.rows = span;
        self
    }

    /// Add `delta` to every `left` and every `right` lying in `span`.
    pub fn shift_bounds(mut self, span: Span, delta: i64) -> Self {
        if delta != 0 && !span.is_empty() {
            self.left.push(Shift { span, delta });
            self.right.push(Shift { span, delta });
        }
        self
    }

    /// Add `delta` to `level` for rows whose `left` lies in `span`.
    pub fn shift_level(mut self, span: Span, delta: i64) -> Self {
        if delta != 0 && !span.is_empty() {
            self.level.push(Shift { span, delta });
        }
        self
    }

    /// Move every touched row into `tree_id`.
    pub fn retag(mut self, tree_id: TreeId) -> Self {
        if tree_id != self.tree_id {
            self.retag = Some(tree_id);
        }
        self
    }

    /// Whether applying this update can change any row.
    pub fn is_noop(&self) -> bool {
        self.rows.is_empty()
            || (self.left.is_empty()
                && self.right.is_empty()
                && self.level.is_empty()
                && self.retag.is_none())
    }

    /// Whether a row with these fields is touched by the update.
    #[inline]
    pub fn selects(&self, fields: &TreeFields) -> bool {
        fields.tree_id == self.tree_id && self.rows.contains(fields.left)
    }

    /// Compute the new fields of one row.
    ///
    /// Returns `Ok(None)` when the row is not selected or would be unchanged.
    /// Stores evaluate every row before writing any, so an out-of-range
    /// result aborts the whole update.
    pub fn apply(&self, fields: &TreeFields) -> StoreResult<Option<TreeFields>> {
        if !self.selects(fields) {
            return Ok(None);
        }
        let next = TreeFields {
            left: rewrite(fields.left, fields.left, &self.left)?,
            right: rewrite(fields.right, fields.right, &self.right)?,
            level: rewrite(fields.level, fields.left, &self.level)?,
            tree_id: self.retag.unwrap_or(fields.tree_id),
        };
        Ok((next != *fields).then_some(next))
    }
}

fn rewrite(value: u32, key: u32, clauses: &[Shift]) -> StoreResult<u32> {
    let Some(shift) = clauses.iter().find(|s| s.span.contains(key)) else {
        return Ok(value);
    };
    i64::from(value)
        .checked_add(shift.delta)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(StoreError::OutOfRange {
            value,
            delta: shift.delta,
        })
}
