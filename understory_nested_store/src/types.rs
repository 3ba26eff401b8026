// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Row model: tree identifiers, the encoded fields of a node, and row predicates.

use core::fmt;

/// Identifier of one tree in the forest.
///
/// `left`/`right` values are only comparable between rows sharing a `TreeId`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeId(pub u32);

impl TreeId {
    /// The id handed out for the first tree of an empty store.
    pub const FIRST: Self = Self(1);

    /// The id following this one, or `None` once the id space is exhausted.
    #[inline]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree#{}", self.0)
    }
}

/// The four derived integers that encode a node's position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TreeFields {
    /// Left boundary; the node's subtree lies strictly between `left` and `right`.
    pub left: u32,
    /// Right boundary.
    pub right: u32,
    /// Tree this node belongs to.
    pub tree_id: TreeId,
    /// Depth below the root (roots are level 0).
    pub level: u32,
}

impl TreeFields {
    /// Fields of a lone root node in `tree_id`.
    #[inline]
    pub const fn root(tree_id: TreeId) -> Self {
        Self {
            left: 1,
            right: 2,
            tree_id,
            level: 0,
        }
    }

    /// Number of boundary values occupied by this node and its subtree.
    #[inline]
    pub const fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    /// Number of descendants, derived from the boundaries alone.
    #[inline]
    pub const fn descendant_count(&self) -> u32 {
        (self.right - self.left - 1) / 2
    }

    /// Whether the node has no descendants.
    #[inline]
    pub const fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }

    /// Whether `other` lies strictly inside this node's subtree.
    #[inline]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.tree_id == other.tree_id && self.left < other.left && self.right > other.right
    }

    /// The closed range `[left, right]` covered by this node's subtree.
    #[inline]
    pub const fn span(&self) -> Span {
        Span::new(self.left, self.right)
    }

    /// The open range `(left, right)` holding only the descendants.
    #[inline]
    pub const fn interior(&self) -> Span {
        Span::new(self.left + 1, self.right - 1)
    }
}

/// Closed range of boundary values, `start..=end`.
///
/// A span with `end < start` is empty and matches nothing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    /// First value in the span.
    pub start: u32,
    /// Last value in the span.
    pub end: u32,
}

impl Span {
    /// Every representable value.
    pub const ALL: Self = Self::new(0, u32::MAX);

    /// The canonical empty span.
    pub const EMPTY: Self = Self::new(1, 0);

    /// Create a span from its inclusive bounds.
    #[inline(always)]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// The single value `value`.
    #[inline]
    pub const fn at(value: u32) -> Self {
        Self::new(value, value)
    }

    /// Every value strictly greater than `value`.
    #[inline]
    pub const fn above(value: u32) -> Self {
        match value.checked_add(1) {
            Some(start) => Self::new(start, u32::MAX),
            None => Self::EMPTY,
        }
    }

    /// Every value strictly less than `value`.
    #[inline]
    pub const fn below(value: u32) -> Self {
        match value.checked_sub(1) {
            Some(end) => Self::new(0, end),
            None => Self::EMPTY,
        }
    }

    /// Whether the span matches nothing.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Whether `value` lies in the span.
    #[inline]
    pub const fn contains(&self, value: u32) -> bool {
        self.start <= value && value <= self.end
    }

    /// Whether the two spans share at least one value.
    #[inline]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.start <= other.end
            && other.start <= self.end
    }
}

/// A stored row as the engine sees it: parent reference plus encoded fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StoredRow<K> {
    /// Parent as currently persisted, `None` for roots.
    pub parent: Option<K>,
    /// Encoded position as currently persisted.
    pub fields: TreeFields,
}

/// A row yielded by [`Store::visit`][crate::Store::visit].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Record<K> {
    /// Row identity.
    pub key: K,
    /// Encoded position.
    pub fields: TreeFields,
}

/// Row predicate used for reads.
///
/// All conditions are combined with AND. Build one with the constructors and
/// chain the narrowing methods, in the same manner as a query filter:
///
/// ```rust
/// use understory_nested_store::{Filter, Span, TreeId};
///
/// // Rows of tree 3 strictly inside (4, 11), one level below a level-1 node.
/// let children = Filter::tree(TreeId(3))
///     .left(Span::new(5, 10))
///     .level(2);
/// assert!(!children.is_unsatisfiable());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    /// Restrict to one tree; `None` matches every tree.
    pub tree_id: Option<TreeId>,
    /// Allowed `left` values.
    pub left: Span,
    /// Allowed `right` values.
    pub right: Span,
    /// Required `level`, if any.
    pub level: Option<u32>,
}

impl Default for Filter {
    fn default() -> Self {
        Self::all()
    }
}

impl Filter {
    /// Match every row of every tree.
    pub const fn all() -> Self {
        Self {
            tree_id: None,
            left: Span::ALL,
            right: Span::ALL,
            level: None,
        }
    }

    /// Match every row of one tree.
    pub const fn tree(tree_id: TreeId) -> Self {
        Self {
            tree_id: Some(tree_id),
            ..Self::all()
        }
    }

    /// Restrict `left` to `span`.
    pub const fn left(mut self, span: Span) -> Self {
        self.left = span;
        self
    }

    /// Restrict `right` to `span`.
    pub const fn right(mut self, span: Span) -> Self {
        self.right = span;
        self
    }

    /// Require `level == level`.
    pub const fn level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    /// Whether no row can possibly match.
    pub const fn is_unsatisfiable(&self) -> bool {
        self.left.is_empty() || self.right.is_empty()
    }

    /// Check whether a row's fields satisfy this filter.
    pub fn matches(&self, fields: &TreeFields) -> bool {
        self.tree_id.is_none_or(|t| t == fields.tree_id)
            && self.left.contains(fields.left)
            && self.right.contains(fields.right)
            && self.level.is_none_or(|l| l == fields.level)
    }
}
