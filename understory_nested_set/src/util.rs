// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Helpers for walking flat lists of rows that are already in tree order.

use core::fmt;
use core::iter::Peekable;

use smallvec::SmallVec;
use understory_nested_store::{Record, TreeFields};

use crate::types::{Node, TreeNode};

/// Anything that knows its depth in a tree.
pub trait Leveled {
    /// Depth below the root.
    fn level(&self) -> u32;
}

impl Leveled for TreeFields {
    fn level(&self) -> u32 {
        self.level
    }
}

impl<K> Leveled for Record<K> {
    fn level(&self) -> u32 {
        self.fields.level
    }
}

impl<K, V> Leveled for Node<K, V>
where
    Self: TreeNode,
{
    fn level(&self) -> u32 {
        self.tree_fields().map_or(0, |f| f.level)
    }
}

impl<T: Leveled + ?Sized> Leveled for &T {
    fn level(&self) -> u32 {
        (**self).level()
    }
}

/// Structure around one item yielded by [`tree_item_iterator`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeItemInfo {
    /// The item sits deeper than the one before it, or is the first item.
    pub new_level: bool,
    /// Levels that end right after this item, deepest first.
    ///
    /// Empty when the next item is at the same depth or deeper.
    pub closed_levels: SmallVec<[u32; 4]>,
}

/// Pair each item with where it opens and closes levels.
///
/// `items` must be in tree order, e.g. the output of
/// [`TreeManager::descendants`][crate::TreeManager::descendants]. This is
/// what a renderer needs to emit nested lists from a flat query result.
///
/// ```rust
/// use understory_nested_set::tree_item_iterator;
/// use understory_nested_store::{TreeFields, TreeId};
///
/// let at = |left, right, level| TreeFields { left, right, tree_id: TreeId(1), level };
/// let rows = [at(1, 6, 0), at(2, 3, 1), at(4, 5, 1)];
///
/// let infos: Vec<_> = tree_item_iterator(rows).map(|(_, info)| info).collect();
/// assert!(infos[0].new_level && infos[1].new_level && !infos[2].new_level);
/// assert!(infos[1].closed_levels.is_empty());
/// assert_eq!(infos[2].closed_levels.as_slice(), &[1, 0]);
/// ```
pub fn tree_item_iterator<I>(items: I) -> TreeItems<I::IntoIter>
where
    I: IntoIterator,
    I::Item: Leveled,
{
    TreeItems {
        items: items.into_iter().peekable(),
        previous: None,
    }
}

/// Iterator returned by [`tree_item_iterator`].
pub struct TreeItems<I: Iterator> {
    items: Peekable<I>,
    previous: Option<u32>,
}

impl<I: Iterator> fmt::Debug for TreeItems<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeItems")
            .field("previous_level", &self.previous)
            .finish_non_exhaustive()
    }
}

impl<I> Iterator for TreeItems<I>
where
    I: Iterator,
    I::Item: Leveled,
{
    type Item = (I::Item, TreeItemInfo);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.items.next()?;
        let level = current.level();
        let new_level = self.previous.is_none_or(|previous| previous < level);
        let floor = match self.items.peek() {
            Some(next) => next.level().saturating_add(1),
            None => 0,
        };
        let closed_levels = (floor..=level).rev().collect();
        self.previous = Some(level);
        Some((
            current,
            TreeItemInfo {
                new_level,
                closed_levels,
            },
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}
