// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-side queries. None of these write to the store.

use alloc::vec::Vec;

use understory_nested_store::{Filter, Record, Span, Store};

use crate::error::{TreeError, TreeResult};
use crate::manager::TreeManager;

impl<S: Store> TreeManager<S> {
    /// Ancestors of `key`, root first; nearest first when `ascending`.
    ///
    /// Empty for roots.
    pub fn ancestors(
        &self,
        key: S::Key,
        ascending: bool,
    ) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        let f = self.fields_of(key)?;
        let mut rows = self.select(
            &Filter::tree(f.tree_id)
                .left(Span::below(f.left))
                .right(Span::above(f.right)),
        )?;
        if ascending {
            rows.reverse();
        }
        Ok(rows)
    }

    /// Descendants of `key` in preorder, optionally preceded by the node itself.
    pub fn descendants(
        &self,
        key: S::Key,
        include_self: bool,
    ) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        let f = self.fields_of(key)?;
        let span = if include_self { f.span() } else { f.interior() };
        self.select(&Filter::tree(f.tree_id).left(span))
    }

    /// Number of descendants of `key`, computed from its boundaries alone.
    pub fn descendant_count(&self, key: S::Key) -> TreeResult<u32, S::Error> {
        Ok(self.fields_of(key)?.descendant_count())
    }

    /// Immediate children of `key`, left to right.
    pub fn children(&self, key: S::Key) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        let f = self.fields_of(key)?;
        self.select(
            &Filter::tree(f.tree_id)
                .left(f.interior())
                .level(f.level + 1),
        )
    }

    /// Nodes sharing `key`'s parent, in tree order.
    ///
    /// The siblings of a root are the other roots, ordered by tree id.
    pub fn siblings(
        &self,
        key: S::Key,
        include_self: bool,
    ) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        let row = self.stored(key)?;
        let mut rows = match row.parent {
            Some(parent) => self.children(parent)?,
            None => self.roots()?,
        };
        if !include_self {
            rows.retain(|r| r.key != key);
        }
        Ok(rows)
    }

    /// The sibling right after `key`, if any.
    pub fn next_sibling(&self, key: S::Key) -> TreeResult<Option<Record<S::Key>>, S::Error> {
        let f = self.fields_of(key)?;
        if f.left == 1 {
            let roots = self.roots()?;
            return Ok(roots.into_iter().find(|r| r.fields.tree_id > f.tree_id));
        }
        let rows = self.select(
            &Filter::tree(f.tree_id)
                .left(Span::at(f.right + 1))
                .level(f.level),
        )?;
        Ok(rows.into_iter().next())
    }

    /// The sibling right before `key`, if any.
    pub fn previous_sibling(&self, key: S::Key) -> TreeResult<Option<Record<S::Key>>, S::Error> {
        let f = self.fields_of(key)?;
        if f.left == 1 {
            let roots = self.roots()?;
            return Ok(roots.into_iter().rev().find(|r| r.fields.tree_id < f.tree_id));
        }
        let rows = self.select(
            &Filter::tree(f.tree_id)
                .right(Span::at(f.left - 1))
                .level(f.level),
        )?;
        Ok(rows.into_iter().next())
    }

    /// The root of `key`'s tree.
    pub fn root(&self, key: S::Key) -> TreeResult<Record<S::Key>, S::Error> {
        let f = self.fields_of(key)?;
        self.select(&Filter::tree(f.tree_id).left(Span::at(1)))?
            .into_iter()
            .next()
            .ok_or(TreeError::NodeNotFound)
    }

    /// The roots of every tree, ordered by tree id.
    pub fn roots(&self) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        self.select(&Filter::all().left(Span::at(1)))
    }

    /// Ancestors of `key`, the node itself, then its children, in tree order.
    pub fn drilldown(&self, key: S::Key) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        let f = self.fields_of(key)?;
        let mut rows = self.ancestors(key, false)?;
        rows.push(Record { key, fields: f });
        rows.extend(self.children(key)?);
        Ok(rows)
    }

    /// Every row that `key` could be moved next to or below: all rows outside
    /// its own subtree, ordered by tree id and then `left`.
    pub fn valid_move_targets(&self, key: S::Key) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        let f = self.fields_of(key)?;
        let mut rows = self.all_ordered()?;
        rows.retain(|r| r.fields.tree_id != f.tree_id || !f.span().contains(r.fields.left));
        Ok(rows)
    }

    /// Every row, ordered by tree id and then `left`.
    pub fn all_ordered(&self) -> TreeResult<Vec<Record<S::Key>>, S::Error> {
        self.select(&Filter::all())
    }
}
