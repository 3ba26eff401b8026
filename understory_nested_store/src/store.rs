// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Store traits consumed by the tree engine and by record layers.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

use crate::types::{Filter, Record, StoredRow, TreeFields, TreeId};
use crate::update::RangeUpdate;

/// Storage abstraction used by the nested-set engine.
///
/// Implementations translate [`RangeUpdate`]s into their native bulk-update
/// form and provide transaction scoping. Every method that touches rows must
/// observe the effects of earlier writes in the same transaction.
pub trait Store {
    /// Row identity, assigned by the store.
    type Key: Copy + Eq + Hash + Debug;

    /// Failure reported by the store. The engine never inspects it.
    type Error: core::error::Error + 'static;

    /// Read a row's persisted parent and fields, or `None` if no such row exists.
    fn row(&self, key: Self::Key) -> Result<Option<StoredRow<Self::Key>>, Self::Error>;

    /// Largest `tree_id` in use, or `None` for an empty store.
    fn max_tree_id(&self) -> Result<Option<TreeId>, Self::Error>;

    /// Apply one bulk rewrite atomically and return the number of rows changed.
    fn update(&mut self, update: &RangeUpdate) -> Result<usize, Self::Error>;

    /// Visit rows matching the filter. The visiting order is store-dependent.
    fn visit<F: FnMut(Record<Self::Key>)>(&self, filter: &Filter, f: F)
    -> Result<(), Self::Error>;

    /// Open a unit of work. Transactions may nest; an inner `rollback`
    /// only undoes work done since the matching `begin`.
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Close the innermost unit of work, keeping its effects.
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Close the innermost unit of work, discarding its effects.
    fn rollback(&mut self) -> Result<(), Self::Error>;

    /// Read only the encoded fields of a row.
    fn fields(&self, key: Self::Key) -> Result<Option<TreeFields>, Self::Error> {
        Ok(self.row(key)?.map(|row| row.fields))
    }

    /// Collect rows matching the filter in tree order: by `tree_id`, then `left`.
    ///
    /// The default implementation collects [`visit`][Store::visit] and sorts.
    fn query(&self, filter: &Filter) -> Result<Vec<Record<Self::Key>>, Self::Error> {
        let mut out = Vec::new();
        if filter.is_unsatisfiable() {
            return Ok(out);
        }
        self.visit(filter, |record| out.push(record))?;
        out.sort_unstable_by_key(|r| (r.fields.tree_id, r.fields.left));
        Ok(out)
    }
}

/// Row persistence used by a record layer sitting on top of the engine.
///
/// The engine itself never calls these; they are the writes that the
/// lifecycle hooks run *before*.
pub trait RecordStore: Store {
    /// Payload stored alongside the tree fields.
    type Value: Clone;

    /// Persist a new row and return its freshly assigned key.
    fn insert(
        &mut self,
        parent: Option<Self::Key>,
        fields: TreeFields,
        value: Self::Value,
    ) -> Result<Self::Key, Self::Error>;

    /// Overwrite the parent and fields of an existing row.
    fn write(
        &mut self,
        key: Self::Key,
        parent: Option<Self::Key>,
        fields: TreeFields,
    ) -> Result<(), Self::Error>;

    /// Replace the payload of an existing row.
    fn write_value(&mut self, key: Self::Key, value: Self::Value) -> Result<(), Self::Error>;

    /// Delete a row, returning its payload.
    fn remove(&mut self, key: Self::Key) -> Result<Self::Value, Self::Error>;

    /// Read a row's payload, or `None` if no such row exists.
    fn value(&self, key: Self::Key) -> Result<Option<Self::Value>, Self::Error>;
}
