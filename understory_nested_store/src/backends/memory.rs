// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory transactional store.
//!
//! Rows live in a slot vector addressed by generational [`RowId`]s. A second
//! map buckets slot indices by [`TreeId`], so a [`RangeUpdate`] only touches
//! rows of the tree it names, as an indexed `WHERE tree_id = ?` would.
//!
//! Transactions are journaled: while one is open, every write first records
//! the slot's previous contents. `rollback` replays the journal backwards to
//! the matching `begin`, which also makes nested transactions behave like
//! savepoints.

use alloc::vec::Vec;
use core::fmt::{self, Debug};

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::{StoreError, StoreResult};
use crate::store::{RecordStore, Store};
use crate::types::{Filter, Record, StoredRow, TreeFields, TreeId};
use crate::update::RangeUpdate;

/// Generational handle for rows of a [`MemoryStore`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(u32, u32);

impl RowId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Row ids are intentionally 32-bit; higher bits are truncated by design."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}.{}", self.0, self.1)
    }
}

#[derive(Clone, Debug)]
struct Slot<V> {
    generation: u32,
    parent: Option<RowId>,
    fields: TreeFields,
    value: V,
}

#[derive(Debug)]
struct Savepoint {
    journal_len: usize,
    slots_len: usize,
    free_list: Vec<usize>,
}

/// Rows of one tree.
type Members = SmallVec<[usize; 8]>;

/// In-memory [`Store`] and [`RecordStore`] with nested transactions.
pub struct MemoryStore<V> {
    slots: Vec<Option<Slot<V>>>,
    /// last generation per slot (persists across frees and rollbacks)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    trees: HashMap<TreeId, Members>,
    journal: Vec<(usize, Option<Slot<V>>)>,
    savepoints: Vec<Savepoint>,
    updates_before_fault: Option<usize>,
}

impl<V> Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.slots.len();
        let alive = self.slots.iter().filter(|s| s.is_some()).count();
        f.debug_struct("MemoryStore")
            .field("slots_total", &total)
            .field("rows_alive", &alive)
            .field("trees", &self.trees.len())
            .field("transaction_depth", &self.savepoints.len())
            .field("journal", &self.journal.len())
            .finish_non_exhaustive()
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStore<V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            trees: HashMap::new(),
            journal: Vec::new(),
            savepoints: Vec::new(),
            updates_before_fault: None,
        }
    }

    /// Fail every bulk update after the first `n` successful ones.
    ///
    /// This simulates a storage error in the middle of a multi-step lifecycle
    /// operation so callers can check that the surrounding transaction leaves
    /// no partial rewrite behind.
    pub fn with_fault_after(mut self, n: usize) -> Self {
        self.updates_before_fault = Some(n);
        self
    }

    /// Schedule (or with `None`, cancel) an injected fault.
    pub fn set_fault_after(&mut self, n: Option<usize>) {
        self.updates_before_fault = n;
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.trees.values().map(SmallVec::len).sum()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Tree ids currently holding at least one row, ascending.
    pub fn tree_ids(&self) -> Vec<TreeId> {
        let mut ids: Vec<TreeId> = self.trees.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        !self.savepoints.is_empty()
    }

    /// Returns true if `key` refers to a live row.
    pub fn is_alive(&self, key: RowId) -> bool {
        self.live(key).is_some()
    }

    fn live(&self, key: RowId) -> Option<&Slot<V>> {
        let slot = self.slots.get(key.idx())?.as_ref()?;
        (slot.generation == key.1).then_some(slot)
    }

    fn slot_at(&self, idx: usize) -> &Slot<V> {
        self.slots
            .get(idx)
            .and_then(Option::as_ref)
            .expect("tree index references vacant slot")
    }

    fn link(&mut self, idx: usize, tree: TreeId) {
        self.trees.entry(tree).or_default().push(idx);
    }

    fn unlink(&mut self, idx: usize, tree: TreeId) {
        let members = self
            .trees
            .get_mut(&tree)
            .expect("store invariant violated: row's tree has no bucket");
        let pos = members
            .iter()
            .position(|&s| s == idx)
            .expect("store invariant violated: row missing from its tree bucket");
        members.swap_remove(pos);
        if members.is_empty() {
            // Retired trees must not count towards `max_tree_id`.
            self.trees.remove(&tree);
        }
    }

    fn restore(&mut self, idx: usize, previous: Option<Slot<V>>) {
        if let Some(current) = self.slots[idx].take() {
            self.unlink(idx, current.fields.tree_id);
        }
        if let Some(prev) = &previous {
            self.link(idx, prev.fields.tree_id);
        }
        self.slots[idx] = previous;
    }

    fn check_fault(&mut self) -> StoreResult<()> {
        match self.updates_before_fault {
            Some(0) => Err(StoreError::InjectedFault),
            Some(n) => {
                self.updates_before_fault = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<V: Clone> MemoryStore<V> {
    fn journal_slot(&mut self, idx: usize) {
        if !self.savepoints.is_empty() {
            self.journal.push((idx, self.slots[idx].clone()));
        }
    }

    fn set_fields(&mut self, idx: usize, parent: Option<Option<RowId>>, fields: TreeFields) {
        self.journal_slot(idx);
        let Some(slot) = self.slots[idx].as_mut() else {
            unreachable!("fields are only written to live slots");
        };
        let old_tree = slot.fields.tree_id;
        slot.fields = fields;
        if let Some(parent) = parent {
            slot.parent = parent;
        }
        if old_tree != fields.tree_id {
            self.unlink(idx, old_tree);
            self.link(idx, fields.tree_id);
        }
    }
}

impl<V: Clone> Store for MemoryStore<V> {
    type Key = RowId;
    type Error = StoreError;

    fn row(&self, key: RowId) -> StoreResult<Option<StoredRow<RowId>>> {
        Ok(self.live(key).map(|slot| StoredRow {
            parent: slot.parent,
            fields: slot.fields,
        }))
    }

    fn max_tree_id(&self) -> StoreResult<Option<TreeId>> {
        Ok(self.trees.keys().max().copied())
    }

    fn update(&mut self, update: &RangeUpdate) -> StoreResult<usize> {
        if update.is_noop() {
            return Ok(0);
        }
        self.check_fault()?;

        // Evaluate every row before writing any, so a failing row leaves the
        // whole statement unapplied.
        let mut changes: Vec<(usize, TreeFields)> = Vec::new();
        if let Some(members) = self.trees.get(&update.tree_id) {
            for &idx in members {
                if let Some(next) = update.apply(&self.slot_at(idx).fields)? {
                    changes.push((idx, next));
                }
            }
        }
        for &(idx, fields) in &changes {
            self.set_fields(idx, None, fields);
        }
        tracing::trace!(
            tree = %update.tree_id,
            changed = changes.len(),
            "applied range update"
        );
        Ok(changes.len())
    }

    fn visit<F: FnMut(Record<RowId>)>(&self, filter: &Filter, mut f: F) -> StoreResult<()> {
        let mut emit = |idx: usize, slot: &Slot<V>| {
            if filter.matches(&slot.fields) {
                f(Record {
                    key: RowId::new(idx, slot.generation),
                    fields: slot.fields,
                });
            }
        };
        match filter.tree_id {
            Some(tree) => {
                if let Some(members) = self.trees.get(&tree) {
                    for &idx in members {
                        emit(idx, self.slot_at(idx));
                    }
                }
            }
            None => {
                for (idx, slot) in self.slots.iter().enumerate() {
                    if let Some(slot) = slot {
                        emit(idx, slot);
                    }
                }
            }
        }
        Ok(())
    }

    fn begin(&mut self) -> StoreResult<()> {
        self.savepoints.push(Savepoint {
            journal_len: self.journal.len(),
            slots_len: self.slots.len(),
            free_list: self.free_list.clone(),
        });
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.savepoints.pop().ok_or(StoreError::NoTransaction)?;
        if self.savepoints.is_empty() {
            self.journal.clear();
        }
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let savepoint = self.savepoints.pop().ok_or(StoreError::NoTransaction)?;
        while self.journal.len() > savepoint.journal_len {
            let Some((idx, previous)) = self.journal.pop() else {
                break;
            };
            self.restore(idx, previous);
        }
        // Slots appended inside the transaction are vacant again.
        self.slots.truncate(savepoint.slots_len);
        self.free_list = savepoint.free_list;
        Ok(())
    }
}

impl<V: Clone> RecordStore for MemoryStore<V> {
    type Value = V;

    fn insert(
        &mut self,
        parent: Option<RowId>,
        fields: TreeFields,
        value: V,
    ) -> StoreResult<RowId> {
        let idx = if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            self.slots.push(None);
            self.slots.len() - 1
        };
        let generation = match self.generations.get_mut(idx) {
            Some(generation) => {
                *generation = generation.saturating_add(1);
                *generation
            }
            None => {
                self.generations.push(1);
                1
            }
        };
        self.journal_slot(idx);
        self.slots[idx] = Some(Slot {
            generation,
            parent,
            fields,
            value,
        });
        self.link(idx, fields.tree_id);
        Ok(RowId::new(idx, generation))
    }

    fn write(&mut self, key: RowId, parent: Option<RowId>, fields: TreeFields) -> StoreResult<()> {
        if !self.is_alive(key) {
            return Err(StoreError::RowNotFound);
        }
        self.set_fields(key.idx(), Some(parent), fields);
        Ok(())
    }

    fn write_value(&mut self, key: RowId, value: V) -> StoreResult<()> {
        if !self.is_alive(key) {
            return Err(StoreError::RowNotFound);
        }
        self.journal_slot(key.idx());
        if let Some(slot) = self.slots[key.idx()].as_mut() {
            slot.value = value;
        }
        Ok(())
    }

    fn remove(&mut self, key: RowId) -> StoreResult<V> {
        if !self.is_alive(key) {
            return Err(StoreError::RowNotFound);
        }
        self.journal_slot(key.idx());
        let Some(slot) = self.slots[key.idx()].take() else {
            unreachable!("liveness was checked above");
        };
        self.unlink(key.idx(), slot.fields.tree_id);
        self.free_list.push(key.idx());
        Ok(slot.value)
    }

    fn value(&self, key: RowId) -> StoreResult<Option<V>> {
        Ok(self.live(key).map(|slot| slot.value.clone()))
    }
}
