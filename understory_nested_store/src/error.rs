// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for the bundled stores.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by [`MemoryStore`][crate::backends::MemoryStore] and by
/// [`RangeUpdate::apply`][crate::RangeUpdate::apply].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The key does not name a live row.
    #[error("row not found")]
    RowNotFound,

    /// `commit` or `rollback` was called with no open transaction.
    #[error("no transaction is open")]
    NoTransaction,

    /// A rewrite would move a value outside the `u32` range.
    #[error("boundary value {value} cannot be shifted by {delta}")]
    OutOfRange {
        /// Value before the update.
        value: u32,
        /// Offending delta.
        delta: i64,
    },

    /// A failure scheduled with
    /// [`MemoryStore::with_fault_after`][crate::backends::MemoryStore::with_fault_after].
    #[error("injected storage fault")]
    InjectedFault,
}
