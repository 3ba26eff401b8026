// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bundled store implementations.
//!
//! - `memory` (feature `memory_store`): slot vector with generational keys, rows
//!   bucketed per tree, and journaled nested transactions.
//!
//! Persistent stores live outside this crate; anything that can run a
//! conditional bulk update inside a transaction can implement [`Store`][crate::Store].

#[cfg(feature = "memory_store")]
pub(crate) mod memory;

#[cfg(feature = "memory_store")]
pub use memory::{MemoryStore, RowId};
