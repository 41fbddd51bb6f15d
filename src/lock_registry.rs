// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-account lock registry.
//!
//! Locks must key off the stable account id, not any in-flight copy of the
//! account data: the registry guarantees that "locking account X" always
//! refers to the same mutex no matter how many copies of X's data exist.
//!
//! Two-lock acquisition always takes the lower-ordered id first
//! ([`acquire_pair`](LockRegistry::acquire_pair)). That fixed total order is
//! the sole deadlock-prevention mechanism: opposite-direction transfers over
//! the same pair request locks in the same order and cannot form a
//! wait-cycle.

use crate::LedgerError;
use crate::base::AccountId;
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::sync::Arc;
use std::time::Duration;

/// Owned guard for one account's lock.
pub type AccountGuard = ArcMutexGuard<RawMutex, ()>;

/// Guards for two accounts, released in reverse acquisition order.
///
/// Struct fields drop in declaration order, so the second-acquired
/// (higher-ordered) lock is released first.
pub struct PairGuard {
    _second: AccountGuard,
    _first: AccountGuard,
}

/// Registry owning one mutex per account id.
///
/// The map grows monotonically and entries are never evicted; account
/// cardinality is bounded by the store for this crate's lifetime.
pub struct LockRegistry {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl LockRegistry {
    /// Creates a registry whose acquisitions wait at most `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Returns the lock handle for `id`, creating it on first use.
    ///
    /// The same `Arc` is returned for the same id across all calls for the
    /// process lifetime.
    pub fn handle(&self, id: AccountId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquires the lock for one account with a bounded wait.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::LockTimeout`] if the lock cannot be acquired
    /// within the registry timeout.
    pub fn acquire(&self, id: AccountId) -> Result<AccountGuard, LedgerError> {
        let handle = self.handle(id);
        Mutex::try_lock_arc_for(&handle, self.timeout).ok_or(LedgerError::LockTimeout { id })
    }

    /// Acquires the locks for two distinct accounts in id order.
    ///
    /// The lower-ordered id is locked first regardless of which side is the
    /// logical source or destination. If the second acquisition times out,
    /// the first lock is released before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::LockTimeout`] naming the account whose lock
    /// could not be acquired in time.
    pub fn acquire_pair(&self, a: AccountId, b: AccountId) -> Result<PairGuard, LedgerError> {
        debug_assert_ne!(a, b, "acquire_pair requires distinct account ids");
        let (low, high) = if a < b { (a, b) } else { (b, a) };

        let first = self.acquire(low)?;
        let second = self.acquire(high)?;
        Ok(PairGuard {
            _second: second,
            _first: first,
        })
    }
}
