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

//! Account persistence boundary.
//!
//! [`AccountStore`] is the contract the engine and sweeper consume; the
//! real persistence layer lives outside this crate. [`MemoryStore`] is the
//! in-process reference implementation, backed by [`DashMap`] so reads and
//! writes to different accounts never interfere.

use crate::account::Account;
use crate::base::AccountId;
use crate::error::StoreError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;

/// Authoritative mapping from account id to balance state.
///
/// Mutation protocol: callers read a copy with [`get`](Self::get), mutate it
/// while holding the account's registry lock, and write it back with
/// [`save`](Self::save) or [`save_pair`](Self::save_pair) before releasing
/// the lock. The store itself does no locking beyond per-key consistency.
pub trait AccountStore: Send + Sync {
    /// Returns a copy of the account, or `None` if it does not exist.
    fn get(&self, id: AccountId) -> Option<Account>;

    /// Snapshot of all account ids at the time of the call.
    ///
    /// Accounts created after the snapshot is taken may be missing from it.
    fn account_ids(&self) -> Vec<AccountId>;

    /// Persists one account.
    fn save(&self, account: &Account) -> Result<(), StoreError>;

    /// Persists two accounts as a unit: either both writes land or neither.
    fn save_pair(&self, first: &Account, second: &Account) -> Result<(), StoreError>;
}

/// In-memory [`AccountStore`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<AccountId, Account>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Creates an account with `balance = initial_balance`.
    ///
    /// Uses the entry API for an atomic check-and-insert so two concurrent
    /// creates of the same id cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the id is taken.
    pub fn create(&self, account: Account) -> Result<(), StoreError> {
        match self.accounts.entry(account.id()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(account.id())),
            Entry::Vacant(entry) => {
                entry.insert(account);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Sum of all balances. Only meaningful at quiescent points.
    pub fn total_balance(&self) -> Decimal {
        self.accounts
            .iter()
            .map(|entry| entry.value().balance())
            .sum()
    }
}

impl AccountStore for MemoryStore {
    fn get(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id).map(|entry| entry.value().clone())
    }

    fn account_ids(&self) -> Vec<AccountId> {
        self.accounts.iter().map(|entry| *entry.key()).collect()
    }

    fn save(&self, account: &Account) -> Result<(), StoreError> {
        self.accounts.insert(account.id(), account.clone());
        Ok(())
    }

    fn save_pair(&self, first: &Account, second: &Account) -> Result<(), StoreError> {
        // In-process writes cannot fail halfway; both inserts always land.
        // Callers hold both account locks, so nothing observes the gap
        // between the two inserts.
        self.accounts.insert(first.id(), first.clone());
        self.accounts.insert(second.id(), second.clone());
        Ok(())
    }
}
