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

//! Atomic two-account balance moves.
//!
//! A transfer serializes with any other transfer or accrual step touching
//! either account: both account locks are held for the full
//! read-check-mutate-persist sequence, so no interleaved partial state is
//! ever observable. Conservation of the pair's total balance holds across
//! every call, successful or failed.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rust_decimal_macros::dec;
//! use bank_ledger_rs::{Account, AccountId, LockRegistry, MemoryStore, TransferEngine};
//!
//! let store = Arc::new(MemoryStore::new());
//! store.create(Account::new(AccountId(1), dec!(500.00)).unwrap()).unwrap();
//! store.create(Account::new(AccountId(2), dec!(200.00)).unwrap()).unwrap();
//!
//! let locks = Arc::new(LockRegistry::new(Duration::from_secs(5)));
//! let engine = TransferEngine::new(store, locks);
//!
//! engine.transfer(AccountId(1), AccountId(2), dec!(100.00)).unwrap();
//! ```

use crate::LedgerError;
use crate::base::AccountId;
use crate::lock_registry::LockRegistry;
use crate::store::AccountStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Executes atomic fund moves between two accounts.
///
/// # Invariants
///
/// - Both account locks are acquired in id order before any balance is read
///   for mutation, and released only after both writes are persisted.
/// - A failed precondition check persists nothing.
/// - `balance >= 0` holds for both accounts after every call.
pub struct TransferEngine<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry>,
}

impl<S: AccountStore> TransferEngine<S> {
    pub fn new(store: Arc<S>, locks: Arc<LockRegistry>) -> Self {
        Self { store, locks }
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Balances are re-read after lock acquisition: the pre-flight lookup
    /// only proves existence, and a concurrent operation may have changed
    /// either balance in the window before the locks were taken.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`LedgerError::SelfTransfer`] - `from` and `to` are the same account.
    /// - [`LedgerError::AccountNotFound`] - either side does not exist.
    /// - [`LedgerError::LockTimeout`] - a lock could not be acquired within
    ///   the bounded wait; the caller may retry with backoff.
    /// - [`LedgerError::InsufficientFunds`] - `from` cannot cover `amount`.
    /// - [`LedgerError::Persistence`] - the store rejected the pair write;
    ///   no partial mutation is visible.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("amount must be positive"));
        }
        if from == to {
            return Err(LedgerError::SelfTransfer { id: from });
        }

        // Existence check before taking any lock, naming the missing side.
        if self.store.get(from).is_none() {
            return Err(LedgerError::AccountNotFound { id: from });
        }
        if self.store.get(to).is_none() {
            return Err(LedgerError::AccountNotFound { id: to });
        }

        let _pair = self.locks.acquire_pair(from, to)?;

        // Re-read under the locks.
        let mut source = self
            .store
            .get(from)
            .ok_or(LedgerError::AccountNotFound { id: from })?;
        let mut destination = self
            .store
            .get(to)
            .ok_or(LedgerError::AccountNotFound { id: to })?;

        source.debit(amount)?;
        destination.credit(amount)?;

        // Both writes land before either lock is released.
        self.store
            .save_pair(&source, &destination)
            .map_err(LedgerError::persistence)?;

        debug!(
            from = %from,
            to = %to,
            amount = %amount,
            from_balance = %source.balance(),
            to_balance = %destination.balance(),
            "transfer committed"
        );

        Ok(())
    }
}
