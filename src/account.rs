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

//! Account balance state.
//!
//! An [`Account`] is a plain value: the store hands out copies, callers
//! mutate a copy while holding that account's registry lock, and save it
//! back. The lock never lives on the account itself, since locking a
//! transient copy would synchronize nothing.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use bank_ledger_rs::{Account, AccountId};
//!
//! let account = Account::new(AccountId(1), dec!(100.00)).unwrap();
//! assert_eq!(account.balance(), dec!(100.00));
//! assert_eq!(account.initial_balance(), dec!(100.00));
//! ```

use crate::LedgerError;
use crate::base::AccountId;
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// A balance-bearing ledger entry.
///
/// `initial_balance` is set once at creation and never changes; it anchors
/// the accrual cap. `balance` is only mutated through [`debit`](Self::debit),
/// [`credit`](Self::credit), and [`accrue`](Self::accrue), all of which the
/// caller must invoke while holding the account's registry lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    balance: Decimal,
    initial_balance: Decimal,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 4;

    /// Creates an account with `balance = initial_balance`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] if the initial balance is
    /// negative.
    pub fn new(id: AccountId, initial_balance: Decimal) -> Result<Self, LedgerError> {
        if initial_balance < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(
                "initial balance must not be negative",
            ));
        }
        Ok(Self {
            id,
            balance: initial_balance,
            initial_balance,
        })
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance of account {} went negative: {}",
            self.id,
            self.balance
        );
    }

    /// Decreases the balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount` is zero or negative.
    /// - [`LedgerError::InsufficientFunds`] if `amount` exceeds the balance.
    pub fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("amount must be positive"));
        }
        if self.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                id: self.id,
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(())
    }

    /// Increases the balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] if `amount` is zero or negative.
    pub fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount("amount must be positive"));
        }
        self.balance += amount;
        self.assert_invariants();
        Ok(())
    }

    /// Applies one tick of capped compound growth and returns the new balance.
    ///
    /// Computes `proposed = balance * (1 + rate)` and
    /// `cap = initial_balance * cap_factor`, then sets
    /// `min(proposed, cap)`. At the cap this is a fixed point: further
    /// ticks leave the balance unchanged. A balance sitting above the cap
    /// (inbound transfers are not cap-checked) is clamped down to it.
    pub fn accrue(&mut self, rate: Decimal, cap_factor: Decimal) -> Decimal {
        let cap = self.initial_balance * cap_factor;
        let proposed = self.balance * (Decimal::ONE + rate);
        self.balance = if proposed > cap { cap } else { proposed };
        self.assert_invariants();
        self.balance
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Account", 3)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("balance", &self.balance.round_dp(Account::DECIMAL_PRECISION))?;
        state.serialize_field(
            "initial_balance",
            &self.initial_balance.round_dp(Account::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}
