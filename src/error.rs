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

//! Error types for ledger operations.

use crate::base::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the account store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An account with this id already exists
    #[error("account {0} already exists")]
    AlreadyExists(AccountId),

    /// The store rejected a write
    #[error("write rejected for account {id}: {reason}")]
    WriteRejected { id: AccountId, reason: String },
}

impl StoreError {
    /// The account the failure is attributed to.
    pub fn account_id(&self) -> AccountId {
        match self {
            Self::AlreadyExists(id) => *id,
            Self::WriteRejected { id, .. } => *id,
        }
    }
}

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced account does not exist
    #[error("account {id} not found")]
    AccountNotFound { id: AccountId },

    /// Debit would exceed the available balance
    #[error("insufficient funds in account {id}: requested {requested}, available {available}")]
    InsufficientFunds {
        id: AccountId,
        requested: Decimal,
        available: Decimal,
    },

    /// Amount is zero, negative, or otherwise unusable
    #[error("invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Source and destination of a transfer are the same account
    #[error("cannot transfer from account {id} to itself")]
    SelfTransfer { id: AccountId },

    /// Lock acquisition exceeded the bounded wait
    #[error("timed out waiting for lock on account {id}")]
    LockTimeout { id: AccountId },

    /// The store failed to persist an account
    #[error("persistence failure for account {id}")]
    Persistence {
        id: AccountId,
        #[source]
        source: StoreError,
    },
}

impl LedgerError {
    pub(crate) fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(source: StoreError) -> Self {
        Self::Persistence {
            id: source.account_id(),
            source,
        }
    }
}
