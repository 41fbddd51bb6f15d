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

//! # Bank Ledger
//!
//! This library provides a ledger-mutation engine: atomic fund transfers
//! between accounts and periodic capped balance accrual, safe under
//! concurrent access.
//!
//! ## Core Components
//!
//! - [`TransferEngine`]: atomic two-account balance moves
//! - [`AccrualSweeper`]: periodic bounded compound growth over all accounts
//! - [`LockRegistry`]: one stable mutex per account id, acquired in id order
//! - [`AccountStore`]: persistence contract, with [`MemoryStore`] in-process
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rust_decimal_macros::dec;
//! use bank_ledger_rs::{
//!     Account, AccountId, AccountStore, AccrualSweeper, LockRegistry, MemoryStore,
//!     TransferEngine,
//! };
//!
//! let store = Arc::new(MemoryStore::new());
//! store.create(Account::new(AccountId(1), dec!(500.00)).unwrap()).unwrap();
//! store.create(Account::new(AccountId(2), dec!(200.00)).unwrap()).unwrap();
//!
//! let locks = Arc::new(LockRegistry::new(Duration::from_secs(5)));
//! let engine = TransferEngine::new(store.clone(), locks.clone());
//!
//! engine.transfer(AccountId(1), AccountId(2), dec!(100.00)).unwrap();
//! assert_eq!(store.get(AccountId(1)).unwrap().balance(), dec!(400.00));
//!
//! let sweeper = AccrualSweeper::new(store.clone(), locks, dec!(0.05), dec!(2.07));
//! let outcomes = sweeper.run();
//! assert!(outcomes.iter().all(|o| o.result.is_ok()));
//! ```
//!
//! ## Thread Safety
//!
//! All balance mutation happens under a per-account lock obtained from the
//! [`LockRegistry`]. Two-lock acquisitions always take the lower-ordered
//! account id first, so opposite-direction transfers over the same pair of
//! accounts cannot deadlock. The sweeper holds one lock at a time and
//! serializes with transfers at each account's lock.

pub mod account;
mod base;
pub mod config;
pub mod error;
mod lock_registry;
pub mod store;
mod sweeper;
mod transfer;

pub use account::Account;
pub use base::AccountId;
pub use config::{Config, ConfigError};
pub use error::{LedgerError, StoreError};
pub use lock_registry::{AccountGuard, LockRegistry, PairGuard};
pub use store::{AccountStore, MemoryStore};
pub use sweeper::{AccrualScheduler, AccrualSweeper, SweepOutcome};
pub use transfer::TransferEngine;
