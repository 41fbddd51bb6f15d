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

//! Periodic capped balance accrual.
//!
//! [`AccrualSweeper::run`] walks a snapshot of all account ids and applies
//! one tick of compound growth to each, one account lock at a time. The
//! sweeper never holds two account locks, so it cannot participate in a
//! lock-ordering hazard. Each account's step is an independent unit of
//! work: a failure on one account is recorded in that account's
//! [`SweepOutcome`] and the sweep moves on.
//!
//! [`AccrualScheduler`] drives `run()` on a fixed interval from a
//! background thread.

use crate::LedgerError;
use crate::base::AccountId;
use crate::lock_registry::LockRegistry;
use crate::store::AccountStore;
use crossbeam::channel::{self, Sender};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one account's accrual step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub id: AccountId,
    /// New balance on success, the per-account error otherwise.
    pub result: Result<Decimal, LedgerError>,
}

/// Applies bounded compound growth to every account.
pub struct AccrualSweeper<S> {
    store: Arc<S>,
    locks: Arc<LockRegistry>,
    rate: Decimal,
    cap_factor: Decimal,
}

// Manual impl: the store is shared through an Arc, so `S: Clone` is not
// required.
impl<S> Clone for AccrualSweeper<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
            rate: self.rate,
            cap_factor: self.cap_factor,
        }
    }
}

impl<S: AccountStore> AccrualSweeper<S> {
    /// Creates a sweeper growing balances by `rate` per tick, capped at
    /// `cap_factor` times each account's initial balance.
    pub fn new(store: Arc<S>, locks: Arc<LockRegistry>, rate: Decimal, cap_factor: Decimal) -> Self {
        Self {
            store,
            locks,
            rate,
            cap_factor,
        }
    }

    /// Runs one sweep tick over a snapshot of all known accounts.
    ///
    /// Accounts created after the snapshot is taken are picked up by the
    /// next tick. Returns one outcome per account in the snapshot; errors
    /// never abort the remainder of the sweep.
    pub fn run(&self) -> Vec<SweepOutcome> {
        let ids = self.store.account_ids();
        let mut outcomes = Vec::with_capacity(ids.len());

        for id in ids {
            let result = self.sweep_account(id);
            if let Err(error) = &result {
                warn!(account = %id, %error, "accrual step failed");
            }
            outcomes.push(SweepOutcome { id, result });
        }

        debug!(accounts = outcomes.len(), "accrual sweep complete");
        outcomes
    }

    /// One account's read-compute-write step, under that account's lock.
    fn sweep_account(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        let _guard = self.locks.acquire(id)?;

        let mut account = self
            .store
            .get(id)
            .ok_or(LedgerError::AccountNotFound { id })?;
        let new_balance = account.accrue(self.rate, self.cap_factor);
        self.store
            .save(&account)
            .map_err(LedgerError::persistence)?;

        Ok(new_balance)
    }
}

/// Periodic driver ticking an [`AccrualSweeper`] on a background thread.
///
/// The interval is a configuration value (see [`Config`]); the documented
/// default is 60 seconds between ticks.
///
/// [`Config`]: crate::Config
pub struct AccrualScheduler {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl AccrualScheduler {
    /// Spawns the scheduler thread.
    ///
    /// The shutdown channel doubles as the tick clock: `recv_timeout`
    /// either fires a tick on timeout or returns when `stop` signals.
    pub fn spawn<S>(sweeper: AccrualSweeper<S>, interval: Duration) -> Self
    where
        S: AccountStore + 'static,
    {
        let (shutdown, shutdown_rx) = channel::bounded::<()>(1);

        let handle = thread::spawn(move || {
            info!(interval_secs = interval.as_secs(), "accrual scheduler started");
            loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(channel::RecvTimeoutError::Timeout) => {
                        let outcomes = sweeper.run();
                        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
                        if failed > 0 {
                            warn!(failed, total = outcomes.len(), "sweep tick had failures");
                        }
                    }
                    Ok(()) | Err(channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("accrual scheduler stopped");
        });

        Self { shutdown, handle }
    }

    /// Signals the scheduler thread and waits for it to exit.
    pub fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.join();
    }
}
