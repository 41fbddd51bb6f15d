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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! These tests verify that ordered two-lock acquisition in the transfer
//! engine and single-lock sweeping in the accrual sweeper do not lead to
//! deadlocks under concurrent access, and that no updates are lost.
//!
//! The tests use parking_lot::Mutex with the `deadlock_detection` feature
//! to automatically detect cycles in the lock graph.

use bank_ledger_rs::{
    Account, AccountId, AccountStore, AccrualScheduler, AccrualSweeper, LockRegistry, MemoryStore,
    TransferEngine,
};
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

// === Helper Functions ===

fn setup(
    balances: &[(u64, Decimal)],
) -> (
    Arc<MemoryStore>,
    Arc<LockRegistry>,
    Arc<TransferEngine<MemoryStore>>,
) {
    let store = Arc::new(MemoryStore::new());
    for (id, balance) in balances {
        store
            .create(Account::new(AccountId(*id), *balance).unwrap())
            .unwrap();
    }
    // Generous timeout: these tests exercise heavy contention and a timeout
    // would read as a false deadlock signal.
    let locks = Arc::new(LockRegistry::new(Duration::from_secs(30)));
    let engine = Arc::new(TransferEngine::new(store.clone(), locks.clone()));
    (store, locks, engine)
}

// === Tests ===

/// Opposite-direction transfers over the same pair: the classic unordered
/// two-lock deadlock. Ordered acquisition must let all of them complete.
#[test]
fn no_deadlock_opposite_direction_transfers() {
    let detector = start_deadlock_detector();
    let (store, _, engine) = setup(&[(1, dec!(10000.00)), (2, dec!(10000.00))]);

    const NUM_THREADS: usize = 50;
    const OPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let engine = engine.clone();

        let handle = thread::spawn(move || {
            // Even threads push 1 -> 2, odd threads push 2 -> 1.
            let (from, to) = if thread_id % 2 == 0 {
                (AccountId(1), AccountId(2))
            } else {
                (AccountId(2), AccountId(1))
            };
            for _ in 0..OPS_PER_THREAD {
                engine.transfer(from, to, dec!(1.00)).unwrap();
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // Equal flow in both directions: balances end where they started.
    assert_eq!(store.get(AccountId(1)).unwrap().balance(), dec!(10000.00));
    assert_eq!(store.get(AccountId(2)).unwrap().balance(), dec!(10000.00));
    println!(
        "Opposite-direction test passed: {} threads × {} ops",
        NUM_THREADS, OPS_PER_THREAD
    );
}

/// N concurrent transfers of a fixed amount between the same two accounts
/// converge to the exact expected balances: no update is silently dropped.
#[test]
fn no_lost_updates_under_contention() {
    let detector = start_deadlock_detector();

    const NUM_THREADS: usize = 20;
    const OPS_PER_THREAD: usize = 50;
    let total = Decimal::from((NUM_THREADS * OPS_PER_THREAD) as i64);

    let (store, _, engine) = setup(&[(1, total), (2, dec!(0.00))]);

    let failures = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::with_capacity(NUM_THREADS);

    for _ in 0..NUM_THREADS {
        let engine = engine.clone();
        let failures = failures.clone();

        let handle = thread::spawn(move || {
            for _ in 0..OPS_PER_THREAD {
                if engine
                    .transfer(AccountId(1), AccountId(2), dec!(1.00))
                    .is_err()
                {
                    failures.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // The source was seeded with exactly the sum of all transfers, so every
    // one of them must have succeeded.
    assert_eq!(failures.load(Ordering::SeqCst), 0);
    assert_eq!(store.get(AccountId(1)).unwrap().balance(), Decimal::ZERO);
    assert_eq!(store.get(AccountId(2)).unwrap().balance(), total);
    println!(
        "Lost-update test passed: {} transfers, exact final balances",
        NUM_THREADS * OPS_PER_THREAD
    );
}

/// Transfers across many overlapping pairs, both directions at once.
#[test]
fn no_deadlock_many_overlapping_pairs() {
    let detector = start_deadlock_detector();

    const NUM_ACCOUNTS: u64 = 10;
    const NUM_THREADS: usize = 20;
    const OPS_PER_THREAD: usize = 100;

    let balances: Vec<(u64, Decimal)> = (1..=NUM_ACCOUNTS).map(|id| (id, dec!(10000.00))).collect();
    let (store, _, engine) = setup(&balances);
    let initial_total = store.total_balance();

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let engine = engine.clone();

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                // Walk overlapping pairs in alternating directions.
                let a = ((thread_id + i) % NUM_ACCOUNTS as usize) as u64 + 1;
                let b = ((thread_id + i + 1) % NUM_ACCOUNTS as usize) as u64 + 1;
                let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                // Insufficient funds is acceptable here; deadlock is not.
                let _ = engine.transfer(AccountId(from), AccountId(to), dec!(5.00));
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // Conservation across the whole ledger.
    assert_eq!(store.total_balance(), initial_total);
    for id in 1..=NUM_ACCOUNTS {
        assert!(store.get(AccountId(id)).unwrap().balance() >= Decimal::ZERO);
    }
    println!(
        "Overlapping pairs test passed: {} accounts, {} threads",
        NUM_ACCOUNTS, NUM_THREADS
    );
}

/// Transfers and accrual sweeps interleaving on the same accounts: they
/// serialize at each account's lock, in whichever order, without deadlock.
#[test]
fn no_deadlock_transfers_during_sweeps() {
    let detector = start_deadlock_detector();

    const NUM_ACCOUNTS: u64 = 8;
    const NUM_THREADS: usize = 8;
    const OPS_PER_THREAD: usize = 200;

    let balances: Vec<(u64, Decimal)> = (1..=NUM_ACCOUNTS).map(|id| (id, dec!(1000.00))).collect();
    let (store, locks, engine) = setup(&balances);

    let sweeper = AccrualSweeper::new(store.clone(), locks, dec!(0.05), dec!(2.07));
    let scheduler = AccrualScheduler::spawn(sweeper, Duration::from_millis(5));

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for thread_id in 0..NUM_THREADS {
        let engine = engine.clone();

        let handle = thread::spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let from = ((thread_id + i) % NUM_ACCOUNTS as usize) as u64 + 1;
                let to = ((thread_id + i + 3) % NUM_ACCOUNTS as usize) as u64 + 1;
                if from != to {
                    let _ = engine.transfer(AccountId(from), AccountId(to), dec!(2.50));
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    scheduler.stop();
    stop_deadlock_detector(detector);

    // Accrual only adds (transfers conserve), and nothing goes negative.
    for id in 1..=NUM_ACCOUNTS {
        let account = store.get(AccountId(id)).unwrap();
        assert!(account.balance() >= Decimal::ZERO);
    }
    println!(
        "Transfers-during-sweeps test passed: {} accounts, {} threads",
        NUM_ACCOUNTS, NUM_THREADS
    );
}

/// Rapid single-account lock cycling through the sweeper while readers poll.
#[test]
fn no_deadlock_rapid_sweep_cycling() {
    let detector = start_deadlock_detector();

    let balances: Vec<(u64, Decimal)> = (1..=5).map(|id| (id, dec!(100.00))).collect();
    let (store, locks, _) = setup(&balances);
    let sweeper = AccrualSweeper::new(store.clone(), locks, dec!(0.05), dec!(2.07));

    const NUM_SWEEPERS: usize = 4;
    const SWEEPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_SWEEPERS + 2);

    for _ in 0..NUM_SWEEPERS {
        let sweeper = sweeper.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..SWEEPS_PER_THREAD {
                let outcomes = sweeper.run();
                assert!(outcomes.iter().all(|o| o.result.is_ok()));
            }
        }));
    }

    // Concurrent readers.
    for _ in 0..2 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..500 {
                let _ = store.total_balance();
                thread::yield_now();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // Every account is pinned at its cap after this much sweeping.
    for id in 1..=5 {
        assert_eq!(store.get(AccountId(id)).unwrap().balance(), dec!(207.0000));
    }
    println!("Rapid sweep cycling test passed");
}
