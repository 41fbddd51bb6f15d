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

use bank_ledger_rs::{
    Account, AccountId, AccountStore, AccrualSweeper, Config, LockRegistry, MemoryStore,
    TransferEngine,
};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Bank Ledger - Apply transfer CSV files against seeded accounts
///
/// Seeds accounts from a CSV file, applies a CSV of transfers, optionally
/// runs accrual sweep ticks, and writes final account states to stdout.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger-rs")]
#[command(about = "A ledger engine that applies transfer CSVs and accrual sweeps", long_about = None)]
struct Args {
    /// Path to CSV file seeding accounts
    ///
    /// Expected format: id,balance
    #[arg(value_name = "ACCOUNTS")]
    accounts: PathBuf,

    /// Path to CSV file with transfers
    ///
    /// Expected format: from,to,amount
    #[arg(value_name = "TRANSFERS")]
    transfers: PathBuf,

    /// Number of accrual sweep ticks to run after the transfers
    #[arg(long, default_value_t = 0)]
    sweeps: u32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(LockRegistry::new(config.lock_timeout));

    if let Err(e) = open_csv(&args.accounts).and_then(|f| seed_accounts(&store, f)) {
        eprintln!("Error seeding accounts: {}", e);
        process::exit(1);
    }

    let engine = TransferEngine::new(store.clone(), locks.clone());
    if let Err(e) = open_csv(&args.transfers).and_then(|f| apply_transfers(&engine, f)) {
        eprintln!("Error processing transfers: {}", e);
        process::exit(1);
    }

    let sweeper = AccrualSweeper::new(
        store.clone(),
        locks,
        config.accrual_rate,
        config.accrual_cap_factor,
    );
    for _ in 0..args.sweeps {
        sweeper.run();
    }

    if let Err(e) = write_accounts(&store, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn open_csv(path: &PathBuf) -> Result<BufReader<File>, csv::Error> {
    let file = File::open(path)?;
    Ok(BufReader::new(file))
}

/// Raw CSV record seeding one account.
///
/// Fields: `id, balance`
#[derive(Debug, Deserialize)]
struct AccountRecord {
    id: u64,
    balance: Decimal,
}

/// Raw CSV record for one transfer.
///
/// Fields: `from, to, amount`
#[derive(Debug, Deserialize)]
struct TransferRecord {
    from: u64,
    to: u64,
    amount: Decimal,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader)
}

/// Seeds the store from an accounts CSV.
///
/// Malformed rows and invalid accounts are logged and skipped.
pub fn seed_accounts<R: Read>(store: &MemoryStore, reader: R) -> Result<(), csv::Error> {
    let mut rdr = csv_reader(reader);

    for result in rdr.deserialize::<AccountRecord>() {
        match result {
            Ok(record) => {
                let account = match Account::new(AccountId(record.id), record.balance) {
                    Ok(account) => account,
                    Err(e) => {
                        tracing::warn!(id = record.id, %e, "skipping invalid account row");
                        continue;
                    }
                };
                if let Err(e) = store.create(account) {
                    tracing::warn!(id = record.id, %e, "skipping duplicate account row");
                }
            }
            Err(e) => {
                tracing::warn!(%e, "skipping malformed account row");
                continue;
            }
        }
    }

    Ok(())
}

/// Applies transfers from a CSV reader.
///
/// Individual transfer failures (insufficient funds, unknown accounts, lock
/// timeouts) are logged and skipped; processing continues with the next row.
pub fn apply_transfers<R: Read>(
    engine: &TransferEngine<MemoryStore>,
    reader: R,
) -> Result<(), csv::Error> {
    let mut rdr = csv_reader(reader);

    for result in rdr.deserialize::<TransferRecord>() {
        match result {
            Ok(record) => {
                if let Err(e) =
                    engine.transfer(AccountId(record.from), AccountId(record.to), record.amount)
                {
                    tracing::warn!(
                        from = record.from,
                        to = record.to,
                        amount = %record.amount,
                        %e,
                        "skipping failed transfer"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(%e, "skipping malformed transfer row");
                continue;
            }
        }
    }

    Ok(())
}

/// Writes account states to a CSV writer, ordered by account id.
///
/// Columns: `id, balance, initial_balance` (balances rounded to 4 decimal
/// places by the account serializer).
pub fn write_accounts<W: Write>(store: &MemoryStore, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    let mut ids = store.account_ids();
    ids.sort();
    for id in ids {
        if let Some(account) = store.get(id) {
            wtr.serialize(&account)?;
        }
    }

    wtr.flush()?;
    Ok(())
}
