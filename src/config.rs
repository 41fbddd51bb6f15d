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

//! Runtime configuration.
//!
//! Loaded from environment variables with defaults. All knobs have safe
//! defaults so the engine runs with no environment at all.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Tunable parameters for the ledger engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Interval between accrual sweep ticks (`SWEEP_INTERVAL_SECS`).
    pub sweep_interval: Duration,

    /// Bounded wait for account lock acquisition (`LOCK_TIMEOUT_MS`).
    pub lock_timeout: Duration,

    /// Growth applied per sweep tick (`ACCRUAL_RATE`).
    pub accrual_rate: Decimal,

    /// Balance ceiling as a multiple of initial balance (`ACCRUAL_CAP_FACTOR`).
    pub accrual_cap_factor: Decimal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            lock_timeout: Duration::from_millis(5000),
            accrual_rate: dec!(0.05),
            accrual_cap_factor: dec!(2.07),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for unset keys.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a set-but-unparseable key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            sweep_interval: Duration::from_secs(parse_or(
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
            lock_timeout: Duration::from_millis(parse_or(
                "LOCK_TIMEOUT_MS",
                defaults.lock_timeout.as_millis() as u64,
            )?),
            accrual_rate: parse_or("ACCRUAL_RATE", defaults.accrual_rate)?,
            accrual_cap_factor: parse_or("ACCRUAL_CAP_FACTOR", defaults.accrual_cap_factor)?,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
