use std::ops::RangeInclusive;
use std::time::Duration;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one account is required")]
    NoAccounts,

    #[error("initial balance must not be negative")]
    NegativeInitialBalance,

    #[error("at least one worker is required")]
    NoWorkers,

    #[error("minimum transfer amount must be greater than zero")]
    NonPositiveAmount,

    #[error("transfer amount range {min}..={max} holds no whole cent")]
    EmptyAmountRange { min: Decimal, max: Decimal },

    #[error("transfer amount {0} is too large")]
    AmountTooLarge(Decimal),

    #[error("minimum delay must be greater than zero")]
    ZeroDelay,

    #[error("delay range {min:?}..={max:?} is inverted")]
    InvertedDelayRange { min: Duration, max: Duration },
}

/// Parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub accounts: u32,
    pub initial_balance: Decimal,
    pub workers: usize,
    pub transfers_per_worker: usize,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Fixed seed for reproducible runs; worker `n` uses `seed + n`.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            accounts: 5,
            initial_balance: Decimal::from(10_000),
            workers: 3,
            transfers_per_worker: 10,
            min_amount: Decimal::from(10),
            max_amount: Decimal::from(1_000),
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(100),
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts == 0 {
            return Err(ConfigError::NoAccounts);
        }
        if self.initial_balance < Decimal::ZERO {
            return Err(ConfigError::NegativeInitialBalance);
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        self.amount_cents()?;
        self.delay_range()?;
        Ok(())
    }

    /// Transfer amounts in whole cents.
    pub fn amount_cents(&self) -> Result<RangeInclusive<i64>, ConfigError> {
        if self.min_amount <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveAmount);
        }

        let min = to_cents(self.min_amount, RoundingStrategy::AwayFromZero)
            .ok_or(ConfigError::AmountTooLarge(self.min_amount))?;
        let max = to_cents(self.max_amount, RoundingStrategy::ToZero)
            .ok_or(ConfigError::AmountTooLarge(self.max_amount))?;

        if min > max {
            return Err(ConfigError::EmptyAmountRange {
                min: self.min_amount,
                max: self.max_amount,
            });
        }
        Ok(min..=max)
    }

    pub fn delay_range(&self) -> Result<RangeInclusive<Duration>, ConfigError> {
        if self.min_delay.is_zero() {
            return Err(ConfigError::ZeroDelay);
        }
        if self.min_delay > self.max_delay {
            return Err(ConfigError::InvertedDelayRange {
                min: self.min_delay,
                max: self.max_delay,
            });
        }
        Ok(self.min_delay..=self.max_delay)
    }
}

fn to_cents(amount: Decimal, strategy: RoundingStrategy) -> Option<i64> {
    amount
        .round_dp_with_strategy(2, strategy)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_i64()
}
