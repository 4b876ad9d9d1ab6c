use std::ops::RangeInclusive;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::orchestrator::config::{ConfigError, SimulationConfig};
use crate::transactions::TransferRequest;

/// Picks what each worker does next. Source and destination are chosen
/// independently; rejecting a same-account pair is the engine's job.
pub trait SelectionPolicy: Send {
    /// Next transfer against a ledger of `ledger_len` accounts, or `None`
    /// once the policy has nothing left to issue.
    fn next_request(&mut self, ledger_len: usize) -> Option<TransferRequest>;

    /// How long to wait before the next iteration.
    fn pause(&mut self) -> Duration;
}

/// Uniform random positions, amounts in whole cents and delays.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: StdRng,
    amount_cents: RangeInclusive<i64>,
    delay: RangeInclusive<Duration>,
}

impl RandomPolicy {
    /// Policy for worker number `worker`. Seeded runs give each worker its
    /// own deterministic stream.
    pub fn from_config(config: &SimulationConfig, worker: usize) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(worker as u64)),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            rng,
            amount_cents: config.amount_cents()?,
            delay: config.delay_range()?,
        })
    }
}

impl SelectionPolicy for RandomPolicy {
    fn next_request(&mut self, ledger_len: usize) -> Option<TransferRequest> {
        if ledger_len == 0 {
            return None;
        }
        let source = self.rng.gen_range(0..ledger_len);
        let destination = self.rng.gen_range(0..ledger_len);
        let cents = self.rng.gen_range(self.amount_cents.clone());

        Some(TransferRequest::new(source, destination, Decimal::new(cents, 2)))
    }

    fn pause(&mut self) -> Duration {
        self.rng.gen_range(self.delay.clone())
    }
}

/// Replays a fixed list of requests in a loop.
#[derive(Debug, Clone)]
pub struct ScriptedPolicy {
    requests: Vec<TransferRequest>,
    cursor: usize,
    delay: Duration,
}

impl ScriptedPolicy {
    pub fn new(requests: Vec<TransferRequest>, delay: Duration) -> Self {
        Self {
            requests,
            cursor: 0,
            delay,
        }
    }
}

impl SelectionPolicy for ScriptedPolicy {
    fn next_request(&mut self, _ledger_len: usize) -> Option<TransferRequest> {
        if self.requests.is_empty() {
            return None;
        }
        let request = self.requests[self.cursor];
        self.cursor = (self.cursor + 1) % self.requests.len();
        Some(request)
    }

    fn pause(&mut self) -> Duration {
        self.delay
    }
}
