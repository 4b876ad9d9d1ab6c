use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::accounts::{lock_pair, Account, Ledger};
use crate::transactions::{InvalidRequest, RejectReason, TransferOutcome, TransferRequest};

/// Outcome counters shared by every worker using the engine.
#[derive(Debug, Default)]
pub struct TransferStats {
    committed: AtomicU64,
    insufficient_funds: AtomicU64,
    invalid: AtomicU64,
    overflow: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub committed: u64,
    pub insufficient_funds: u64,
    pub invalid: u64,
    pub overflow: u64,
}

impl StatsSnapshot {
    pub fn rejected(&self) -> u64 {
        self.insufficient_funds + self.invalid + self.overflow
    }

    pub fn total(&self) -> u64 {
        self.committed + self.rejected()
    }
}

impl TransferStats {
    fn record(&self, outcome: &TransferOutcome) {
        let counter = match outcome {
            TransferOutcome::Committed => &self.committed,
            TransferOutcome::Rejected(RejectReason::InsufficientFunds) => &self.insufficient_funds,
            TransferOutcome::Rejected(RejectReason::InvalidRequest(_)) => &self.invalid,
            TransferOutcome::Rejected(RejectReason::Overflow) => &self.overflow,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            committed: self.committed.load(Ordering::Relaxed),
            insufficient_funds: self.insufficient_funds.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            overflow: self.overflow.load(Ordering::Relaxed),
        }
    }
}

/// Moves funds between accounts of a shared ledger.
///
/// Each transfer locks only the two accounts it touches, lower id first,
/// so transfers on disjoint pairs run in parallel and no two transfers can
/// wait on each other in a cycle.
pub struct TransferEngine {
    ledger: Arc<Ledger>,
    stats: TransferStats,
}

impl TransferEngine {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            stats: TransferStats::default(),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve ledger positions and run the transfer
    pub fn execute(&self, request: &TransferRequest) -> TransferOutcome {
        let accounts = self.resolve(request.source).and_then(|source| {
            self.resolve(request.destination)
                .map(|destination| (source, destination))
        });

        match accounts {
            Ok((source, destination)) => self.transfer(source, destination, request.amount),
            Err(invalid) => {
                debug!("rejected transfer request {:?}: {}", request, invalid);
                let outcome = TransferOutcome::from(invalid);
                self.stats.record(&outcome);
                outcome
            }
        }
    }

    /// Atomically move `amount` from `source` to `destination`.
    ///
    /// Either both balances change or neither does, and both locks are
    /// released before this returns.
    pub fn transfer(&self, source: &Account, destination: &Account, amount: Decimal) -> TransferOutcome {
        let outcome = match validate(source, destination, amount) {
            Err(invalid) => {
                debug!(
                    "rejected transfer of {} from account {} to account {}: {}",
                    amount,
                    source.id(),
                    destination.id(),
                    invalid
                );
                TransferOutcome::from(invalid)
            }
            Ok(()) => apply(source, destination, amount),
        };

        self.stats.record(&outcome);
        outcome
    }

    fn resolve(&self, index: usize) -> Result<&Account, InvalidRequest> {
        self.ledger
            .get(index)
            .ok_or(InvalidRequest::UnknownAccount(index))
    }
}

fn validate(source: &Account, destination: &Account, amount: Decimal) -> Result<(), InvalidRequest> {
    if std::ptr::eq(source, destination) || source.id() == destination.id() {
        return Err(InvalidRequest::SameAccount);
    }
    if amount <= Decimal::ZERO {
        return Err(InvalidRequest::NonPositiveAmount);
    }
    Ok(())
}

fn apply(source: &Account, destination: &Account, amount: Decimal) -> TransferOutcome {
    let mut pair = lock_pair(source, destination);
    let (src, dst) = pair.split();

    if !dst.can_credit(amount) {
        warn!(
            "failed transfer: crediting {} would overflow account {}",
            amount,
            dst.id()
        );
        return TransferOutcome::Rejected(RejectReason::Overflow);
    }

    if !src.debit(amount) {
        warn!(
            "failed transfer: insufficient funds in account {} ({} < {})",
            src.id(),
            src.balance(),
            amount
        );
        return TransferOutcome::Rejected(RejectReason::InsufficientFunds);
    }
    dst.credit(amount);

    info!(
        "transferred {} from account {} to account {}",
        amount.round_dp(2),
        src.id(),
        dst.id()
    );
    TransferOutcome::Committed
}


/// ------------------------
/// Inline Unit Tests
/// ------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountSeed;

    fn decimal(amount: i64) -> Decimal {
        Decimal::from(amount)
    }

    fn engine_with(balances: &[i64]) -> TransferEngine {
        let seeds = balances.iter().enumerate().map(|(i, balance)| AccountSeed {
            account: i as u32 + 1,
            balance: decimal(*balance),
        });
        TransferEngine::new(Arc::new(Ledger::new(seeds).unwrap()))
    }

    fn balances(engine: &TransferEngine) -> Vec<Decimal> {
        engine.ledger().snapshot().into_iter().map(|(_, b)| b).collect()
    }

    #[test]
    fn test_committed_transfer() {
        let engine = engine_with(&[100, 50]);
        let outcome = engine.execute(&TransferRequest::new(0, 1, decimal(30)));

        assert_eq!(outcome, TransferOutcome::Committed);
        assert_eq!(balances(&engine), vec![decimal(70), decimal(80)]);
    }

    #[test]
    fn test_insufficient_funds_leaves_balances() {
        let engine = engine_with(&[100, 50]);
        engine.execute(&TransferRequest::new(0, 1, decimal(30)));

        let outcome = engine.execute(&TransferRequest::new(0, 1, decimal(1000)));
        assert_eq!(outcome, TransferOutcome::Rejected(RejectReason::InsufficientFunds));
        assert_eq!(balances(&engine), vec![decimal(70), decimal(80)]);
    }

    #[test]
    fn test_same_account_rejected_without_locking() {
        let engine = engine_with(&[70, 80]);
        let account = engine.ledger().get(0).unwrap();

        // Holding the lock proves the engine never tries to take it
        let _held = account.lock();
        let outcome = engine.transfer(account, account, decimal(10));
        assert_eq!(
            outcome,
            TransferOutcome::Rejected(RejectReason::InvalidRequest(InvalidRequest::SameAccount))
        );
    }

    #[test]
    fn test_same_position_rejected() {
        let engine = engine_with(&[70, 80]);
        let outcome = engine.execute(&TransferRequest::new(0, 0, decimal(10)));
        assert_eq!(outcome, TransferOutcome::from(InvalidRequest::SameAccount));
        assert_eq!(balances(&engine), vec![decimal(70), decimal(80)]);
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let engine = engine_with(&[70, 80]);
        for amount in [Decimal::ZERO, decimal(-5)] {
            let outcome = engine.execute(&TransferRequest::new(0, 1, amount));
            assert_eq!(outcome, TransferOutcome::from(InvalidRequest::NonPositiveAmount));
        }
        assert_eq!(balances(&engine), vec![decimal(70), decimal(80)]);
    }

    #[test]
    fn test_unknown_position_rejected() {
        let engine = engine_with(&[70, 80]);
        let outcome = engine.execute(&TransferRequest::new(0, 9, decimal(1)));
        assert_eq!(outcome, TransferOutcome::from(InvalidRequest::UnknownAccount(9)));
    }

    #[test]
    fn test_transfer_to_lower_id_account() {
        let engine = engine_with(&[10, 10, 10]);
        let outcome = engine.execute(&TransferRequest::new(2, 0, decimal(10)));

        assert!(outcome.is_committed());
        assert_eq!(balances(&engine), vec![decimal(20), decimal(10), Decimal::ZERO]);
    }

    #[test]
    fn test_overflow_rejected() {
        let engine = engine_with(&[1]);
        let source = Account::new(10, decimal(5));
        let destination = Account::new(11, Decimal::MAX);

        let outcome = engine.transfer(&source, &destination, decimal(1));
        assert_eq!(outcome, TransferOutcome::Rejected(RejectReason::Overflow));
        assert_eq!(source.snapshot_balance(), decimal(5));
        assert_eq!(destination.snapshot_balance(), Decimal::MAX);
        assert_eq!(engine.stats().overflow, 1);
    }

    #[test]
    fn test_stats_tally_outcomes() {
        let engine = engine_with(&[100, 50]);
        engine.execute(&TransferRequest::new(0, 1, decimal(30)));
        engine.execute(&TransferRequest::new(0, 1, decimal(1000)));
        engine.execute(&TransferRequest::new(1, 1, decimal(1)));

        let stats = engine.stats();
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.insufficient_funds, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.rejected(), 2);
        assert_eq!(stats.total(), 3);
    }
}
