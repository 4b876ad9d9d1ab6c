use rust_decimal::Decimal;
use thiserror::Error;

/// A transfer between two ledger positions, as a selection policy emits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: usize,
    pub destination: usize,
    pub amount: Decimal,
}

impl TransferRequest {
    pub fn new(source: usize, destination: usize, amount: Decimal) -> Self {
        Self {
            source,
            destination,
            amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Committed,
    Rejected(RejectReason),
}

impl TransferOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransferOutcome::Committed)
    }
}

/// Why a transfer left both balances untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("credit would overflow the destination balance")]
    Overflow,
}

/// Requests refused before any lock is taken.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("source and destination are the same account")]
    SameAccount,

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("no account at ledger position {0}")]
    UnknownAccount(usize),
}

impl From<InvalidRequest> for TransferOutcome {
    fn from(reason: InvalidRequest) -> Self {
        TransferOutcome::Rejected(reason.into())
    }
}
