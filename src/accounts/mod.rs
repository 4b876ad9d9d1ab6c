pub mod account;
pub mod ledger;

pub use account::{lock_pair, Account, AccountGuard, PairGuard};
pub use ledger::{AccountSeed, Ledger, LedgerError};
