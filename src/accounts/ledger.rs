use std::collections::HashSet;
use std::io::{Read, Write};

use csv::{ReaderBuilder, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use super::account::Account;

/// One `account,balance` row of an initial ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSeed {
    pub account: u32,
    pub balance: Decimal,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger needs at least one account")]
    Empty,

    #[error("duplicate account id: {0}")]
    DuplicateAccount(u32),

    #[error("account {account} has negative initial balance {balance}")]
    NegativeBalance { account: u32, balance: Decimal },

    #[error("combined initial balance exceeds the decimal range")]
    TotalOverflow,

    #[error("malformed ledger csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Fixed set of accounts shared by every worker. Accounts are never added
/// or removed once the ledger is built.
#[derive(Debug)]
pub struct Ledger {
    accounts: Vec<Account>,
}

impl Ledger {
    /// Transfers only move funds between accounts, so a total that fits
    /// here keeps fitting for the ledger's whole lifetime.
    pub fn new(seeds: impl IntoIterator<Item = AccountSeed>) -> Result<Self, LedgerError> {
        let mut seen = HashSet::new();
        let mut accounts = Vec::new();
        let mut total = Decimal::ZERO;

        for seed in seeds {
            if !seen.insert(seed.account) {
                return Err(LedgerError::DuplicateAccount(seed.account));
            }
            if seed.balance < Decimal::ZERO {
                return Err(LedgerError::NegativeBalance {
                    account: seed.account,
                    balance: seed.balance,
                });
            }
            total = total
                .checked_add(seed.balance)
                .ok_or(LedgerError::TotalOverflow)?;
            accounts.push(Account::new(seed.account, seed.balance));
        }

        if accounts.is_empty() {
            return Err(LedgerError::Empty);
        }
        Ok(Self { accounts })
    }

    /// `count` accounts numbered from 1, each holding `balance`.
    pub fn with_uniform_balance(count: u32, balance: Decimal) -> Result<Self, LedgerError> {
        Self::new((1..=count).map(|account| AccountSeed { account, balance }))
    }

    /// Read `account,balance` rows from a CSV source with a header line.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, LedgerError> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let seeds = rdr
            .deserialize()
            .collect::<Result<Vec<AccountSeed>, csv::Error>>()?;
        Self::new(seeds)
    }

    pub fn get(&self, index: usize) -> Option<&Account> {
        self.accounts.get(index)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Pairs with `len()`; always false since construction rejects empty ledgers.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// `(id, balance)` for every account, in ledger order.
    pub fn snapshot(&self) -> Vec<(u32, Decimal)> {
        self.accounts
            .iter()
            .map(|account| (account.id(), account.snapshot_balance()))
            .collect()
    }

    /// Sum of all balances. Each account is read under its own lock, so
    /// the result is only a consistent total once no transfer is in flight.
    pub fn total_balance(&self) -> Decimal {
        self.accounts
            .iter()
            .map(Account::snapshot_balance)
            .sum()
    }

    /// Write every account's balance as CSV
    pub fn write_balances<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = Writer::from_writer(writer);
        wtr.write_record(["account", "balance"])?;

        for (id, balance) in self.snapshot() {
            wtr.serialize((id, balance.round_dp(2)))?;
        }

        wtr.flush()?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn decimal(amount: i64) -> Decimal {
        Decimal::from(amount)
    }

    fn seed(account: u32, balance: i64) -> AccountSeed {
        AccountSeed {
            account,
            balance: decimal(balance),
        }
    }

    #[test]
    fn test_uniform_ledger() {
        let ledger = Ledger::with_uniform_balance(5, decimal(10_000)).unwrap();
        assert_eq!(ledger.len(), 5);
        assert_eq!(ledger.get(0).unwrap().id(), 1);
        assert_eq!(ledger.get(4).unwrap().id(), 5);
        assert!(ledger.get(5).is_none());
        assert_eq!(ledger.total_balance(), decimal(50_000));
    }

    #[test]
    fn test_duplicate_account_rejected() {
        let err = Ledger::new(vec![seed(1, 10), seed(2, 10), seed(1, 5)]).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAccount(1)));
    }

    #[test]
    fn test_negative_balance_rejected() {
        let err = Ledger::new(vec![seed(1, 10), seed(2, -1)]).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { account: 2, .. }));
    }

    #[test]
    fn test_empty_ledger_rejected() {
        assert!(matches!(Ledger::new(Vec::new()), Err(LedgerError::Empty)));
        assert!(matches!(
            Ledger::with_uniform_balance(0, decimal(1)),
            Err(LedgerError::Empty)
        ));
    }

    #[test]
    fn test_total_overflow_rejected() {
        let err = Ledger::new(vec![
            AccountSeed { account: 1, balance: Decimal::MAX },
            AccountSeed { account: 2, balance: Decimal::ONE },
        ])
        .unwrap_err();
        assert!(matches!(err, LedgerError::TotalOverflow));

        // A single account at the limit still fits
        let ledger = Ledger::new(vec![
            AccountSeed { account: 1, balance: Decimal::MAX },
            seed(2, 0),
        ])
        .unwrap();
        assert_eq!(ledger.total_balance(), Decimal::MAX);
        assert!(!ledger.is_empty());
    }

    #[test]
    fn test_from_csv_reader() {
        let data = "account, balance\n 3, 100.50\n1,0\n";
        let ledger = Ledger::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(
            ledger.snapshot(),
            vec![(3, Decimal::new(10050, 2)), (1, Decimal::ZERO)]
        );
    }

    #[test]
    fn test_from_csv_reader_malformed() {
        let data = "account,balance\n1,lots\n";
        let err = Ledger::from_csv_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::Csv(_)));
    }

    #[test]
    fn test_write_balances() {
        let ledger = Ledger::new(vec![
            AccountSeed {
                account: 1,
                balance: Decimal::new(70_126, 3),
            },
            seed(2, 80),
        ])
        .unwrap();

        let mut out = Vec::new();
        ledger.write_balances(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "account,balance\n1,70.13\n2,80\n");
    }
}
