use std::sync::{Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;

/// A single ledger account. The balance is only reachable through
/// [`Account::lock`], so every mutation happens with the lock held.
#[derive(Debug)]
pub struct Account {
    id: u32,
    balance: Mutex<Decimal>,
}

impl Account {
    pub fn new(id: u32, balance: Decimal) -> Self {
        Self {
            id,
            balance: Mutex::new(balance),
        }
    }

    /// Identity used to order lock acquisition.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Block until this account's lock is held.
    ///
    /// A poisoned lock is recovered: balances are only ever assigned once
    /// all checks have passed, so the stored value is always complete.
    pub fn lock(&self) -> AccountGuard<'_> {
        AccountGuard {
            id: self.id,
            balance: self.balance.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Current balance, read under the lock.
    pub fn snapshot_balance(&self) -> Decimal {
        self.lock().balance()
    }
}

/// Exclusive access to one account's balance. Dropping it releases the lock.
#[derive(Debug)]
pub struct AccountGuard<'a> {
    id: u32,
    balance: MutexGuard<'a, Decimal>,
}

impl AccountGuard<'_> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn balance(&self) -> Decimal {
        *self.balance
    }

    /// Subtract `amount` if the balance covers it. Returns false and leaves
    /// the balance untouched otherwise.
    pub fn debit(&mut self, amount: Decimal) -> bool {
        debug_assert!(amount > Decimal::ZERO);
        if *self.balance < amount {
            return false;
        }
        *self.balance -= amount;
        true
    }

    pub fn credit(&mut self, amount: Decimal) {
        debug_assert!(amount > Decimal::ZERO);
        *self.balance += amount;
    }

    /// Whether `amount` can be credited without leaving the decimal range.
    pub fn can_credit(&self, amount: Decimal) -> bool {
        self.balance.checked_add(amount).is_some()
    }
}

/// Both locks of a two-account operation, acquired in ascending id order.
///
/// Fields drop in declaration order, so the later-acquired lock is
/// released first, on every exit path including unwinding.
#[derive(Debug)]
pub struct PairGuard<'a> {
    later: AccountGuard<'a>,
    earlier: AccountGuard<'a>,
    source_first: bool,
}

impl<'a> PairGuard<'a> {
    /// Guards for `(source, destination)`, in role order.
    pub fn split(&mut self) -> (&mut AccountGuard<'a>, &mut AccountGuard<'a>) {
        if self.source_first {
            (&mut self.earlier, &mut self.later)
        } else {
            (&mut self.later, &mut self.earlier)
        }
    }

    pub fn source(&self) -> &AccountGuard<'a> {
        if self.source_first { &self.earlier } else { &self.later }
    }

    pub fn destination(&self) -> &AccountGuard<'a> {
        if self.source_first { &self.later } else { &self.earlier }
    }
}

/// Lock two distinct accounts, lower id first regardless of role.
///
/// Callers must not pass the same account twice: the second acquisition
/// would block forever on a lock this thread already holds.
pub fn lock_pair<'a>(source: &'a Account, destination: &'a Account) -> PairGuard<'a> {
    debug_assert!(source.id() != destination.id());
    let source_first = source.id() < destination.id();
    let (first, second) = if source_first {
        (source, destination)
    } else {
        (destination, source)
    };

    let earlier = first.lock();
    let later = second.lock();
    PairGuard {
        later,
        earlier,
        source_first,
    }
}
