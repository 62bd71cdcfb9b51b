//! Units of work applied atomically by a [`LedgerStore`](crate::domain::ports::LedgerStore).
//!
//! A unit carries one terminal confirmation record plus the balance rows that change
//! with it. Every balance the decision was based on is guarded by the `lmt` it was read
//! at; the store applies the unit only when all guards still hold and the record's uuid
//! has not been committed before. Otherwise nothing is written.

use crate::domain::balance::Balance;
use crate::domain::confirmation::{Cac, Cmt, Record};
use crate::error::Result;

/// What a balance row must look like at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// No balance exists for the iban yet.
    Absent,
    /// The stored balance is at exactly this lmt.
    Lmt(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    pub iban: String,
    pub expected: Expected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    pub record: Record,
    pub guards: Vec<Guard>,
    pub writes: Vec<Balance>,
}

impl UnitOfWork {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            guards: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Guards `balance` at its current lmt without writing it.
    pub fn read(mut self, balance: &Balance) -> Self {
        self.push_guard(&balance.iban, Expected::Lmt(balance.lmt));
        self
    }

    /// Guards that no balance exists for `iban`, without writing one.
    pub fn expect_absent(mut self, iban: &str) -> Self {
        self.push_guard(iban, Expected::Absent);
        self
    }

    /// Inserts a new balance; conflicts if the iban is already taken.
    pub fn insert(mut self, balance: Balance) -> Self {
        self.push_guard(&balance.iban, Expected::Absent);
        self.writes.push(balance);
        self
    }

    /// Replaces `current` with `next`, guarded by the lmt of `current`.
    pub fn update(mut self, current: &Balance, next: Balance) -> Self {
        debug_assert_eq!(current.iban, next.iban);
        debug_assert!(next.lmt > current.lmt);
        self.push_guard(&current.iban, Expected::Lmt(current.lmt));
        self.writes.push(next);
        self
    }

    fn push_guard(&mut self, iban: &str, expected: Expected) {
        self.guards.retain(|g| g.iban != iban);
        self.guards.push(Guard {
            iban: iban.to_string(),
            expected,
        });
    }

    /// Returns the first guard that does not hold, given a way to read the stored lmt.
    pub fn violated_guard<F>(&self, mut stored_lmt: F) -> Result<Option<&Guard>>
    where
        F: FnMut(&str) -> Result<Option<u64>>,
    {
        for guard in &self.guards {
            let stored = stored_lmt(&guard.iban)?;
            let holds = match (guard.expected, stored) {
                (Expected::Absent, None) => true,
                (Expected::Lmt(lmt), Some(current)) => lmt == current,
                _ => false,
            };
            if !holds {
                return Ok(Some(guard));
            }
        }
        Ok(None)
    }
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    /// Everything was written. Inserted balances carry their assigned ids.
    Committed(Vec<Balance>),
    /// A guard failed for this iban; nothing was written.
    Conflict { iban: String },
    /// The uuid already has a terminal record; nothing was written.
    Duplicate(StoredRecord),
}

/// A previously committed record, returned for idempotent replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRecord {
    Cac(Cac),
    Cmt(Cmt),
}
