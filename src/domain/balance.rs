use crate::domain::rejection::Rejection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A strictly positive transfer amount in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, Rejection> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(Rejection::NonPositiveAmount)
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = Rejection;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Written as `AUTO` or `MANUAL`; read case-insensitively, from text and serde alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum AccountType {
    Auto,
    Manual,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Auto => "AUTO",
            AccountType::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Ok(AccountType::Auto),
            "MANUAL" => Ok(AccountType::Manual),
            other => Err(format!("unknown account type '{}'", other)),
        }
    }
}

impl TryFrom<String> for AccountType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Current balance of one account held by this service.
///
/// `amount` never goes below zero. `lmt` is the logical modification token: every
/// change produces a new version with `lmt + 1`, and the ledger only accepts a write
/// when the stored `lmt` still equals the one the change was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Assigned by the store when the balance is first committed.
    pub balance_id: u64,
    pub iban: String,
    pub token: String,
    pub amount: i64,
    #[serde(rename = "type")]
    pub a_type: AccountType,
    pub lmt: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// A fresh, empty balance. The id is filled in on commit.
    pub fn open(iban: String, token: String, a_type: AccountType, now: DateTime<Utc>) -> Self {
        Self {
            balance_id: 0,
            iban,
            token,
            amount: 0,
            a_type,
            lmt: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the next version with `amount` removed.
    pub fn debit(&self, amount: Amount, now: DateTime<Utc>) -> Result<Self, Rejection> {
        if self.amount < amount.value() {
            return Err(Rejection::InsufficientFunds);
        }
        Ok(self.next(self.amount - amount.value(), now))
    }

    /// Returns the next version with `amount` added.
    pub fn credit(&self, amount: Amount, now: DateTime<Utc>) -> Result<Self, Rejection> {
        let amount = self
            .amount
            .checked_add(amount.value())
            .ok_or(Rejection::BalanceOverflow)?;
        Ok(self.next(amount, now))
    }

    fn next(&self, amount: i64, now: DateTime<Utc>) -> Self {
        Self {
            amount,
            lmt: self.lmt + 1,
            updated_at: now.max(self.updated_at),
            ..self.clone()
        }
    }

    /// The amount as a decimal with two fraction digits.
    pub fn display_amount(&self) -> Decimal {
        Decimal::new(self.amount, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(amount: i64, lmt: u64) -> Balance {
        let mut b = Balance::open(
            "NL39OPEN0000000001".to_string(),
            "token".to_string(),
            AccountType::Auto,
            Utc::now(),
        );
        b.amount = amount;
        b.lmt = lmt;
        b
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(1).is_ok());
        assert_eq!(Amount::new(0), Err(Rejection::NonPositiveAmount));
        assert_eq!(Amount::new(-5), Err(Rejection::NonPositiveAmount));
    }

    #[test]
    fn test_debit_bumps_lmt() {
        let b = balance(100, 5);
        let next = b.debit(Amount::new(30).unwrap(), Utc::now()).unwrap();
        assert_eq!(next.amount, 70);
        assert_eq!(next.lmt, 6);
        assert_eq!(next.balance_id, b.balance_id);
        assert!(next.updated_at >= b.updated_at);
    }

    #[test]
    fn test_debit_insufficient() {
        let b = balance(10, 1);
        assert_eq!(
            b.debit(Amount::new(11).unwrap(), Utc::now()),
            Err(Rejection::InsufficientFunds)
        );
        // Draining to exactly zero is allowed.
        assert_eq!(b.debit(Amount::new(10).unwrap(), Utc::now()).unwrap().amount, 0);
    }

    #[test]
    fn test_credit_overflow() {
        let b = balance(i64::MAX, 0);
        assert_eq!(
            b.credit(Amount::new(1).unwrap(), Utc::now()),
            Err(Rejection::BalanceOverflow)
        );
    }

    #[test]
    fn test_display_amount() {
        assert_eq!(balance(7000, 0).display_amount(), dec!(70.00));
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("auto".parse::<AccountType>().unwrap(), AccountType::Auto);
        assert_eq!("MANUAL".parse::<AccountType>().unwrap(), AccountType::Manual);
        assert!("other".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_account_type_serde_matches_parse() {
        let manual: AccountType = serde_json::from_str("\"manual\"").unwrap();
        assert_eq!(manual, AccountType::Manual);
        assert_eq!(serde_json::to_string(&manual).unwrap(), "\"MANUAL\"");
        assert!(serde_json::from_str::<AccountType>("\"savings\"").is_err());
    }
}
