use crate::domain::balance::AccountType;
use crate::domain::event::BalanceChanged;
use crate::domain::rejection::Rejection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome of an account creation command, stored once per uuid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cac {
    pub uuid: Uuid,
    pub iban: Option<String>,
    pub token: Option<String>,
    #[serde(rename = "type")]
    pub a_type: AccountType,
    /// `None` when the account was created.
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Cac {
    pub fn confirmed(uuid: Uuid, iban: String, token: String, a_type: AccountType) -> Self {
        Self {
            uuid,
            iban: Some(iban),
            token: Some(token),
            a_type,
            reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn failed(uuid: Uuid, a_type: AccountType, rejection: &Rejection) -> Self {
        Self {
            uuid,
            iban: None,
            token: None,
            a_type,
            reason: Some(rejection.reason()),
            created_at: Utc::now(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.reason.is_none()
    }
}

/// Terminal outcome of a money transfer command, stored once per uuid.
///
/// A confirmed transfer also keeps the balance changes it caused, source first, so a
/// redelivered command can publish them again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cmt {
    pub uuid: Uuid,
    pub reason: Option<String>,
    #[serde(default)]
    pub changes: Vec<BalanceChanged>,
    pub created_at: DateTime<Utc>,
}

impl Cmt {
    pub fn confirmed(uuid: Uuid) -> Self {
        Self {
            uuid,
            reason: None,
            changes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn failed(uuid: Uuid, rejection: &Rejection) -> Self {
        Self {
            uuid,
            reason: Some(rejection.reason()),
            changes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_changes(mut self, changes: Vec<BalanceChanged>) -> Self {
        self.changes = changes;
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.reason.is_none()
    }
}

/// Either confirmation record, as carried by a unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Cac(Cac),
    Cmt(Cmt),
}

impl Record {
    pub fn uuid(&self) -> Uuid {
        match self {
            Record::Cac(cac) => cac.uuid,
            Record::Cmt(cmt) => cmt.uuid,
        }
    }
}
