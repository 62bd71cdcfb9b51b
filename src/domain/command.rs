use crate::domain::balance::AccountType;
use crate::domain::channel::Channel;
use crate::domain::iban::valid_open_iban;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmAccountCreation {
    pub id: Uuid,
    pub a_type: AccountType,
    /// Requested iban; generated when absent.
    pub iban: Option<String>,
    /// Requested token; generated when absent.
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmMoneyTransfer {
    pub id: Uuid,
    pub token: String,
    /// Minor units. Validated by the handler, not on decode, so bad amounts
    /// still produce a recorded failure.
    pub amount: i64,
    pub from: String,
    pub to: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    ConfirmAccountCreation(ConfirmAccountCreation),
    ConfirmMoneyTransfer(ConfirmMoneyTransfer),
}

impl Command {
    pub fn id(&self) -> Uuid {
        match self {
            Command::ConfirmAccountCreation(c) => c.id,
            Command::ConfirmMoneyTransfer(c) => c.id,
        }
    }

    /// The input channel this command arrives on.
    pub fn channel(&self) -> Channel {
        match self {
            Command::ConfirmAccountCreation(_) => Channel::Cac,
            Command::ConfirmMoneyTransfer(_) => Channel::Cmt,
        }
    }

    /// Open accounts this command reads or writes, if known before it runs.
    pub fn accounts(&self) -> Vec<&str> {
        match self {
            Command::ConfirmAccountCreation(c) => c.iban.as_deref().into_iter().collect(),
            Command::ConfirmMoneyTransfer(c) => {
                let mut accounts: Vec<&str> = [c.from.as_str(), c.to.as_str()]
                    .into_iter()
                    .filter(|iban| valid_open_iban(iban))
                    .collect();
                accounts.dedup();
                accounts
            }
        }
    }

    /// Key used to pick a worker shard, so commands for one account keep their order.
    pub fn partition_key(&self) -> String {
        match self {
            Command::ConfirmAccountCreation(c) => {
                c.iban.clone().unwrap_or_else(|| c.id.to_string())
            }
            Command::ConfirmMoneyTransfer(c) if valid_open_iban(&c.from) => c.from.clone(),
            Command::ConfirmMoneyTransfer(c) => c.to.clone(),
        }
    }
}
