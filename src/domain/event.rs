use crate::domain::balance::{AccountType, Balance};
use crate::domain::channel::Channel;
use crate::domain::confirmation::{Cac, Cmt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreationConfirmed {
    pub id: Uuid,
    pub iban: String,
    pub token: String,
    pub a_type: AccountType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreationFailed {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyTransferConfirmed {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyTransferFailed {
    pub id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChanged {
    pub iban: String,
    pub new_balance: i64,
    pub changed_by: i64,
    /// Counterparty of the transfer.
    pub from_to: String,
    pub description: String,
}

/// Outcome payloads. The channel identifies the variant on the wire, so the
/// payload itself is serialized untagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Event {
    AccountCreationConfirmed(AccountCreationConfirmed),
    AccountCreationFailed(AccountCreationFailed),
    MoneyTransferConfirmed(MoneyTransferConfirmed),
    MoneyTransferFailed(MoneyTransferFailed),
    BalanceChanged(BalanceChanged),
}

impl Event {
    pub fn channel(&self) -> Channel {
        match self {
            Event::AccountCreationConfirmed(_) => Channel::Acfa,
            Event::AccountCreationFailed(_) => Channel::Acco,
            Event::MoneyTransferConfirmed(_) => Channel::Mtco,
            Event::MoneyTransferFailed(_) => Channel::Mtfa,
            Event::BalanceChanged(_) => Channel::Bach,
        }
    }

    /// Broker key: the command uuid for outcomes, the iban for balance changes.
    pub fn key(&self) -> String {
        match self {
            Event::AccountCreationConfirmed(e) => e.id.hyphenated().to_string(),
            Event::AccountCreationFailed(e) => e.id.hyphenated().to_string(),
            Event::MoneyTransferConfirmed(e) => e.id.hyphenated().to_string(),
            Event::MoneyTransferFailed(e) => e.id.hyphenated().to_string(),
            Event::BalanceChanged(e) => e.iban.clone(),
        }
    }

    /// The outcome event a stored account creation record stands for.
    pub fn from_cac(cac: &Cac) -> Self {
        match (&cac.reason, &cac.iban, &cac.token) {
            (None, Some(iban), Some(token)) => {
                Event::AccountCreationConfirmed(AccountCreationConfirmed {
                    id: cac.uuid,
                    iban: iban.clone(),
                    token: token.clone(),
                    a_type: cac.a_type,
                })
            }
            (reason, _, _) => Event::AccountCreationFailed(AccountCreationFailed {
                id: cac.uuid,
                reason: reason.clone().unwrap_or_default(),
            }),
        }
    }

    /// The outcome event a stored money transfer record stands for.
    pub fn from_cmt(cmt: &Cmt) -> Self {
        match &cmt.reason {
            None => Event::MoneyTransferConfirmed(MoneyTransferConfirmed { id: cmt.uuid }),
            Some(reason) => Event::MoneyTransferFailed(MoneyTransferFailed {
                id: cmt.uuid,
                reason: reason.clone(),
            }),
        }
    }
}

impl BalanceChanged {
    pub fn new(balance: &Balance, changed_by: i64, from_to: &str, description: &str) -> Self {
        Self {
            iban: balance.iban.clone(),
            new_balance: balance.amount,
            changed_by,
            from_to: from_to.to_string(),
            description: description.to_string(),
        }
    }
}

/// A keyed record on an output channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub channel: Channel,
    pub key: String,
    pub value: Event,
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        Self {
            channel: event.channel(),
            key: event.key(),
            value: event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rejection::Rejection;

    #[test]
    fn test_cac_replay_event() {
        let id = Uuid::new_v4();
        let cac = Cac::confirmed(id, "NL39OPEN0000000001".into(), "t".into(), AccountType::Manual);
        let envelope = Envelope::from(Event::from_cac(&cac));
        assert_eq!(envelope.channel, Channel::Acfa);
        assert_eq!(envelope.key, id.hyphenated().to_string());

        let failed = Cac::failed(id, AccountType::Auto, &Rejection::IbanTaken);
        let envelope = Envelope::from(Event::from_cac(&failed));
        assert_eq!(envelope.channel, Channel::Acco);
        assert_eq!(
            envelope.value,
            Event::AccountCreationFailed(AccountCreationFailed {
                id,
                reason: "iban already exists".into()
            })
        );
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = Envelope::from(Event::BalanceChanged(BalanceChanged {
            iban: "NL39OPEN0000000001".into(),
            new_balance: 70,
            changed_by: -30,
            from_to: "NL12OPEN0000000002".into(),
            description: "rent".into(),
        }));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["channel"], "bach");
        assert_eq!(json["key"], "NL39OPEN0000000001");
        assert_eq!(json["value"]["changed_by"], -30);
    }
}
