use crate::domain::balance::Balance;
use crate::domain::channel::Channel;
use crate::domain::confirmation::{Cac, Cmt, Record};
use crate::domain::event::Envelope;
use crate::domain::ledger::{Commit, StoredRecord, UnitOfWork};
use crate::domain::ports::{EventSink, LedgerStore};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    balances: HashMap<String, Balance>,
    cacs: HashMap<Uuid, Cac>,
    cmts: HashMap<Uuid, Cmt>,
    next_balance_id: u64,
}

/// A thread-safe in-memory ledger.
///
/// All three tables live behind one `RwLock`, so a commit checks its guards and
/// applies its writes without any other commit interleaving.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn balance(&self, iban: &str) -> Result<Option<Balance>> {
        let tables = self.tables.read().await;
        Ok(tables.balances.get(iban).cloned())
    }

    async fn balances(&self) -> Result<Vec<Balance>> {
        let tables = self.tables.read().await;
        let mut all: Vec<Balance> = tables.balances.values().cloned().collect();
        all.sort_by_key(|b| b.balance_id);
        Ok(all)
    }

    async fn cac(&self, uuid: Uuid) -> Result<Option<Cac>> {
        let tables = self.tables.read().await;
        Ok(tables.cacs.get(&uuid).cloned())
    }

    async fn cmt(&self, uuid: Uuid) -> Result<Option<Cmt>> {
        let tables = self.tables.read().await;
        Ok(tables.cmts.get(&uuid).cloned())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<Commit> {
        let mut tables = self.tables.write().await;

        let existing = match &unit.record {
            Record::Cac(cac) => tables.cacs.get(&cac.uuid).cloned().map(StoredRecord::Cac),
            Record::Cmt(cmt) => tables.cmts.get(&cmt.uuid).cloned().map(StoredRecord::Cmt),
        };
        if let Some(existing) = existing {
            return Ok(Commit::Duplicate(existing));
        }

        if let Some(guard) =
            unit.violated_guard(|iban| Ok(tables.balances.get(iban).map(|b| b.lmt)))?
        {
            return Ok(Commit::Conflict {
                iban: guard.iban.clone(),
            });
        }

        let mut written = Vec::with_capacity(unit.writes.len());
        for mut balance in unit.writes {
            let known_id = tables.balances.get(&balance.iban).map(|b| b.balance_id);
            balance.balance_id = match known_id {
                Some(id) => id,
                None => {
                    tables.next_balance_id += 1;
                    tables.next_balance_id
                }
            };
            tables.balances.insert(balance.iban.clone(), balance.clone());
            written.push(balance);
        }
        match unit.record {
            Record::Cac(cac) => {
                tables.cacs.insert(cac.uuid, cac);
            }
            Record::Cmt(cmt) => {
                tables.cmts.insert(cmt.uuid, cmt);
            }
        }

        Ok(Commit::Committed(written))
    }
}

/// In-memory broker for tests and embedding.
///
/// Keeps every published record per channel and fans records out to live subscribers.
/// Subscribers that went away are dropped on the next publish.
#[derive(Default, Clone)]
pub struct InMemoryBroker {
    records: Arc<Mutex<HashMap<Channel, Vec<Envelope>>>>,
    subscribers: Arc<Mutex<Vec<(Channel, mpsc::UnboundedSender<Envelope>)>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published on `channel` so far, in publish order.
    pub async fn records(&self, channel: Channel) -> Vec<Envelope> {
        let records = self.records.lock().await;
        records.get(&channel).cloned().unwrap_or_default()
    }

    pub async fn count(&self, channel: Channel) -> usize {
        let records = self.records.lock().await;
        records.get(&channel).map_or(0, Vec::len)
    }

    /// Receives every record published on `channel` after this call.
    pub async fn subscribe(&self, channel: Channel) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push((channel, tx));
        rx
    }
}

#[async_trait]
impl EventSink for InMemoryBroker {
    async fn publish(&self, envelope: Envelope) -> Result<()> {
        if envelope.channel.is_input() {
            return Err(EngineError::PublishError(format!(
                "{} is an input channel",
                envelope.channel
            )));
        }
        {
            let mut subscribers = self.subscribers.lock().await;
            subscribers.retain(|(channel, tx)| {
                *channel != envelope.channel || tx.send(envelope.clone()).is_ok()
            });
        }
        let mut records = self.records.lock().await;
        records.entry(envelope.channel).or_default().push(envelope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::balance::{AccountType, Amount};
    use crate::domain::event::{Event, MoneyTransferConfirmed};
    use crate::domain::ledger::Expected;
    use chrono::Utc;

    fn open(iban: &str) -> Balance {
        Balance::open(iban.into(), "token".into(), AccountType::Auto, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let ledger = InMemoryLedger::new();
        let id = Uuid::new_v4();
        let cac = Cac::confirmed(id, "A".into(), "token".into(), AccountType::Auto);
        let commit = ledger
            .commit(UnitOfWork::new(Record::Cac(cac.clone())).insert(open("A")))
            .await
            .unwrap();

        let Commit::Committed(written) = commit else {
            panic!("expected the unit to commit");
        };
        assert_eq!(written[0].balance_id, 1);
        assert_eq!(ledger.cac(id).await.unwrap(), Some(cac));
        assert_eq!(ledger.balance("A").await.unwrap().unwrap().balance_id, 1);
    }

    #[tokio::test]
    async fn test_duplicate_record_writes_nothing() {
        let ledger = InMemoryLedger::new();
        let id = Uuid::new_v4();
        let first = UnitOfWork::new(Record::Cmt(Cmt::confirmed(id)));
        ledger.commit(first).await.unwrap();

        let second = UnitOfWork::new(Record::Cmt(Cmt::confirmed(id))).insert(open("B"));
        let commit = ledger.commit(second).await.unwrap();
        assert!(matches!(commit, Commit::Duplicate(StoredRecord::Cmt(_))));
        assert!(ledger.balance("B").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_lmt_conflicts_atomically() {
        let ledger = InMemoryLedger::new();
        let cac = Cac::confirmed(Uuid::new_v4(), "A".into(), "token".into(), AccountType::Auto);
        ledger
            .commit(UnitOfWork::new(Record::Cac(cac)).insert(open("A")).insert(open("B")))
            .await
            .unwrap();

        let a = ledger.balance("A").await.unwrap().unwrap();
        let mut b = ledger.balance("B").await.unwrap().unwrap();
        let a_next = a.credit(Amount::new(5).unwrap(), Utc::now()).unwrap();
        b.lmt = 7; // stale view
        let b_next = b.credit(Amount::new(5).unwrap(), Utc::now()).unwrap();

        let unit = UnitOfWork::new(Record::Cmt(Cmt::confirmed(Uuid::new_v4())))
            .update(&a, a_next)
            .update(&b, b_next);
        assert_eq!(unit.guards[1].expected, Expected::Lmt(7));

        let commit = ledger.commit(unit).await.unwrap();
        assert_eq!(commit, Commit::Conflict { iban: "B".into() });
        // First write of the unit must not have been applied either.
        assert_eq!(ledger.balance("A").await.unwrap().unwrap().amount, 0);
        assert_eq!(ledger.balances().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_broker_records_and_fans_out() {
        let broker = InMemoryBroker::new();
        let mut rx = broker.subscribe(Channel::Mtco).await;
        let envelope = Envelope::from(Event::MoneyTransferConfirmed(MoneyTransferConfirmed {
            id: Uuid::new_v4(),
        }));

        broker.publish(envelope.clone()).await.unwrap();

        assert_eq!(broker.records(Channel::Mtco).await, vec![envelope.clone()]);
        assert_eq!(broker.count(Channel::Mtfa).await, 0);
        assert_eq!(rx.recv().await, Some(envelope));
    }
}
