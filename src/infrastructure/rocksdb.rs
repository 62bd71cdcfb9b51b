use crate::domain::balance::Balance;
use crate::domain::confirmation::{Cac, Cmt, Record};
use crate::domain::ledger::{Commit, StoredRecord, UnitOfWork};
use crate::domain::ports::LedgerStore;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for balance rows, keyed by iban.
pub const CF_BALANCE: &str = "balance";
/// Column Family for account creation records, keyed by uuid.
pub const CF_CAC: &str = "cac";
/// Column Family for money transfer records, keyed by uuid.
pub const CF_CMT: &str = "cmt";
/// Column Family for bookkeeping such as the balance id sequence.
pub const CF_META: &str = "meta";

const BALANCE_SEQ_KEY: &[u8] = b"balance_seq";

/// A persistent ledger implementation using RocksDB.
///
/// Each table gets its own Column Family. Commits are serialized by a lock and written
/// as a single `WriteBatch`, so a unit of work lands completely or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBLedger {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBLedger {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_BALANCE, CF_CAC, CF_CMT, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EngineError::StorageError(format!("{} column family not found", name)))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn next_balance_id(&self) -> Result<u64> {
        let current = self
            .db
            .get_cf(self.cf(CF_META)?, BALANCE_SEQ_KEY)?
            .map(|bytes| {
                <[u8; 8]>::try_from(bytes.as_slice())
                    .map(u64::from_be_bytes)
                    .map_err(|_| EngineError::StorageError("corrupt balance sequence".into()))
            })
            .transpose()?
            .unwrap_or(0);
        Ok(current + 1)
    }
}

#[async_trait]
impl LedgerStore for RocksDBLedger {
    async fn balance(&self, iban: &str) -> Result<Option<Balance>> {
        self.get_json(CF_BALANCE, iban.as_bytes())
    }

    async fn balances(&self) -> Result<Vec<Balance>> {
        let mut balances = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_BALANCE)?, IteratorMode::Start) {
            let (_key, value) = item?;
            balances.push(serde_json::from_slice::<Balance>(&value)?);
        }
        balances.sort_by_key(|b| b.balance_id);
        Ok(balances)
    }

    async fn cac(&self, uuid: Uuid) -> Result<Option<Cac>> {
        self.get_json(CF_CAC, uuid.as_bytes())
    }

    async fn cmt(&self, uuid: Uuid) -> Result<Option<Cmt>> {
        self.get_json(CF_CMT, uuid.as_bytes())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<Commit> {
        let _guard = self.commit_lock.lock().await;

        let uuid = unit.record.uuid();
        let existing = match &unit.record {
            Record::Cac(_) => self.get_json::<Cac>(CF_CAC, uuid.as_bytes())?.map(StoredRecord::Cac),
            Record::Cmt(_) => self.get_json::<Cmt>(CF_CMT, uuid.as_bytes())?.map(StoredRecord::Cmt),
        };
        if let Some(existing) = existing {
            return Ok(Commit::Duplicate(existing));
        }

        let violated = unit.violated_guard(|iban| {
            Ok(self
                .get_json::<Balance>(CF_BALANCE, iban.as_bytes())?
                .map(|b| b.lmt))
        })?;
        if let Some(guard) = violated {
            return Ok(Commit::Conflict {
                iban: guard.iban.clone(),
            });
        }

        let mut batch = WriteBatch::default();
        let mut next_id = self.next_balance_id()?;
        let mut written = Vec::with_capacity(unit.writes.len());
        for mut balance in unit.writes {
            let known = self.get_json::<Balance>(CF_BALANCE, balance.iban.as_bytes())?;
            balance.balance_id = match known {
                Some(current) => current.balance_id,
                None => {
                    let id = next_id;
                    next_id += 1;
                    batch.put_cf(self.cf(CF_META)?, BALANCE_SEQ_KEY, id.to_be_bytes());
                    id
                }
            };
            self.put_json(&mut batch, CF_BALANCE, balance.iban.as_bytes(), &balance)?;
            written.push(balance);
        }
        match &unit.record {
            Record::Cac(cac) => self.put_json(&mut batch, CF_CAC, uuid.as_bytes(), cac)?,
            Record::Cmt(cmt) => self.put_json(&mut batch, CF_CMT, uuid.as_bytes(), cmt)?,
        }

        self.db.write(batch)?;
        Ok(Commit::Committed(written))
    }
}
