use super::balance::Balance;
use super::confirmation::{Cac, Cmt};
use super::event::Envelope;
use super::ledger::{Commit, UnitOfWork};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Persistence for the `balance`, `cac` and `cmt` tables.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn balance(&self, iban: &str) -> Result<Option<Balance>>;
    async fn balances(&self) -> Result<Vec<Balance>>;
    async fn cac(&self, uuid: Uuid) -> Result<Option<Cac>>;
    async fn cmt(&self, uuid: Uuid) -> Result<Option<Cmt>>;
    /// Applies the unit atomically, or reports why it was not applied.
    async fn commit(&self, unit: UnitOfWork) -> Result<Commit>;
}

/// Destination for outcome events, one keyed record per call.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, envelope: Envelope) -> Result<()>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type EventSinkRef = Arc<dyn EventSink>;
