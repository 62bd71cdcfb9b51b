use crate::config::EngineConfig;
use crate::domain::balance::{Amount, Balance};
use crate::domain::command::{Command, ConfirmMoneyTransfer};
use crate::domain::confirmation::{Cmt, Record};
use crate::domain::event::BalanceChanged;
use crate::domain::iban::{valid_from, valid_iban, valid_open_iban};
use crate::domain::ledger::{Commit, StoredRecord, UnitOfWork};
use crate::domain::ports::LedgerStoreRef;
use crate::domain::rejection::Rejection;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::router::{CommandHandler, Outcome};

/// Checks that need no ledger access, in the order they are reported.
fn validate(cmd: &ConfirmMoneyTransfer) -> std::result::Result<Amount, Rejection> {
    if !valid_from(&cmd.from) {
        return Err(Rejection::InvalidFrom);
    }
    if cmd.from == cmd.to {
        return Err(Rejection::SameAccount);
    }
    if !valid_iban(&cmd.to) {
        return Err(Rejection::InvalidTo);
    }
    Amount::new(cmd.amount)
}

/// What the ledger holds for one side of a transfer.
enum Lookup {
    /// Cash or another bank's account; no balance row.
    External,
    Missing(String),
    Found(Balance),
}

/// The decision for one attempt, computed from a single read of the ledger.
#[derive(Default)]
struct Plan {
    reads: Vec<Balance>,
    missing: Vec<String>,
    updates: Vec<(Balance, Balance)>,
    rejection: Option<Rejection>,
}

impl Plan {
    fn reject(mut self, rejection: Rejection) -> Self {
        self.updates.clear();
        self.rejection = Some(rejection);
        self
    }

    /// Every balance the decision looked at is guarded, whether or not it is written.
    fn into_unit(self, cmd: &ConfirmMoneyTransfer) -> (UnitOfWork, Cmt) {
        let cmt = match &self.rejection {
            Some(rejection) => Cmt::failed(cmd.id, rejection),
            None => Cmt::confirmed(cmd.id).with_changes(
                self.updates
                    .iter()
                    .map(|(_, next)| balance_change(cmd, next))
                    .collect(),
            ),
        };
        let mut unit = UnitOfWork::new(Record::Cmt(cmt.clone()));
        for balance in &self.reads {
            unit = unit.read(balance);
        }
        for iban in &self.missing {
            unit = unit.expect_absent(iban);
        }
        for (current, next) in self.updates {
            unit = unit.update(&current, next);
        }
        (unit, cmt)
    }
}

/// Confirms money transfers between accounts.
///
/// Both balance changes and the `Cmt` record are committed as one unit guarded by the
/// lmt values that were read. A conflicting commit is retried from a fresh read with
/// backoff, up to `max_retries` times.
pub struct MoneyTransferHandler {
    store: LedgerStoreRef,
    config: EngineConfig,
}

impl MoneyTransferHandler {
    pub fn new(store: LedgerStoreRef, config: EngineConfig) -> Self {
        Self { store, config }
    }

    async fn lookup(&self, iban: &str) -> Result<Lookup> {
        if !valid_open_iban(iban) {
            return Ok(Lookup::External);
        }
        Ok(match self.store.balance(iban).await? {
            Some(balance) => Lookup::Found(balance),
            None => Lookup::Missing(iban.to_string()),
        })
    }

    async fn plan(&self, cmd: &ConfirmMoneyTransfer, amount: Amount) -> Result<Plan> {
        let from = self.lookup(&cmd.from).await?;
        let to = self.lookup(&cmd.to).await?;
        let mut plan = Plan::default();
        let now = Utc::now();

        for lookup in [&from, &to] {
            match lookup {
                Lookup::Found(balance) => plan.reads.push(balance.clone()),
                Lookup::Missing(iban) => plan.missing.push(iban.clone()),
                Lookup::External => {}
            }
        }

        let from = match from {
            Lookup::Missing(iban) => return Ok(plan.reject(Rejection::UnknownIban(iban))),
            Lookup::Found(balance) => Some(balance),
            Lookup::External => None,
        };
        let to = match to {
            Lookup::Missing(iban) => return Ok(plan.reject(Rejection::UnknownIban(iban))),
            Lookup::Found(balance) => Some(balance),
            Lookup::External => None,
        };

        if let Some(source) = from {
            if source.token != cmd.token {
                return Ok(plan.reject(Rejection::InvalidToken));
            }
            match source.debit(amount, now) {
                Ok(next) => plan.updates.push((source, next)),
                Err(rejection) => return Ok(plan.reject(rejection)),
            }
        }
        if let Some(destination) = to {
            match destination.credit(amount, now) {
                Ok(next) => plan.updates.push((destination, next)),
                Err(rejection) => return Ok(plan.reject(rejection)),
            }
        }
        Ok(plan)
    }

    pub async fn confirm(&self, cmd: ConfirmMoneyTransfer) -> Result<Outcome> {
        if let Some(cmt) = self.store.cmt(cmd.id).await? {
            debug!("replaying stored money transfer outcome");
            return Ok(Outcome::from_cmt(&cmt, true));
        }

        let valid = validate(&cmd);
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }

            let plan = match &valid {
                Ok(amount) => self.plan(&cmd, *amount).await?,
                Err(rejection) => Plan::default().reject(rejection.clone()),
            };
            let (unit, cmt) = plan.into_unit(&cmd);
            match self.store.commit(unit).await? {
                Commit::Committed(_) => {
                    match &cmt.reason {
                        Some(reason) => info!(%reason, "money transfer failed"),
                        None => info!(
                            from = %cmd.from,
                            to = %cmd.to,
                            amount = cmd.amount,
                            "money transfer confirmed"
                        ),
                    }
                    return Ok(Outcome::from_cmt(&cmt, false));
                }
                Commit::Duplicate(stored) => return replay(stored),
                Commit::Conflict { iban } => {
                    warn!(%iban, attempt, "lmt conflict, retrying transfer");
                }
            }
        }

        Err(EngineError::RetriesExhausted {
            id: cmd.id,
            attempts: self.config.max_retries + 1,
        })
    }
}

/// The change a transfer makes to one side, seen from that account.
fn balance_change(cmd: &ConfirmMoneyTransfer, next: &Balance) -> BalanceChanged {
    if next.iban == cmd.from {
        BalanceChanged::new(next, -cmd.amount, &cmd.to, &cmd.description)
    } else {
        BalanceChanged::new(next, cmd.amount, &cmd.from, &cmd.description)
    }
}

fn replay(stored: StoredRecord) -> Result<Outcome> {
    match stored {
        StoredRecord::Cmt(cmt) => {
            debug!("another worker committed this uuid first");
            Ok(Outcome::from_cmt(&cmt, true))
        }
        StoredRecord::Cac(cac) => Err(EngineError::StorageError(format!(
            "expected a cmt record for {}, found a cac",
            cac.uuid
        ))),
    }
}

#[async_trait]
impl CommandHandler for MoneyTransferHandler {
    async fn handle(&self, command: Command) -> Result<Outcome> {
        match command {
            Command::ConfirmMoneyTransfer(cmd) => self.confirm(cmd).await,
            other => Err(EngineError::ValidationError(format!(
                "money transfer handler cannot process {} commands",
                other.channel()
            ))),
        }
    }
}
