use crate::config::EngineConfig;
use crate::domain::balance::Balance;
use crate::domain::command::{Command, ConfirmAccountCreation};
use crate::domain::confirmation::{Cac, Record};
use crate::domain::iban::{new_iban, new_token, valid_open_iban, valid_token};
use crate::domain::ledger::{Commit, StoredRecord, UnitOfWork};
use crate::domain::ports::LedgerStoreRef;
use crate::domain::rejection::Rejection;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::router::{CommandHandler, Outcome};

/// Confirms account creation requests.
///
/// A confirmed request opens an empty balance under a fresh (or requested) open iban
/// and stores the terminal `Cac` in the same unit of work. Requests for a uuid that
/// already has a `Cac` get the stored outcome back.
pub struct AccountCreationHandler {
    store: LedgerStoreRef,
    config: EngineConfig,
    generate_iban: Box<dyn Fn() -> String + Send + Sync>,
}

impl AccountCreationHandler {
    pub fn new(store: LedgerStoreRef, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            generate_iban: Box::new(|| new_iban(&mut rand::thread_rng())),
        }
    }

    /// Replaces the source of ibans for requests that do not name one.
    pub fn with_iban_generator(
        mut self,
        generate: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        self.generate_iban = Box::new(generate);
        self
    }

    pub async fn confirm(&self, cmd: ConfirmAccountCreation) -> Result<Outcome> {
        if let Some(cac) = self.store.cac(cmd.id).await? {
            debug!("replaying stored account creation outcome");
            return Ok(Outcome::from_cac(&cac, true));
        }

        if let Some(iban) = &cmd.iban
            && !valid_open_iban(iban)
        {
            return self.reject(&cmd, Rejection::InvalidIban).await;
        }
        if let Some(token) = &cmd.token
            && !valid_token(token)
        {
            return self.reject(&cmd, Rejection::MalformedToken).await;
        }

        let token = cmd
            .token
            .clone()
            .unwrap_or_else(|| new_token(&mut rand::thread_rng()));

        for attempt in 0..=self.config.max_retries {
            let iban = cmd.iban.clone().unwrap_or_else(|| (self.generate_iban)());
            let cac = Cac::confirmed(cmd.id, iban.clone(), token.clone(), cmd.a_type);
            let balance = Balance::open(iban.clone(), token.clone(), cmd.a_type, Utc::now());
            let unit = UnitOfWork::new(Record::Cac(cac.clone())).insert(balance);

            match self.store.commit(unit).await? {
                Commit::Committed(_) => {
                    info!(%iban, a_type = %cmd.a_type, "account created");
                    return Ok(Outcome::from_cac(&cac, false));
                }
                Commit::Duplicate(stored) => return replay(stored),
                Commit::Conflict { .. } if cmd.iban.is_some() => {
                    return self.reject(&cmd, Rejection::IbanTaken).await;
                }
                Commit::Conflict { iban } => {
                    warn!(%iban, attempt, "generated iban already taken");
                }
            }
        }

        self.reject(&cmd, Rejection::GeneratedIbanTaken).await
    }

    async fn reject(&self, cmd: &ConfirmAccountCreation, rejection: Rejection) -> Result<Outcome> {
        info!(reason = %rejection, "account creation failed");
        let cac = Cac::failed(cmd.id, cmd.a_type, &rejection);
        match self.store.commit(UnitOfWork::new(Record::Cac(cac.clone()))).await? {
            Commit::Committed(_) => Ok(Outcome::from_cac(&cac, false)),
            Commit::Duplicate(stored) => replay(stored),
            Commit::Conflict { iban } => Err(EngineError::StorageError(format!(
                "unguarded account creation failure conflicted on {}",
                iban
            ))),
        }
    }
}

fn replay(stored: StoredRecord) -> Result<Outcome> {
    match stored {
        StoredRecord::Cac(cac) => {
            debug!("another worker committed this uuid first");
            Ok(Outcome::from_cac(&cac, true))
        }
        StoredRecord::Cmt(cmt) => Err(EngineError::StorageError(format!(
            "expected a cac record for {}, found a cmt",
            cmt.uuid
        ))),
    }
}

#[async_trait]
impl CommandHandler for AccountCreationHandler {
    async fn handle(&self, command: Command) -> Result<Outcome> {
        match command {
            Command::ConfirmAccountCreation(cmd) => self.confirm(cmd).await,
            other => Err(EngineError::ValidationError(format!(
                "account creation handler cannot process {} commands",
                other.channel()
            ))),
        }
    }
}
