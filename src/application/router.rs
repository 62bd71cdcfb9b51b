use crate::config::EngineConfig;
use crate::domain::channel::Channel;
use crate::domain::command::Command;
use crate::domain::confirmation::{Cac, Cmt};
use crate::domain::event::{Envelope, Event};
use crate::domain::lifecycle::CommandState;
use crate::domain::ports::{EventSinkRef, LedgerStoreRef};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use super::account_creation::AccountCreationHandler;
use super::money_transfer::MoneyTransferHandler;

/// What a handler decided for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub id: Uuid,
    /// Always terminal.
    pub state: CommandState,
    /// True when the outcome was read back from an earlier run of the same uuid.
    pub replayed: bool,
    /// Events to publish, in order.
    pub events: Vec<Event>,
}

impl Outcome {
    pub fn from_cac(cac: &Cac, replayed: bool) -> Self {
        Self {
            id: cac.uuid,
            state: terminal(cac.is_confirmed()),
            replayed,
            events: vec![Event::from_cac(cac)],
        }
    }

    /// The recorded balance changes follow the outcome event.
    pub fn from_cmt(cmt: &Cmt, replayed: bool) -> Self {
        let mut events = Vec::with_capacity(1 + cmt.changes.len());
        events.push(Event::from_cmt(cmt));
        events.extend(cmt.changes.iter().cloned().map(Event::BalanceChanged));
        Self {
            id: cmt.uuid,
            state: terminal(cmt.is_confirmed()),
            replayed,
            events,
        }
    }
}

fn terminal(confirmed: bool) -> CommandState {
    if confirmed {
        CommandState::Confirmed
    } else {
        CommandState::Failed
    }
}

/// Processes the commands of one input channel.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Command) -> Result<Outcome>;
}

/// Dispatches commands to the handler registered for their channel and publishes
/// the resulting events.
///
/// Publication happens after the outcome is committed. If publishing fails the error
/// is returned; redelivering the command replays the stored outcome, so delivery is
/// at-least-once.
pub struct CommandRouter {
    handlers: HashMap<Channel, Arc<dyn CommandHandler>>,
    sink: EventSinkRef,
    in_flight: Mutex<HashMap<Uuid, CommandState>>,
}

impl CommandRouter {
    /// A router with no handlers registered.
    pub fn new(sink: EventSinkRef) -> Self {
        Self {
            handlers: HashMap::new(),
            sink,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// A router with the account creation and money transfer handlers wired to `store`.
    pub fn with_default_handlers(
        store: LedgerStoreRef,
        sink: EventSinkRef,
        config: EngineConfig,
    ) -> Result<Self> {
        let mut router = Self::new(sink);
        router.register(
            Channel::Cac,
            Arc::new(AccountCreationHandler::new(Arc::clone(&store), config.clone())),
        )?;
        router.register(Channel::Cmt, Arc::new(MoneyTransferHandler::new(store, config)))?;
        Ok(router)
    }

    /// Registers `handler` for an input channel, replacing any previous one.
    pub fn register(&mut self, channel: Channel, handler: Arc<dyn CommandHandler>) -> Result<()> {
        if !channel.is_input() {
            return Err(EngineError::ValidationError(format!(
                "cannot register a handler on output channel {}",
                channel
            )));
        }
        if self.handlers.insert(channel, handler).is_some() {
            warn!(%channel, "replaced command handler");
        }
        Ok(())
    }

    /// Registers `handler` under a channel given by name, e.g. `"cmt"`.
    pub fn register_named(&mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<()> {
        let channel: Channel = name.parse().map_err(EngineError::ValidationError)?;
        self.register(channel, handler)
    }

    /// State of a command currently being processed, if any.
    pub fn in_flight_state(&self, id: Uuid) -> Option<CommandState> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .copied()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn track(&self, id: Uuid, state: Option<CommandState>) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match state {
            Some(state) => {
                in_flight.insert(id, state);
            }
            None => {
                in_flight.remove(&id);
            }
        }
    }

    pub async fn dispatch(&self, command: Command) -> Result<Outcome> {
        let channel = command.channel();
        let id = command.id();
        let handler = self
            .handlers
            .get(&channel)
            .cloned()
            .ok_or(EngineError::NoHandler(channel))?;

        let span = info_span!("command", %id, %channel);
        async move {
            let processing = CommandState::Received.advance(id, CommandState::Processing)?;
            self.track(id, Some(processing));
            let result = handler.handle(command).await;
            self.track(id, None);

            let outcome = result?;
            processing.advance(id, outcome.state)?;
            debug!(state = ?outcome.state, replayed = outcome.replayed, "command finished");

            for event in &outcome.events {
                self.sink.publish(Envelope::from(event.clone())).await?;
            }
            Ok(outcome)
        }
        .instrument(span)
        .await
    }
}
