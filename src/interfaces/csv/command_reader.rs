use crate::domain::balance::AccountType;
use crate::domain::channel::Channel;
use crate::domain::command::{Command, ConfirmAccountCreation, ConfirmMoneyTransfer};
use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

/// One line of the command file. Which columns matter depends on the channel.
#[derive(Debug, Deserialize)]
struct CommandRow {
    channel: Channel,
    id: Uuid,
    a_type: Option<AccountType>,
    iban: Option<String>,
    token: Option<String>,
    amount: Option<i64>,
    from: Option<String>,
    to: Option<String>,
    description: Option<String>,
}

impl TryFrom<CommandRow> for Command {
    type Error = EngineError;

    fn try_from(row: CommandRow) -> Result<Self> {
        let missing = |field: &str| {
            EngineError::ValidationError(format!(
                "{} command {} has no {}",
                row.channel, row.id, field
            ))
        };
        match row.channel {
            Channel::Cac => Ok(Command::ConfirmAccountCreation(ConfirmAccountCreation {
                id: row.id,
                a_type: row.a_type.ok_or_else(|| missing("a_type"))?,
                iban: row.iban,
                token: row.token,
            })),
            Channel::Cmt => Ok(Command::ConfirmMoneyTransfer(ConfirmMoneyTransfer {
                id: row.id,
                amount: row.amount.ok_or_else(|| missing("amount"))?,
                from: row.from.ok_or_else(|| missing("from"))?,
                to: row.to.ok_or_else(|| missing("to"))?,
                token: row.token.unwrap_or_default(),
                description: row.description.unwrap_or_default(),
            })),
            other => Err(EngineError::ValidationError(format!(
                "{} is not an input channel",
                other
            ))),
        }
    }
}

/// Reads commands from a CSV source.
///
/// Expected header: `channel,id,a_type,iban,token,amount,from,to,description`.
/// Whitespace is trimmed and short rows are accepted; unused columns may stay empty.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads, deserializes and checks commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize::<CommandRow>().map(|result| {
            result
                .map_err(EngineError::from)
                .and_then(Command::try_from)
        })
    }
}
