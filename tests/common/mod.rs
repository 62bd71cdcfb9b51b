#![allow(dead_code)]

use command_handler::application::router::CommandRouter;
use command_handler::config::EngineConfig;
use command_handler::domain::balance::AccountType;
use command_handler::domain::command::{Command, ConfirmAccountCreation, ConfirmMoneyTransfer};
use command_handler::domain::ports::EventSinkRef;
use command_handler::infrastructure::in_memory::{InMemoryBroker, InMemoryLedger};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use uuid::Uuid;

pub const TOKEN: &str = "abcdefghij0123456789";
pub const HEADER: &str = "channel,id,a_type,iban,token,amount,from,to,description";

pub struct Harness {
    pub router: Arc<CommandRouter>,
    pub ledger: InMemoryLedger,
    pub broker: InMemoryBroker,
}

pub fn harness(config: EngineConfig) -> Harness {
    let broker = InMemoryBroker::new();
    harness_with_sink(config, broker.clone(), Arc::new(broker))
}

/// A harness publishing through `sink`; `broker` is what the test inspects.
pub fn harness_with_sink(config: EngineConfig, broker: InMemoryBroker, sink: EventSinkRef) -> Harness {
    let ledger = InMemoryLedger::new();
    let router =
        CommandRouter::with_default_handlers(Arc::new(ledger.clone()), sink, config).unwrap();
    Harness {
        router: Arc::new(router),
        ledger,
        broker,
    }
}

pub fn create(iban: &str) -> Command {
    Command::ConfirmAccountCreation(ConfirmAccountCreation {
        id: Uuid::new_v4(),
        a_type: AccountType::Manual,
        iban: Some(iban.to_string()),
        token: Some(TOKEN.to_string()),
    })
}

pub fn transfer(from: &str, to: &str, amount: i64) -> Command {
    Command::ConfirmMoneyTransfer(ConfirmMoneyTransfer {
        id: Uuid::new_v4(),
        token: TOKEN.to_string(),
        amount,
        from: from.to_string(),
        to: to.to_string(),
        description: "test".to_string(),
    })
}

/// Writes a command file with the standard header followed by `rows`.
pub fn commands_csv(rows: &[String]) -> NamedTempFile {
    let mut csv = NamedTempFile::new().unwrap();
    writeln!(csv, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(csv, "{}", row).unwrap();
    }
    csv.flush().unwrap();
    csv
}

pub fn create_row(iban: &str, a_type: &str) -> String {
    format!("cac,{},{},{},{},,,,", Uuid::new_v4(), a_type, iban, TOKEN)
}

pub fn transfer_row(id: Uuid, from: &str, to: &str, amount: i64) -> String {
    format!("cmt,{},,,{},{},{},{},test", id, TOKEN, amount, from, to)
}

/// Parses the JSON lines written to stdout.
pub fn events(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

pub fn count(events: &[serde_json::Value], channel: &str) -> usize {
    events.iter().filter(|e| e["channel"] == channel).count()
}
