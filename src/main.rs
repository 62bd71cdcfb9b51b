use clap::Parser;
use command_handler::application::router::CommandRouter;
use command_handler::application::service::CommandService;
use command_handler::config::EngineConfig;
use command_handler::domain::ports::{EventSinkRef, LedgerStoreRef};
use command_handler::infrastructure::in_memory::InMemoryLedger;
use command_handler::interfaces::csv::balance_writer::BalanceWriter;
use command_handler::interfaces::csv::command_reader::CommandReader;
use command_handler::interfaces::jsonl::event_writer::JsonLinesSink;
use command_handler::telemetry::{self, LogFormat};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Write the final balances to this CSV file
    #[arg(long)]
    balances: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(flatten)]
    engine: EngineConfig,
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            use command_handler::infrastructure::rocksdb::RocksDBLedger;
            let store = RocksDBLedger::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryLedger::new()))
        }
        None => Ok(Arc::new(InMemoryLedger::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    let store = open_store(cli.db_path)?;
    let sink: EventSinkRef = Arc::new(JsonLinesSink::new(io::stdout()));
    let router = CommandRouter::with_default_handlers(store.clone(), sink, cli.engine.clone())
        .into_diagnostic()?;
    let handle = CommandService::new(Arc::new(router), cli.engine).start();

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for cmd_result in reader.commands() {
        match cmd_result {
            Ok(cmd) => handle.submit(cmd).await.into_diagnostic()?,
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let report = handle.shutdown().await.into_diagnostic()?;

    if let Some(path) = cli.balances {
        let balances = store.balances().await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        let mut writer = BalanceWriter::new(file);
        writer.write_balances(balances).into_diagnostic()?;
    }

    report.ensure_complete().into_diagnostic()
}
