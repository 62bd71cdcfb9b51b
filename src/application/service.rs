use crate::config::EngineConfig;
use crate::domain::command::Command;
use crate::domain::lifecycle::CommandState;
use crate::error::{EngineError, Result};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info};

use super::router::CommandRouter;

/// Tally of what the workers did, merged across shards on shutdown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServiceReport {
    pub confirmed: usize,
    pub failed: usize,
    /// Outcomes read back instead of computed; also counted as confirmed or failed.
    pub replayed: usize,
    /// Commands that ended in an `EngineError`, e.g. exhausted retries.
    pub errors: usize,
}

impl ServiceReport {
    /// Fails when any command ended without a recorded outcome.
    pub fn ensure_complete(&self) -> Result<()> {
        if self.errors > 0 {
            return Err(EngineError::Unprocessed {
                count: self.errors,
            });
        }
        Ok(())
    }

    fn merge(&mut self, other: ServiceReport) {
        self.confirmed += other.confirmed;
        self.failed += other.failed;
        self.replayed += other.replayed;
        self.errors += other.errors;
    }
}

/// A queued command plus the earlier commands it has to wait for.
struct Job {
    command: Command,
    after: Vec<watch::Receiver<()>>,
    /// Dropped when the command is done, releasing its successors.
    done: watch::Sender<()>,
}

/// Runs the router on a fixed set of worker shards.
///
/// Commands are spread over shards by their partition key. A command that touches an
/// open account waits until every earlier command touching that account has finished,
/// so commands sharing an account run in submission order even across shards, while
/// commands on disjoint accounts proceed in parallel.
pub struct CommandService {
    router: Arc<CommandRouter>,
    config: EngineConfig,
}

impl CommandService {
    pub fn new(router: Arc<CommandRouter>, config: EngineConfig) -> Self {
        Self { router, config }
    }

    /// Spawns the workers. Must be called inside a tokio runtime.
    pub fn start(&self) -> ServiceHandle {
        let shards = self.config.workers.max(1);
        let capacity = self.config.channel_capacity.max(1);
        let mut senders = Vec::with_capacity(shards);
        let mut workers = JoinSet::new();

        for shard in 0..shards {
            let (tx, mut rx) = mpsc::channel::<Job>(capacity);
            senders.push(tx);
            let router = Arc::clone(&self.router);
            workers.spawn(async move {
                let mut report = ServiceReport::default();
                while let Some(Job {
                    command,
                    after,
                    done,
                }) = rx.recv().await
                {
                    for mut predecessor in after {
                        // Errs once the predecessor's sender is dropped.
                        let _ = predecessor.changed().await;
                    }
                    let id = command.id();
                    match router.dispatch(command).await {
                        Ok(outcome) => {
                            if outcome.replayed {
                                report.replayed += 1;
                            }
                            match outcome.state {
                                CommandState::Confirmed => report.confirmed += 1,
                                _ => report.failed += 1,
                            }
                        }
                        Err(e) => {
                            error!(%id, shard, error = %e, "command not processed");
                            report.errors += 1;
                        }
                    }
                    drop(done);
                }
                report
            });
        }

        info!(shards, capacity, "command service started");
        ServiceHandle {
            senders,
            workers,
            last_touch: Mutex::new(HashMap::new()),
        }
    }
}

/// Submission side of a running [`CommandService`].
pub struct ServiceHandle {
    senders: Vec<mpsc::Sender<Job>>,
    workers: JoinSet<ServiceReport>,
    /// Completion signal of the latest submitted command per open account.
    last_touch: Mutex<HashMap<String, watch::Receiver<()>>>,
}

impl ServiceHandle {
    fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.senders.len() as u64) as usize
    }

    /// Queues a command, waiting while its shard is full.
    ///
    /// The lock is held until the command is queued, so queue order always agrees with
    /// the order in which commands were registered as predecessors.
    pub async fn submit(&self, command: Command) -> Result<()> {
        let mut last_touch = self.last_touch.lock().await;
        let (done, finished) = watch::channel(());
        let mut after = Vec::new();
        for iban in command.accounts() {
            if let Some(previous) = last_touch.insert(iban.to_string(), finished.clone()) {
                after.push(previous);
            }
        }

        let shard = self.shard_for(&command.partition_key());
        let job = Job {
            command,
            after,
            done,
        };
        self.senders[shard]
            .send(job)
            .await
            .map_err(|_| EngineError::WorkerError(format!("shard {} has stopped", shard)))
    }

    /// Closes the queues, waits for every queued command to finish and merges the reports.
    pub async fn shutdown(self) -> Result<ServiceReport> {
        let ServiceHandle {
            senders,
            mut workers,
            ..
        } = self;
        drop(senders);

        let mut report = ServiceReport::default();
        while let Some(joined) = workers.join_next().await {
            let shard_report = joined.map_err(|e| EngineError::WorkerError(e.to_string()))?;
            report.merge(shard_report);
        }
        info!(
            confirmed = report.confirmed,
            failed = report.failed,
            replayed = report.replayed,
            errors = report.errors,
            "command service stopped"
        );
        Ok(report)
    }
}
