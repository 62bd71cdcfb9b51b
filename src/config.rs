use clap::Args;
use std::time::Duration;

/// Runtime knobs for the command service.
///
/// Every field can be set on the command line or through its environment variable.
#[derive(Debug, Clone, Args)]
pub struct EngineConfig {
    /// Retries on an lmt conflict (or iban collision) before giving up on a command.
    #[arg(long, env = "COMMAND_HANDLER_MAX_RETRIES", default_value_t = 8)]
    pub max_retries: u32,

    /// Base backoff between conflicting attempts, in milliseconds.
    #[arg(long, env = "COMMAND_HANDLER_RETRY_BACKOFF_MS", default_value_t = 2)]
    pub retry_backoff_ms: u64,

    /// Number of worker shards processing commands in parallel.
    #[arg(long, env = "COMMAND_HANDLER_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Capacity of each shard's inbound queue.
    #[arg(long, env = "COMMAND_HANDLER_CHANNEL_CAPACITY", default_value_t = 1024)]
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 8,
            retry_backoff_ms: 2,
            workers: 4,
            channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Linear backoff for the given attempt, plus up to one base unit of jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        use rand::Rng;
        let base = self.retry_backoff_ms;
        let jitter = if base > 0 {
            rand::thread_rng().gen_range(0..=base)
        } else {
            0
        };
        Duration::from_millis(base.saturating_mul(u64::from(attempt)) + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        engine: EngineConfig,
    }

    #[test]
    fn test_cli_defaults_match_default() {
        let cli = Cli::parse_from(["test"]);
        let default = EngineConfig::default();
        assert_eq!(cli.engine.max_retries, default.max_retries);
        assert_eq!(cli.engine.retry_backoff_ms, default.retry_backoff_ms);
        assert_eq!(cli.engine.workers, default.workers);
        assert_eq!(cli.engine.channel_capacity, default.channel_capacity);
    }

    #[test]
    fn test_backoff_grows() {
        let config = EngineConfig {
            retry_backoff_ms: 10,
            ..Default::default()
        };
        assert!(config.backoff(0) <= Duration::from_millis(10));
        assert!(config.backoff(3) >= Duration::from_millis(30));

        let none = EngineConfig {
            retry_backoff_ms: 0,
            ..Default::default()
        };
        assert_eq!(none.backoff(5), Duration::ZERO);
    }
}
