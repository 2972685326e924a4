use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigError;
use crate::sink::{ChannelSpec, BANK_CHANNEL};
use crate::status::Status;

/// How the statuses of one payment's workflow are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmissionMode {
    /// One concurrent emission unit per status. The sink may observe the
    /// statuses of one payment out of lifecycle order; this deliberately
    /// simulates out-of-order delivery and is the default.
    #[default]
    Concurrent,
    /// Emit the workflow in lifecycle order, one status at a time.
    Sequential,
}

/// What a run does when a status emission fails at the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the run. The pipeline still drains fully first; failures are
    /// reported once every in-flight payment has completed.
    #[default]
    Abort,
    /// Complete the run and report the failure count in the summary.
    Continue,
}

/// All recognized engine options, constructed once and injected; there is no
/// ambient global configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Total number of payments to generate.
    pub payments: usize,
    /// Number of concurrent payment workers.
    pub workers: usize,
    /// Size of the source bank pool.
    pub sources: usize,
    /// Size of the destination bank pool.
    pub destinations: usize,
    /// Payment amounts are drawn uniformly from `[amount_min, amount_max)`.
    pub amount_min: f64,
    pub amount_max: f64,
    /// Simulated processing delay per status, keyed by lowercase status
    /// name. Statuses without an entry get zero delay.
    pub delays_ms: HashMap<String, u64>,
    /// Workflow weight table: comma-separated status sequences with integer
    /// relative weights.
    pub workflows: Vec<(String, u32)>,
    /// Tick interval of the bank mutator.
    pub bank_update_interval: Duration,
    /// Partition count per channel, keyed by channel name.
    pub channel_partitions: HashMap<String, i32>,
    /// Replication factor used for every provisioned channel.
    pub replication: i16,
    pub emission: EmissionMode,
    pub failure_policy: FailurePolicy,
    /// Maximum time to wait for the pipeline to drain. `None` waits
    /// indefinitely.
    pub drain_timeout: Option<Duration>,
    /// Seed for reproducible runs. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let delays_ms = [
            ("initiated", 100),
            ("validated", 1000),
            ("accounted", 1000),
            ("completed", 3000),
            ("failed", 1000),
            ("canceled", 2000),
            ("rejected", 2000),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let workflows = [
            ("Initiated,Failed", 1),
            ("Initiated,Rejected", 2),
            ("Initiated,Validated,Failed", 1),
            ("Initiated,Validated,Rejected", 1),
            ("Initiated,Validated,Accounted,Failed", 1),
            ("Initiated,Validated,Accounted,Completed", 9),
            ("Initiated,Validated,Accounted,Canceled", 2),
            ("Initiated,Validated,Accounted,Rejected", 1),
        ]
        .into_iter()
        .map(|(spec, weight)| (spec.to_string(), weight))
        .collect();

        let channel_partitions = [
            ("payment-initiated", 12),
            ("payment-validated", 12),
            ("payment-accounted", 12),
            ("payment-completed", 12),
            ("payment-failed", 4),
            ("payment-canceled", 4),
            ("payment-rejected", 4),
            (BANK_CHANNEL, 3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            payments: 100_000,
            workers: 100,
            sources: 10,
            destinations: 10,
            amount_min: 0.1,
            amount_max: 9999.0,
            delays_ms,
            workflows,
            bank_update_interval: Duration::from_millis(5000),
            channel_partitions,
            replication: 3,
            emission: EmissionMode::default(),
            failure_policy: FailurePolicy::default(),
            drain_timeout: None,
            seed: None,
        }
    }
}

impl Config {
    /// Cheap pre-flight checks. Workflow specifications are fully validated
    /// when the selector is constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.sources == 0 {
            return Err(ConfigError::EmptyPool("source"));
        }
        if self.destinations == 0 {
            return Err(ConfigError::EmptyPool("destination"));
        }
        if !(self.amount_min < self.amount_max) {
            return Err(ConfigError::InvalidAmountRange {
                min: self.amount_min,
                max: self.amount_max,
            });
        }
        if self.workflows.is_empty() {
            return Err(ConfigError::NoWorkflows);
        }
        Ok(())
    }

    /// Simulated processing delay for a status. Statuses without a
    /// configured entry default to zero.
    pub fn delay_for(&self, status: Status) -> Duration {
        Duration::from_millis(
            self.delays_ms
                .get(status.delay_key())
                .copied()
                .unwrap_or(0),
        )
    }

    /// The channels the engine publishes to, with their provisioning
    /// parameters. One per status plus the bank channel; channels without a
    /// configured partition count default to 1. Sorted by name so
    /// provisioning order is deterministic.
    pub fn channels(&self) -> Vec<ChannelSpec> {
        let mut channels: Vec<ChannelSpec> = Status::ALL
            .iter()
            .map(|status| status.channel())
            .chain(std::iter::once(BANK_CHANNEL.to_string()))
            .map(|name| ChannelSpec {
                partitions: self.channel_partitions.get(&name).copied().unwrap_or(1),
                replication: self.replication,
                name,
            })
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }
}
