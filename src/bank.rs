use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use fake::faker::address::en::CountryCode;
use fake::faker::company::en::CompanyName;
use fake::faker::currency::en::CurrencyCode;
use fake::faker::finance::en::Bic;
use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};

use crate::error::{ConfigError, SinkError};
use crate::sink::{Event, EventSink};
use crate::stats::Stats;

/// A synthetic reference entity used as a payment source or destination.
///
/// Created once at startup; afterwards only the bank mutator writes to it,
/// bumping `version` and `updated_ts` on each mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub id: String,
    pub name: String,
    pub country: String,
    pub currency: String,
    pub email: String,
    pub website: String,
    pub routing_number: String,
    pub bic: String,
    pub branch_code: String,
    pub created_ts: String,
    pub updated_ts: String,
    pub version: u64,
}

/// The fixed set of banks, split into source and destination sub-pools.
///
/// Exclusive writership is expressed through ownership: the pool is moved
/// into the [`BankMutator`], and everything else only ever holds identifier
/// copies taken beforehand, so no per-entity locking is needed.
#[derive(Debug)]
pub struct BankPool {
    banks: Vec<Bank>,
    source_count: usize,
}

impl BankPool {
    /// Builds `sources + destinations` banks with randomized attributes,
    /// version 0 and both timestamps set to now. Identifiers follow the
    /// stable `bank-<index>` scheme so they are recognizable across a run.
    pub fn build(
        sources: usize,
        destinations: usize,
        seed: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if sources == 0 {
            return Err(ConfigError::EmptyPool("source"));
        }
        if destinations == 0 {
            return Err(ConfigError::EmptyPool("destination"));
        }

        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let banks = (0..sources + destinations)
            .map(|i| {
                let name: String = CompanyName().fake_with_rng(&mut rng);
                let slug: String = name
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase();

                Bank {
                    id: format!("bank-{i}"),
                    website: format!("https://www.{slug}.example.com"),
                    name,
                    country: CountryCode().fake_with_rng(&mut rng),
                    currency: CurrencyCode().fake_with_rng(&mut rng),
                    email: SafeEmail().fake_with_rng(&mut rng),
                    routing_number: format!("{:09}", rng.random_range(0..1_000_000_000u32)),
                    bic: Bic().fake_with_rng(&mut rng),
                    branch_code: format!("BR-{:03}", rng.random_range(0..1000)),
                    created_ts: now.clone(),
                    updated_ts: now.clone(),
                    version: 0,
                }
            })
            .collect();

        Ok(Self {
            banks,
            source_count: sources,
        })
    }

    /// Identifier copies of the source sub-pool.
    pub fn source_ids(&self) -> Vec<String> {
        self.banks[..self.source_count]
            .iter()
            .map(|b| b.id.clone())
            .collect()
    }

    /// Identifier copies of the destination sub-pool.
    pub fn destination_ids(&self) -> Vec<String> {
        self.banks[self.source_count..]
            .iter()
            .map(|b| b.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}

/// Periodically mutates one randomly chosen bank and emits the change.
///
/// The single mutator task is the only writer of the pool for the lifetime
/// of the process.
pub struct BankMutator {
    pool: BankPool,
    interval: Duration,
    sink: Arc<dyn EventSink>,
    stats: Arc<Stats>,
    rng: StdRng,
}

/// Handle for stopping the mutator task and collecting its result.
pub struct MutatorHandle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<u64, SinkError>>,
}

impl BankMutator {
    pub fn new(
        pool: BankPool,
        interval: Duration,
        sink: Arc<dyn EventSink>,
        stats: Arc<Stats>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };

        Self {
            pool,
            interval,
            sink,
            stats,
            rng,
        }
    }

    /// Spawns the tick loop. The first mutation happens one full interval
    /// after spawning; the loop runs until the handle signals stop, which is
    /// observed within one tick.
    pub fn spawn(self) -> MutatorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(stop_rx));

        MutatorHandle { stop_tx, handle }
    }

    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) -> Result<u64, SinkError> {
        info!(banks = self.pool.len(), interval = ?self.interval, "bank pool mutator started");

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        let mut updates = 0u64;

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.mutate_one().await {
                        error!(error = %e, "bank update failed");
                        return Err(e);
                    }
                    updates += 1;
                }
            }
        }

        info!(updates, "bank pool mutator stopped");
        Ok(updates)
    }

    /// Picks one bank uniformly from the combined pool, bumps its version
    /// and updated timestamp, stores it back, then publishes the change and
    /// bumps the aggregator's bank counter.
    async fn mutate_one(&mut self) -> Result<(), SinkError> {
        let index = self.rng.random_range(0..self.pool.banks.len());

        let bank = {
            let bank = &mut self.pool.banks[index];
            bank.version += 1;
            bank.updated_ts = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            bank.clone()
        };

        debug!(bank = %bank.id, version = bank.version, "bank updated");

        self.sink.publish(Event::BankUpdate(bank.clone())).await?;
        self.stats.inc_bank(&bank.name);

        Ok(())
    }
}

impl MutatorHandle {
    /// Signals the mutator to stop and waits for it, returning the number
    /// of completed mutations, or the sink error that stopped the loop
    /// early.
    pub async fn stop(self) -> Result<u64, SinkError> {
        // Ignore send errors - if the receiver has gone away, the mutator
        // has already stopped.
        let _ = self.stop_tx.send(true);

        self.handle
            .await
            .expect("bank mutator task should not panic")
    }
}
