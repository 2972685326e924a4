use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::bank::{BankMutator, BankPool};
use crate::config::{Config, EmissionMode, FailurePolicy};
use crate::error::{ConfigError, RunError, SinkError};
use crate::payment::{Payment, PaymentFactory};
use crate::sink::{ChannelProvisioner, Event, EventSink};
use crate::stats::{Stats, StatsSnapshot};
use crate::status::Status;
use crate::workflow::WorkflowSelector;

/// Result of a completed generation run.
#[derive(Debug)]
pub struct RunSummary {
    /// Number of payments generated and fully processed.
    pub payments: usize,
    /// Status events successfully published.
    pub events_emitted: u64,
    /// Status events that failed at the sink (only non-zero with
    /// [`FailurePolicy::Continue`]).
    pub events_failed: u64,
    /// Bank mutations published while the run was in flight.
    pub bank_updates: u64,
    pub elapsed: Duration,
    /// Final counter snapshot, taken after the pipeline drained.
    pub stats: StatsSnapshot,
}

/// Completion signal sent by a worker for one fully-processed payment.
struct PaymentOutcome {
    emitted: u64,
    failed: u64,
    first_error: Option<SinkError>,
}

/// Everything a worker needs, shared across the pool.
struct WorkerContext {
    config: Config,
    selector: Arc<WorkflowSelector>,
    stats: Arc<Stats>,
    sink: Arc<dyn EventSink>,
}

/// The top-level control loop.
///
/// Generates the configured number of payments up front, distributes them
/// across a bounded pool of workers, runs each payment's workflow through
/// the event sink, and aggregates production statistics. Construction
/// validates the whole configuration; nothing is generated until
/// [`run`](Orchestrator::run).
pub struct Orchestrator {
    config: Config,
    selector: Arc<WorkflowSelector>,
    factory: PaymentFactory,
    pool: BankPool,
    stats: Arc<Stats>,
    sink: Arc<dyn EventSink>,
    provisioner: Arc<dyn ChannelProvisioner>,
}

impl Orchestrator {
    /// Builds the engine from a configuration and its injected
    /// collaborators. Any configuration problem surfaces here, before any
    /// generation starts.
    pub fn new(
        config: Config,
        stats: Arc<Stats>,
        sink: Arc<dyn EventSink>,
        provisioner: Arc<dyn ChannelProvisioner>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let selector = WorkflowSelector::new(&config.workflows, config.seed)?;
        let pool = BankPool::build(
            config.sources,
            config.destinations,
            config.seed.map(|s| s.wrapping_add(1)),
        )?;
        let factory = PaymentFactory::new(
            pool.source_ids(),
            pool.destination_ids(),
            config.amount_min,
            config.amount_max,
            config.seed.map(|s| s.wrapping_add(2)),
        )?;

        Ok(Self {
            config,
            selector: Arc::new(selector),
            factory,
            pool,
            stats,
            sink,
            provisioner,
        })
    }

    /// Runs the full generation: provision channels, start the bank
    /// mutator, queue every payment, drain the worker pool, stop the
    /// mutator, flush the sink and return the summary.
    pub async fn run(self) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        let Self {
            config,
            selector,
            factory,
            pool,
            stats,
            sink,
            provisioner,
        } = self;

        for spec in config.channels() {
            provisioner.ensure_channel(&spec).await?;
        }

        // The mutator owns the bank pool for the rest of the run; the
        // factory took its identifier copies at construction.
        let mutator = BankMutator::new(
            pool,
            config.bank_update_interval,
            Arc::clone(&sink),
            Arc::clone(&stats),
            config.seed.map(|s| s.wrapping_add(3)),
        )
        .spawn();

        // Generate every payment up front. The queue is sized to the total
        // count, so enqueueing never blocks.
        let (payment_tx, payment_rx) = mpsc::channel(config.payments.max(1));
        for _ in 0..config.payments {
            let payment = factory.generate();
            debug!(payment = %payment.id, "generated payment");
            payment_tx
                .send(payment)
                .await
                .expect("queue capacity should cover every pre-generated payment");
        }
        drop(payment_tx);

        info!(
            payments = config.payments,
            workers = config.workers,
            "dispatching payments"
        );

        let (done_tx, mut done_rx) = mpsc::channel(config.payments.max(1));
        let payment_rx = Arc::new(Mutex::new(payment_rx));
        let ctx = Arc::new(WorkerContext {
            config: config.clone(),
            selector,
            stats: Arc::clone(&stats),
            sink: Arc::clone(&sink),
        });

        let workers: Vec<_> = (0..config.workers)
            .map(|worker_id| {
                tokio::spawn(Self::worker_loop(
                    worker_id,
                    Arc::clone(&ctx),
                    Arc::clone(&payment_rx),
                    done_tx.clone(),
                ))
            })
            .collect();
        drop(done_tx);

        // Wait for a completion signal per generated payment.
        let drain = async {
            let mut emitted = 0u64;
            let mut failed = 0u64;
            let mut first_error = None;
            for _ in 0..config.payments {
                let outcome = done_rx
                    .recv()
                    .await
                    .expect("workers should signal completion for every payment");
                emitted += outcome.emitted;
                failed += outcome.failed;
                if first_error.is_none() {
                    first_error = outcome.first_error;
                }
            }
            (emitted, failed, first_error)
        };

        let (emitted, failed, first_error) = match config.drain_timeout {
            Some(timeout) => match time::timeout(timeout, drain).await {
                Ok(counts) => counts,
                Err(_) => {
                    for worker in &workers {
                        worker.abort();
                    }
                    let _ = mutator.stop().await;
                    return Err(RunError::DrainTimeout(timeout));
                }
            },
            None => drain.await,
        };

        for worker in workers {
            worker.await.expect("worker task should not panic");
        }

        let bank_updates = match mutator.stop().await {
            Ok(updates) => updates,
            Err(e) => match config.failure_policy {
                FailurePolicy::Abort => return Err(e.into()),
                FailurePolicy::Continue => {
                    warn!(error = %e, "bank mutator stopped on a sink failure");
                    stats.snapshot().bank_total()
                }
            },
        };

        sink.flush().await?;

        if failed > 0 {
            match config.failure_policy {
                FailurePolicy::Abort => {
                    return Err(RunError::EmissionsFailed {
                        failed,
                        first: first_error
                            .expect("a failed emission should carry its error"),
                    });
                }
                FailurePolicy::Continue => {
                    warn!(failed, "run completed with failed status emissions");
                }
            }
        }

        info!(
            payments = config.payments,
            emitted,
            elapsed = ?started.elapsed(),
            "run complete"
        );

        Ok(RunSummary {
            payments: config.payments,
            events_emitted: emitted,
            events_failed: failed,
            bank_updates,
            elapsed: started.elapsed(),
            stats: stats.snapshot(),
        })
    }

    async fn worker_loop(
        worker_id: usize,
        ctx: Arc<WorkerContext>,
        payment_rx: Arc<Mutex<mpsc::Receiver<Payment>>>,
        done_tx: mpsc::Sender<PaymentOutcome>,
    ) {
        loop {
            let payment = {
                let mut rx = payment_rx.lock().await;
                rx.recv().await
            };
            let Some(payment) = payment else {
                break;
            };

            let outcome = Self::process_payment(worker_id, &ctx, payment).await;

            if done_tx.send(outcome).await.is_err() {
                // The orchestrator stopped waiting (drain timeout).
                break;
            }
        }

        debug!(worker = worker_id, "worker finished");
    }

    /// Processes one payment: pick a workflow, emit every status, wait on
    /// the fan-in barrier, then account for the workflow.
    ///
    /// In [`EmissionMode::Concurrent`] each status is one concurrent unit
    /// of work, so the sink may observe the statuses of this payment out of
    /// lifecycle order. The barrier guarantees only that all of them have
    /// completed before the worker takes its next payment.
    async fn process_payment(
        worker_id: usize,
        ctx: &Arc<WorkerContext>,
        payment: Payment,
    ) -> PaymentOutcome {
        let workflow = ctx.selector.pick();
        let len = workflow.len();

        debug!(
            worker = worker_id,
            payment = %payment.id,
            workflow = %workflow,
            "processing payment"
        );

        let (status_tx, mut status_rx) = mpsc::channel(len.max(1));

        match ctx.config.emission {
            EmissionMode::Concurrent => {
                for &status in workflow.statuses() {
                    let ctx = Arc::clone(ctx);
                    let payment = payment.clone();
                    let status_tx = status_tx.clone();

                    tokio::spawn(async move {
                        let result = Self::emit_status(&ctx, payment, status).await;
                        // Sized to the workflow length, so this never blocks.
                        let _ = status_tx.send(result).await;
                    });
                }
            }
            EmissionMode::Sequential => {
                for &status in workflow.statuses() {
                    let result = Self::emit_status(ctx, payment.clone(), status).await;
                    let _ = status_tx.send(result).await;
                }
            }
        }
        drop(status_tx);

        // Fan-in barrier: exactly one completion per status of this
        // workflow before the next payment is accepted.
        let mut emitted = 0u64;
        let mut failed = 0u64;
        let mut first_error = None;
        for _ in 0..len {
            let result = status_rx
                .recv()
                .await
                .expect("every emission unit should report completion");
            match result {
                Ok(status) => {
                    emitted += 1;
                    ctx.stats.inc_status(status.name());
                }
                Err(e) => {
                    warn!(worker = worker_id, error = %e, "status emission failed");
                    failed += 1;
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        ctx.stats.inc_workflow(&workflow.signature());

        PaymentOutcome {
            emitted,
            failed,
            first_error,
        }
    }

    /// One emission unit: stamp the status, sleep its configured delay,
    /// refresh the timestamps and publish the updated payment copy.
    async fn emit_status(
        ctx: &WorkerContext,
        mut payment: Payment,
        status: Status,
    ) -> Result<Status, SinkError> {
        payment.status = status;

        let delay = ctx.config.delay_for(status);
        if !delay.is_zero() {
            time::sleep(delay).await;
        }

        payment.touch();
        ctx.sink.publish(Event::PaymentStatus(payment)).await?;

        Ok(status)
    }
}
