//! Lease-guarded promotion loop, one per registered pool.
//!
//! The loop driver (`Pumper`) owns the lease and the repeat/sleep policy;
//! the pump operation itself (`PoolPump`) is a named, separately testable
//! cycle over persistence and the fast engine. A full batch means more work
//! is likely waiting, so the loop repeats immediately instead of pacing at
//! the fixed interval; everything else sleeps one interval.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

use crate::engine::{Engine, EngineJob};
use crate::job::{now_epoch_secs, JobQuery};
use crate::lock::DistributedLock;
use crate::metrics::Metrics;
use crate::persistence::Persistence;

/// Result of one pump cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The cycle promoted a full batch; a backlog probably remains.
    FullBatch,
    /// The cycle promoted a partial or empty batch; the pool is caught up.
    Drained,
    /// The cycle aborted on a read, publish, or delete error.
    Failed,
}

impl PumpOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpOutcome::FullBatch => "full_batch",
            PumpOutcome::Drained => "drained",
            PumpOutcome::Failed => "failed",
        }
    }
}

/// What the loop does after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStep {
    Immediate,
    Sleep,
}

/// The repeat/sleep decision is a pure function of the cycle outcome: only
/// a full batch earns an immediate re-poll. Failures wait out the interval
/// so a broken engine or store is not hammered in a tight loop.
pub fn next_step(outcome: PumpOutcome) -> LoopStep {
    match outcome {
        PumpOutcome::FullBatch => LoopStep::Immediate,
        PumpOutcome::Drained | PumpOutcome::Failed => LoopStep::Sleep,
    }
}

/// One pump operation, invoked by the loop driver only while the pool's
/// lease is held.
#[async_trait]
pub trait PumpCycle: Send + Sync {
    async fn pump(&self) -> PumpOutcome;
}

/// The production pump cycle for one pool: query ready jobs, publish each
/// to the fast engine, delete the promoted batch from durable storage.
pub struct PoolPump {
    pool: String,
    engine: Arc<dyn Engine>,
    store: Arc<dyn Persistence>,
    threshold_secs: i64,
    batch_size: usize,
    publish_timeout: Duration,
    metrics: Option<Metrics>,
}

impl PoolPump {
    pub fn new(
        pool: impl Into<String>,
        engine: Arc<dyn Engine>,
        store: Arc<dyn Persistence>,
        threshold_secs: i64,
        batch_size: usize,
        publish_timeout: Duration,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            pool: pool.into(),
            engine,
            store,
            threshold_secs,
            batch_size,
            publish_timeout,
            metrics,
        }
    }

    /// Run one cycle against an explicit clock reading.
    ///
    /// Failure ordering matters here: a publish error aborts the rest of the
    /// batch and skips the delete entirely, leaving every record durable.
    /// Records published before the error get re-published next cycle; that
    /// duplication is the accepted at-least-once cost.
    pub async fn pump_at(&self, now: i64) -> PumpOutcome {
        let query = JobQuery::pool_wide(
            self.pool.clone(),
            now + self.threshold_secs,
            self.batch_size,
        );
        let jobs = match self.store.get_ready_jobs(&query).await {
            Ok(jobs) => jobs,
            Err(err) => {
                error!(pool = %self.pool, error = %err, "ready jobs query failed");
                return PumpOutcome::Failed;
            }
        };
        if jobs.is_empty() {
            return PumpOutcome::Drained;
        }

        let mut promoted = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let engine_job = EngineJob::from_record(job, now);
            match tokio::time::timeout(self.publish_timeout, self.engine.publish(engine_job)).await
            {
                Ok(Ok(_handle)) => promoted.push(job.job_id.clone()),
                Ok(Err(err)) => {
                    error!(pool = %self.pool, job_id = %job.job_id, error = %err,
                        "publish failed; aborting batch");
                    return PumpOutcome::Failed;
                }
                Err(_) => {
                    error!(pool = %self.pool, job_id = %job.job_id,
                        "publish timed out; aborting batch");
                    return PumpOutcome::Failed;
                }
            }
        }

        if let Err(err) = self.store.del_jobs(&promoted).await {
            // The engine already holds these jobs; they will be re-promoted
            // next cycle and the idempotent delete makes that retry safe.
            error!(pool = %self.pool, error = %err, "promoted batch delete failed");
            return PumpOutcome::Failed;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_promoted(&self.pool, promoted.len() as u64);
        }
        debug!(pool = %self.pool, promoted = promoted.len(), "pump cycle complete");

        if promoted.len() == self.batch_size {
            PumpOutcome::FullBatch
        } else {
            PumpOutcome::Drained
        }
    }
}

#[async_trait]
impl PumpCycle for PoolPump {
    async fn pump(&self) -> PumpOutcome {
        let started = Instant::now();
        let outcome = self.pump_at(now_epoch_secs()).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(&self.pool, outcome.as_str(), started.elapsed());
        }
        outcome
    }
}

/// Loop driver for one pool's promotion.
///
/// Every iteration attempts to acquire or renew the pool's lease. A denied
/// lease means a peer process is pumping this pool: the cycle is skipped
/// outright, with zero storage reads. On shutdown the driver releases the
/// lease before returning so a peer can take over without waiting out the
/// full expiry.
pub struct Pumper {
    lock: Arc<dyn DistributedLock>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
    metrics: Option<Metrics>,
}

impl Pumper {
    pub fn new(
        lock: Arc<dyn DistributedLock>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            lock,
            interval,
            shutdown,
            metrics,
        }
    }

    pub async fn run<C: PumpCycle>(mut self, cycle: C) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let held = match self.lock.acquire().await {
                Ok(held) => held,
                Err(err) => {
                    // Treated like a denied lease: skip the cycle, retry
                    // after one interval.
                    warn!(resource = %self.lock.resource(), error = %err, "lease acquire failed");
                    false
                }
            };
            if let Some(metrics) = &self.metrics {
                metrics.set_lease_held(self.lock.resource(), held);
            }

            if held {
                let outcome = cycle.pump().await;
                if next_step(outcome) == LoopStep::Immediate {
                    continue;
                }
            } else {
                debug!(resource = %self.lock.resource(), "lease held elsewhere; skipping cycle");
            }

            tokio::select! {
                _ = sleep(self.interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone without a shutdown signal; stop
                        // pumping rather than spin on a closed channel.
                        break;
                    }
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_lease_held(self.lock.resource(), false);
        }
        if let Err(err) = self.lock.release().await {
            warn!(resource = %self.lock.resource(), error = %err,
                "lease release failed; it will expire on its own");
        }
    }
}
