//! Process-wide registry and composition root.
//!
//! One `Manager` per process, constructed explicitly and passed by reference
//! to whatever front end submits jobs. It owns the durable store handle, the
//! lock backend, and one running pumper per registered pool. Per-cycle pump
//! errors stay inside the pumpers; callers of `add_job`/`get_job_by_id` only
//! ever see errors from their own storage call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::job::JobRecord;
use crate::lock::{connect_lock_backend, LockBackend, LockError};
use crate::metrics::Metrics;
use crate::persistence::{Persistence, PersistenceError, SlatePersistence};
use crate::pumper::{PoolPump, Pumper};
use crate::settings::{AppConfig, PumpConfig};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("pool already registered: {0}")]
    DuplicatePool(String),
    #[error(transparent)]
    Storage(#[from] PersistenceError),
    #[error(transparent)]
    Coordination(#[from] LockError),
}

struct PoolEntry {
    engine: Arc<dyn Engine>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Manager {
    store: Arc<dyn Persistence>,
    locks: Arc<dyn LockBackend>,
    pump: PumpConfig,
    metrics: Option<Metrics>,
    pools: Mutex<HashMap<String, PoolEntry>>,
}

impl Manager {
    /// Open the durable store and connect the lock backend. Either being
    /// unreachable fails construction; no partial manager is returned.
    pub async fn new(cfg: &AppConfig) -> Result<Self, ManagerError> {
        let store = SlatePersistence::open(&cfg.storage).await?;
        let locks = connect_lock_backend(&cfg.coordination).await?;
        Ok(Self::from_parts(Arc::new(store), locks, cfg.pump.clone()))
    }

    /// Assemble a manager from pre-built components.
    pub fn from_parts(
        store: Arc<dyn Persistence>,
        locks: Arc<dyn LockBackend>,
        pump: PumpConfig,
    ) -> Self {
        Self {
            store,
            locks,
            pump,
            metrics: None,
            pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a pool and start its promotion loop.
    ///
    /// `threshold_secs` is the pool's lookahead window: how far before true
    /// ready time a job becomes eligible for promotion. Larger thresholds
    /// cut durable-store polling pressure but park more not-yet-due jobs in
    /// the engine. Registering an already-registered name is rejected and
    /// starts nothing.
    pub fn add_pool(
        &self,
        name: &str,
        engine: Arc<dyn Engine>,
        threshold_secs: i64,
    ) -> Result<(), ManagerError> {
        let mut pools = self.pools.lock().unwrap();
        if pools.contains_key(name) {
            return Err(ManagerError::DuplicatePool(name.to_string()));
        }

        let lock = self.locks.lock(name, self.pump.lease_expiry());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pumper = Pumper::new(
            lock,
            self.pump.pump_interval(),
            shutdown_rx,
            self.metrics.clone(),
        );
        let cycle = PoolPump::new(
            name,
            Arc::clone(&engine),
            Arc::clone(&self.store),
            threshold_secs,
            self.pump.max_batch_size,
            self.pump.publish_timeout(),
            self.metrics.clone(),
        );
        let task = tokio::spawn(pumper.run(cycle));

        pools.insert(
            name.to_string(),
            PoolEntry {
                engine,
                shutdown_tx,
                task,
            },
        );
        info!(pool = name, threshold_secs, "pool registered");
        Ok(())
    }

    /// Write one job durably. Never touches the fast engine; promotion
    /// happens later, in the background.
    pub async fn add_job(&self, job: JobRecord) -> Result<(), PersistenceError> {
        let pool = job.pool.clone();
        self.store.add_jobs(std::slice::from_ref(&job)).await?;
        if let Some(metrics) = &self.metrics {
            metrics.record_added(&pool);
        }
        Ok(())
    }

    /// Look up a durable record by id. `Ok(None)` covers not-yet-submitted,
    /// unknown, and already-promoted ids alike; durable storage cannot tell
    /// them apart.
    pub async fn get_job_by_id(&self, id: &str) -> Result<Option<JobRecord>, PersistenceError> {
        let jobs = self.store.get_jobs_by_id(&[id.to_string()]).await?;
        Ok(jobs.into_iter().next())
    }

    /// The engine handle registered for a pool, if any.
    pub fn engine(&self, pool: &str) -> Option<Arc<dyn Engine>> {
        let pools = self.pools.lock().unwrap();
        pools.get(pool).map(|entry| Arc::clone(&entry.engine))
    }

    /// Stop every pumper and wait for each to release its lease, bounded by
    /// the shutdown grace. A pumper that misses the grace window is left
    /// detached; its lease expires on its own and a peer takes over then.
    pub async fn shutdown(&self) {
        let entries: Vec<(String, PoolEntry)> = {
            let mut pools = self.pools.lock().unwrap();
            pools.drain().collect()
        };
        for (_, entry) in &entries {
            let _ = entry.shutdown_tx.send(true);
        }

        let grace = self.pump.shutdown_grace();
        for (name, entry) in entries {
            match tokio::time::timeout(grace, entry.task).await {
                Ok(_) => debug!(pool = %name, "pumper stopped"),
                Err(_) => {
                    warn!(pool = %name, "pumper did not stop within grace; lease will expire on its own")
                }
            }
        }
    }
}
