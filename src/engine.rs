//! Contract of the fast queue engine that receives promoted jobs.
//!
//! The engine performs the final precise delay and consumer dispatch; its
//! internals live elsewhere. This crate only publishes to it, carrying the
//! original job id through so the durable tier and the engine share identity.

use async_trait::async_trait;
use thiserror::Error;

use crate::job::JobRecord;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// A job as handed to the fast engine. `delay_secs` is the remaining delay
/// relative to promotion time (`ready_time - now`) and may be <= 0 for jobs
/// that are already due; the engine dispatches those immediately.
#[derive(Debug, Clone)]
pub struct EngineJob {
    pub namespace: String,
    pub queue: String,
    pub body: Vec<u8>,
    pub expired_time: i64,
    pub delay_secs: i64,
    pub tries: u16,
    pub job_id: String,
}

impl EngineJob {
    /// Build an engine job from a durable record at promotion time `now`.
    pub fn from_record(record: &JobRecord, now: i64) -> Self {
        Self {
            namespace: record.namespace.clone(),
            queue: record.queue.clone(),
            body: record.body.clone(),
            expired_time: record.expired_time,
            delay_secs: record.ready_time - now,
            tries: record.tries,
            job_id: record.job_id.clone(),
        }
    }
}

/// Handle to one pool's fast engine.
///
/// `publish` returns the engine-assigned handle for the accepted job. A
/// publish may suspend on engine backpressure; callers bound it with a
/// timeout rather than retrying in a tight loop.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn publish(&self, job: EngineJob) -> Result<String, EngineError>;
}
