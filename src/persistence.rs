//! Durable storage for not-yet-promoted jobs.
//!
//! The pump loop consumes this contract; the lease, not the store, prevents
//! two processes from promoting the same records concurrently. Deletes must
//! be idempotent because a retried cycle can attempt ids that a prior cycle
//! already removed.

mod slate;

pub use slate::SlatePersistence;

use async_trait::async_trait;
use thiserror::Error;

use crate::codec::CodecError;
use crate::job::{JobQuery, JobRecord};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Slate(#[from] slatedb::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[async_trait]
pub trait Persistence: Send + Sync {
    /// Bulk insert. The pump core only ever passes a single record and
    /// treats any failure as the whole call failing.
    async fn add_jobs(&self, jobs: &[JobRecord]) -> Result<usize, PersistenceError>;

    /// Up to `query.count` records with `ready_time <= query.ready_time`,
    /// ordered by ready_time ascending then job_id ascending.
    async fn get_ready_jobs(&self, query: &JobQuery) -> Result<Vec<JobRecord>, PersistenceError>;

    /// Idempotent bulk delete; unknown ids are skipped, not errors.
    /// Returns the number of records actually removed.
    async fn del_jobs(&self, job_ids: &[String]) -> Result<usize, PersistenceError>;

    /// Point lookups by id; missing ids are simply absent from the result.
    async fn get_jobs_by_id(&self, job_ids: &[String]) -> Result<Vec<JobRecord>, PersistenceError>;
}
