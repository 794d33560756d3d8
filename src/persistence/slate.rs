//! SlateDB-backed durable job storage.
//!
//! Each record lives under two keys: `job/<id>` for point lookups and
//! `ready/<pool>/<ready_time:020>/<id>` for the promotion scan. Both hold
//! the same encoded record, so a ready-scan is a single pass and a delete
//! reconstructs the index key from the point record.

use async_trait::async_trait;
use slatedb::{Db, WriteBatch};
use std::str;
use std::sync::Arc;

use crate::codec::{decode_job, encode_job};
use crate::job::{JobQuery, JobRecord};
use crate::keys::{job_key, parse_ready_time, ready_key, ready_prefix};
use crate::persistence::{Persistence, PersistenceError};
use crate::settings::StorageConfig;
use crate::storage::resolve_object_store;

pub struct SlatePersistence {
    db: Arc<Db>,
}

impl SlatePersistence {
    /// Open the durable store. Fails fast when the backing object store is
    /// unreachable so a misconfigured process dies at startup, not at the
    /// first pump cycle.
    pub async fn open(cfg: &StorageConfig) -> Result<Self, PersistenceError> {
        let resolved = resolve_object_store(&cfg.backend, &cfg.path)?;
        let db = slatedb::DbBuilder::new(resolved.canonical_path.as_str(), resolved.store)
            .build()
            .await?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Close the underlying SlateDB instance gracefully.
    pub async fn close(&self) -> Result<(), PersistenceError> {
        self.db.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for SlatePersistence {
    async fn add_jobs(&self, jobs: &[JobRecord]) -> Result<usize, PersistenceError> {
        if jobs.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for job in jobs {
            let value = encode_job(job)?;
            batch.put(job_key(&job.job_id), &value);
            batch.put(ready_key(&job.pool, job.ready_time, &job.job_id), &value);
        }
        self.db.write(batch).await?;
        Ok(jobs.len())
    }

    async fn get_ready_jobs(&self, query: &JobQuery) -> Result<Vec<JobRecord>, PersistenceError> {
        let prefix = ready_prefix(&query.pool);
        let start: Vec<u8> = prefix.as_bytes().to_vec();
        let mut end: Vec<u8> = prefix.into_bytes();
        end.push(0xFF);

        let mut iter = self.db.scan::<Vec<u8>, _>(start..=end).await?;
        let mut out = Vec::new();
        while let Some(kv) = iter.next().await? {
            if out.len() >= query.count {
                break;
            }
            let Ok(key_str) = str::from_utf8(&kv.key) else {
                continue;
            };
            // Keys sort by time, so the first entry past the cutoff ends the scan.
            match parse_ready_time(key_str) {
                Some(ts) if ts > query.ready_time => break,
                Some(_) => {}
                None => continue,
            }
            let record = decode_job(&kv.value)?;
            if query.matches(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn del_jobs(&self, job_ids: &[String]) -> Result<usize, PersistenceError> {
        let mut batch = WriteBatch::new();
        let mut removed = 0usize;
        for id in job_ids {
            let Some(raw) = self.db.get(job_key(id)).await? else {
                // Already gone; retried cycles hit this and it is not an error.
                continue;
            };
            let record = decode_job(&raw)?;
            batch.delete(job_key(id));
            batch.delete(ready_key(&record.pool, record.ready_time, &record.job_id));
            removed += 1;
        }
        if removed > 0 {
            self.db.write(batch).await?;
        }
        Ok(removed)
    }

    async fn get_jobs_by_id(&self, job_ids: &[String]) -> Result<Vec<JobRecord>, PersistenceError> {
        let mut out = Vec::with_capacity(job_ids.len());
        for id in job_ids {
            if let Some(raw) = self.db.get(job_key(id)).await? {
                out.push(decode_job(&raw)?);
            }
        }
        Ok(out)
    }
}
