//! In-process lock backend for single-node mode.
//!
//! Locks created from one backend share a table of resource holders, giving
//! the same acquire/renew/expire semantics as the distributed backends
//! without any external coordination. Useful for local development and
//! tests; exclusivity only covers lock handles sharing the backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::{DistributedLock, LockBackend, LockError};

struct Holder {
    token: String,
    deadline: Instant,
}

#[derive(Default)]
pub struct LocalLockBackend {
    table: Arc<Mutex<HashMap<String, Holder>>>,
}

impl LocalLockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockBackend for LocalLockBackend {
    fn lock(&self, resource: &str, expiry: Duration) -> Arc<dyn DistributedLock> {
        Arc::new(LocalLock {
            table: Arc::clone(&self.table),
            resource: resource.to_string(),
            token: Uuid::new_v4().to_string(),
            expiry,
        })
    }
}

pub struct LocalLock {
    table: Arc<Mutex<HashMap<String, Holder>>>,
    resource: String,
    token: String,
    expiry: Duration,
}

#[async_trait]
impl DistributedLock for LocalLock {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn acquire(&self) -> Result<bool, LockError> {
        let mut table = self.table.lock().unwrap();
        let now = Instant::now();
        if let Some(holder) = table.get_mut(&self.resource) {
            if holder.token == self.token {
                // Renewal.
                holder.deadline = now + self.expiry;
                return Ok(true);
            }
            if holder.deadline > now {
                return Ok(false);
            }
        }
        // Absent or expired holder.
        table.insert(
            self.resource.clone(),
            Holder {
                token: self.token.clone(),
                deadline: now + self.expiry,
            },
        );
        Ok(true)
    }

    async fn release(&self) -> Result<(), LockError> {
        let mut table = self.table.lock().unwrap();
        if table
            .get(&self.resource)
            .map_or(false, |holder| holder.token == self.token)
        {
            table.remove(&self.resource);
        }
        Ok(())
    }
}
