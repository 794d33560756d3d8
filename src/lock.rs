//! Lease-based mutual exclusion for pump loops.
//!
//! Each pool name is a lock resource. Across every process sharing the same
//! coordination backend, at most one holder has a live lease on a resource
//! at any instant. Leases expire on their own when the holder stops
//! renewing, so a crashed pumper's pool becomes pumpable again within the
//! lease expiry with no external intervention.
//!
//! Available backends:
//!
//! - `local`: in-process lock table (single-node mode, for local development
//!   and tests)
//! - `etcd`: distributed locks using etcd leases

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::settings::{CoordinationBackend, CoordinationConfig};

pub mod etcd;
pub mod local;

pub use etcd::EtcdLockBackend;
pub use local::LocalLockBackend;

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A lease on one named resource, with the expiry fixed at construction.
///
/// `acquire` is non-blocking: `Ok(false)` means another live holder exists,
/// which is an expected steady-state signal, not an error. Acquiring while
/// already holding renews the lease. `release` is best-effort and
/// idempotent; releasing a lease you do not hold is a no-op.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    fn resource(&self) -> &str;
    async fn acquire(&self) -> Result<bool, LockError>;
    async fn release(&self) -> Result<(), LockError>;
}

/// Factory for per-resource locks sharing one coordination backend.
pub trait LockBackend: Send + Sync {
    fn lock(&self, resource: &str, expiry: Duration) -> Arc<dyn DistributedLock>;
}

/// Connect the configured lock backend, verifying reachability up front.
pub async fn connect_lock_backend(
    cfg: &CoordinationConfig,
) -> Result<Arc<dyn LockBackend>, LockError> {
    match cfg.backend {
        CoordinationBackend::Local => Ok(Arc::new(LocalLockBackend::new())),
        CoordinationBackend::Etcd => Ok(Arc::new(
            EtcdLockBackend::connect(&cfg.etcd_endpoints, &cfg.cluster_prefix).await?,
        )),
    }
}

/// Helpers to build key paths used for coordination (shared naming convention).
pub mod keys {
    pub fn lock_key(cluster_prefix: &str, resource: &str) -> String {
        format!("{}/locks/{}", cluster_prefix, resource)
    }
}
