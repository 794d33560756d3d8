//! etcd-based lock backend.
//!
//! Each lock is an etcd lease at the configured expiry plus a holder-token
//! key written with compare-and-put, the standard etcd mutual-exclusion
//! recipe. Renewal is a single lease keep-alive; release deletes the key
//! only while the token still matches, then revokes the lease.

use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, ConnectOptions, PutOptions, Txn, TxnOp};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{keys, DistributedLock, LockBackend, LockError};

pub struct EtcdLockBackend {
    client: Client,
    cluster_prefix: String,
}

impl EtcdLockBackend {
    /// Connect to etcd and verify it is reachable. An unreachable backend is
    /// a construction-time error, never a deferred one.
    pub async fn connect(endpoints: &[String], cluster_prefix: &str) -> Result<Self, LockError> {
        let endpoints = if endpoints.is_empty() {
            vec!["http://127.0.0.1:2379".to_string()]
        } else {
            endpoints.to_vec()
        };

        let opts = ConnectOptions::default();
        let mut client = Client::connect(endpoints, Some(opts))
            .await
            .map_err(|e| LockError::ConnectionFailed(e.to_string()))?;
        client
            .status()
            .await
            .map_err(|e| LockError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            cluster_prefix: cluster_prefix.to_string(),
        })
    }
}

impl LockBackend for EtcdLockBackend {
    fn lock(&self, resource: &str, expiry: Duration) -> Arc<dyn DistributedLock> {
        Arc::new(EtcdLock {
            client: self.client.clone(),
            key: keys::lock_key(&self.cluster_prefix, resource),
            resource: resource.to_string(),
            ttl_secs: expiry.as_secs().max(1) as i64,
            token: Uuid::new_v4().to_string(),
            lease: Mutex::new(None),
        })
    }
}

/// Per-resource etcd lock.
pub struct EtcdLock {
    client: Client,
    key: String,
    resource: String,
    ttl_secs: i64,
    token: String,
    lease: Mutex<Option<i64>>,
}

impl EtcdLock {
    /// Renew our lease with a single keep-alive round trip. Returns false
    /// when the lease has already expired server-side.
    async fn renew(&self, lease_id: i64) -> bool {
        let mut client = self.client.clone();
        let Ok((mut keeper, mut stream)) = client.lease_client().keep_alive(lease_id).await else {
            return false;
        };
        if keeper.keep_alive().await.is_err() {
            return false;
        }
        match stream.message().await {
            Ok(Some(resp)) => resp.ttl() > 0,
            _ => false,
        }
    }
}

#[async_trait]
impl DistributedLock for EtcdLock {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn acquire(&self) -> Result<bool, LockError> {
        let mut lease = self.lease.lock().await;

        if let Some(lease_id) = *lease {
            if self.renew(lease_id).await {
                return Ok(true);
            }
            // Lease expired underneath us; contend for a fresh one.
            debug!(resource = %self.resource, "lease lapsed; reacquiring");
            *lease = None;
        }

        let mut client = self.client.clone();
        let lease_id = client
            .lease_grant(self.ttl_secs, None)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?
            .id();

        // First writer wins: the key may only be created, never overwritten,
        // while a live lease keeps it alive.
        let txn = Txn::new()
            .when(vec![Compare::create_revision(
                self.key.as_str(),
                CompareOp::Equal,
                0,
            )])
            .and_then(vec![TxnOp::put(
                self.key.as_str(),
                self.token.as_str(),
                Some(PutOptions::new().with_lease(lease_id)),
            )])
            .or_else(vec![]);
        let resp = client
            .txn(txn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        if resp.succeeded() {
            *lease = Some(lease_id);
            debug!(resource = %self.resource, lease_id, "lease acquired");
            Ok(true)
        } else {
            let _ = client.lease_revoke(lease_id).await;
            Ok(false)
        }
    }

    async fn release(&self) -> Result<(), LockError> {
        let mut lease = self.lease.lock().await;
        let Some(lease_id) = lease.take() else {
            return Ok(());
        };

        let mut client = self.client.clone();
        // Delete only if the key still carries our token; a peer that took
        // over after our lease lapsed must not lose its claim.
        let txn = Txn::new()
            .when(vec![Compare::value(
                self.key.as_str(),
                CompareOp::Equal,
                self.token.as_str(),
            )])
            .and_then(vec![TxnOp::delete(self.key.as_str(), None)])
            .or_else(vec![]);
        let _ = client.txn(txn).await;
        let _ = client.lease_revoke(lease_id).await;
        debug!(resource = %self.resource, lease_id, "lease released");
        Ok(())
    }
}
