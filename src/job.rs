use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current epoch time in seconds.
///
/// All scheduling timestamps in the durable tier are absolute Unix seconds;
/// the lookahead window and remaining delays are computed against this clock.
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// A job as held by the durable tier, before promotion to the fast engine.
///
/// `pool` selects the deployment-level storage/engine pairing; `namespace`
/// and `queue` select a logical queue within the pool. Timestamps are Unix
/// seconds and satisfy `created_time <= ready_time < expired_time`
/// (validated by the submission front end, not here).
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct JobRecord {
    pub pool: String,
    pub namespace: String,
    pub queue: String,
    pub job_id: String,
    pub body: Vec<u8>,
    pub created_time: i64,
    pub expired_time: i64,
    pub ready_time: i64,
    /// Remaining delivery attempts. Owned by the fast engine once promoted.
    pub tries: u16,
}

/// A bounded request for durable records whose `ready_time` has passed the
/// cutoff. The pump loop issues pool-wide queries (no namespace/queue
/// filter); narrower lookups set the optional fields.
#[derive(Debug, Clone)]
pub struct JobQuery {
    pub pool: String,
    pub namespace: Option<String>,
    pub queue: Option<String>,
    /// Inclusive upper bound on `ready_time`, typically `now + threshold`.
    pub ready_time: i64,
    pub count: usize,
}

impl JobQuery {
    /// Pool-wide query used by the pump loop.
    pub fn pool_wide(pool: impl Into<String>, ready_time: i64, count: usize) -> Self {
        Self {
            pool: pool.into(),
            namespace: None,
            queue: None,
            ready_time,
            count,
        }
    }

    /// Whether a record matches this query's namespace/queue filters. The
    /// pool and ready-time cutoff are checked by the caller's scan.
    pub fn matches(&self, record: &JobRecord) -> bool {
        if let Some(ns) = &self.namespace {
            if &record.namespace != ns {
                return false;
            }
        }
        if let Some(q) = &self.queue {
            if &record.queue != q {
                return false;
            }
        }
        true
    }
}
