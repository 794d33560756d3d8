/// The KV store key for a job record by id, used for point lookups.
pub fn job_key(job_id: &str) -> String {
    format!("job/{}", job_id)
}

/// Construct the ready-index key for a job, ordered by ready time.
pub fn ready_key(pool: &str, ready_time: i64, job_id: &str) -> String {
    // Zero-pad time to 20 digits so lexicographic order is ready_time asc,
    // then job_id asc. This is the promotion order and the tie-break.
    format!(
        "ready/{}/{:020}/{}",
        pool,
        ready_time.max(0) as u64,
        job_id
    )
}

/// Prefix covering every ready-index key of one pool.
pub fn ready_prefix(pool: &str) -> String {
    format!("ready/{}/", pool)
}

/// Parse the ready-time component back out of a ready-index key.
/// Format: ready/<pool>/<time:020>/<job_id>
pub fn parse_ready_time(key: &str) -> Option<i64> {
    let rest = key.strip_prefix("ready/")?;
    let mut parts = rest.splitn(3, '/');
    let _pool = parts.next()?;
    let ts = parts.next()?;
    ts.parse::<u64>().ok().map(|t| t as i64)
}
