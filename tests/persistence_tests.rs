use spillway::job::{JobQuery, JobRecord};
use spillway::persistence::{Persistence, SlatePersistence};
use spillway::settings::{Backend, StorageConfig};

async fn open_memory_store() -> SlatePersistence {
    let cfg = StorageConfig {
        backend: Backend::Memory,
        path: "test".to_string(),
    };
    SlatePersistence::open(&cfg).await.expect("open store")
}

fn job(pool: &str, id: &str, ready_time: i64) -> JobRecord {
    JobRecord {
        pool: pool.to_string(),
        namespace: "default".to_string(),
        queue: "orders".to_string(),
        job_id: id.to_string(),
        body: b"payload".to_vec(),
        created_time: ready_time - 3600,
        expired_time: ready_time + 3600,
        ready_time,
        tries: 3,
    }
}

fn pool_query(pool: &str, cutoff: i64, count: usize) -> JobQuery {
    JobQuery::pool_wide(pool, cutoff, count)
}

#[tokio::test]
async fn fs_backend_round_trips_and_closes() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = StorageConfig {
        backend: Backend::Fs,
        path: tmp.path().to_string_lossy().to_string(),
    };
    let store = SlatePersistence::open(&cfg).await.expect("open store");

    store.add_jobs(&[job("p", "a", 10)]).await.unwrap();
    let got = store.get_jobs_by_id(&["a".to_string()]).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].job_id, "a");

    store.close().await.unwrap();
}

#[tokio::test]
async fn records_round_trip_through_point_lookup() {
    let store = open_memory_store().await;
    let mut record = job("p", "job-1", 1_700_000_100);
    record.namespace = "billing".to_string();
    record.queue = "invoices".to_string();
    record.body = serde_json::to_vec(&serde_json::json!({"hello": "world"})).unwrap();
    record.tries = 7;

    store.add_jobs(std::slice::from_ref(&record)).await.unwrap();

    let got = store
        .get_jobs_by_id(&["job-1".to_string()])
        .await
        .unwrap();
    assert_eq!(got, vec![record]);
}

#[tokio::test]
async fn missing_ids_are_absent_not_errors() {
    let store = open_memory_store().await;
    store.add_jobs(&[job("p", "job-1", 100)]).await.unwrap();

    let got = store
        .get_jobs_by_id(&["job-1".to_string(), "nope".to_string()])
        .await
        .unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].job_id, "job-1");
}

#[tokio::test]
async fn ready_jobs_come_back_in_ready_time_then_id_order() {
    let store = open_memory_store().await;
    store
        .add_jobs(&[
            job("p", "b", 30),
            job("p", "z", 10),
            job("p", "a", 30),
        ])
        .await
        .unwrap();

    let got = store.get_ready_jobs(&pool_query("p", 100, 10)).await.unwrap();
    let ids: Vec<&str> = got.iter().map(|j| j.job_id.as_str()).collect();
    assert_eq!(ids, vec!["z", "a", "b"]);
}

#[tokio::test]
async fn cutoff_is_inclusive_and_excludes_later_jobs() {
    let store = open_memory_store().await;
    store
        .add_jobs(&[job("p", "due", 100), job("p", "later", 101)])
        .await
        .unwrap();

    let got = store.get_ready_jobs(&pool_query("p", 100, 10)).await.unwrap();
    let ids: Vec<&str> = got.iter().map(|j| j.job_id.as_str()).collect();
    assert_eq!(ids, vec!["due"]);
}

#[tokio::test]
async fn result_never_exceeds_the_requested_count() {
    let store = open_memory_store().await;
    let jobs: Vec<JobRecord> = (0..10)
        .map(|i| job("p", &format!("job-{:02}", i), 10 + i))
        .collect();
    store.add_jobs(&jobs).await.unwrap();

    let got = store.get_ready_jobs(&pool_query("p", 1_000, 3)).await.unwrap();
    assert_eq!(got.len(), 3);
    // The cap keeps the earliest-ready records.
    assert_eq!(got[0].job_id, "job-00");
    assert_eq!(got[2].job_id, "job-02");
}

#[tokio::test]
async fn pools_do_not_see_each_other() {
    let store = open_memory_store().await;
    store
        .add_jobs(&[job("p1", "a", 10), job("p2", "b", 10)])
        .await
        .unwrap();

    let got = store.get_ready_jobs(&pool_query("p1", 100, 10)).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].job_id, "a");
}

#[tokio::test]
async fn namespace_and_queue_filters_narrow_the_result() {
    let store = open_memory_store().await;
    let mut other_ns = job("p", "other-ns", 10);
    other_ns.namespace = "billing".to_string();
    let mut other_q = job("p", "other-q", 10);
    other_q.queue = "emails".to_string();
    store
        .add_jobs(&[job("p", "wanted", 10), other_ns, other_q])
        .await
        .unwrap();

    let mut query = pool_query("p", 100, 10);
    query.namespace = Some("default".to_string());
    query.queue = Some("orders".to_string());

    let got = store.get_ready_jobs(&query).await.unwrap();
    let ids: Vec<&str> = got.iter().map(|j| j.job_id.as_str()).collect();
    assert_eq!(ids, vec!["wanted"]);
}

#[tokio::test]
async fn deleted_records_never_come_back() {
    let store = open_memory_store().await;
    store
        .add_jobs(&[job("p", "a", 10), job("p", "b", 20)])
        .await
        .unwrap();

    let removed = store
        .del_jobs(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(removed, 2);

    assert!(store.get_ready_jobs(&pool_query("p", 100, 10)).await.unwrap().is_empty());
    assert!(store.get_jobs_by_id(&["a".to_string()]).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store = open_memory_store().await;
    store.add_jobs(&[job("p", "a", 10)]).await.unwrap();

    let ids = vec!["a".to_string()];
    assert_eq!(store.del_jobs(&ids).await.unwrap(), 1);
    // Retried cycles delete ids that are already gone; that is a no-op.
    assert_eq!(store.del_jobs(&ids).await.unwrap(), 0);
    assert_eq!(store.del_jobs(&["ghost".to_string()]).await.unwrap(), 0);
}

#[tokio::test]
async fn partial_deletes_leave_the_rest_in_place() {
    let store = open_memory_store().await;
    store
        .add_jobs(&[job("p", "keep", 10), job("p", "drop", 20)])
        .await
        .unwrap();

    assert_eq!(store.del_jobs(&["drop".to_string()]).await.unwrap(), 1);

    let got = store.get_ready_jobs(&pool_query("p", 100, 10)).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].job_id, "keep");
}
