//! Prometheus metrics for Spillway.
//!
//! Initialize once at startup with `metrics::init()`, hand the `Metrics`
//! handle to the manager, and serve the `/metrics` endpoint with
//! `run_metrics_server` when an address is configured.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    core::Collector, CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{debug, error};

/// Histogram buckets for pump cycle durations (in seconds)
const CYCLE_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Spillway metrics handle containing all metric instruments.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    jobs_added: CounterVec,
    jobs_promoted: CounterVec,
    pump_cycles: CounterVec,
    pump_cycle_duration: HistogramVec,
    lease_held: GaugeVec,
}

impl Metrics {
    /// Get the prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a durable job submission.
    pub fn record_added(&self, pool: &str) {
        self.jobs_added.with_label_values(&[pool]).inc();
    }

    /// Record jobs handed to the fast engine and retired from storage.
    pub fn record_promoted(&self, pool: &str, count: u64) {
        self.jobs_promoted
            .with_label_values(&[pool])
            .inc_by(count as f64);
    }

    /// Record a completed pump cycle and its duration.
    pub fn record_cycle(&self, pool: &str, outcome: &str, duration: Duration) {
        self.pump_cycles.with_label_values(&[pool, outcome]).inc();
        self.pump_cycle_duration
            .with_label_values(&[pool])
            .observe(duration.as_secs_f64());
    }

    /// Track whether this process currently holds a pool's lease.
    pub fn set_lease_held(&self, pool: &str, held: bool) {
        self.lease_held
            .with_label_values(&[pool])
            .set(if held { 1.0 } else { 0.0 });
    }
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

/// Create and register all metric instruments.
pub fn init() -> Result<Metrics, prometheus::Error> {
    let registry = Registry::new();

    let jobs_added = register(
        &registry,
        CounterVec::new(
            Opts::new(
                "spillway_jobs_added_total",
                "Jobs written to the durable tier",
            ),
            &["pool"],
        )?,
    )?;

    let jobs_promoted = register(
        &registry,
        CounterVec::new(
            Opts::new(
                "spillway_jobs_promoted_total",
                "Jobs published to the fast engine and retired from the durable tier",
            ),
            &["pool"],
        )?,
    )?;

    let pump_cycles = register(
        &registry,
        CounterVec::new(
            Opts::new(
                "spillway_pump_cycles_total",
                "Pump cycles run while holding the lease, by outcome",
            ),
            &["pool", "outcome"],
        )?,
    )?;

    let pump_cycle_duration = register(
        &registry,
        HistogramVec::new(
            HistogramOpts::new(
                "spillway_pump_cycle_duration_seconds",
                "Duration of pump cycles",
            )
            .buckets(CYCLE_BUCKETS.to_vec()),
            &["pool"],
        )?,
    )?;

    let lease_held = register(
        &registry,
        GaugeVec::new(
            Opts::new(
                "spillway_lease_held",
                "Whether this process holds the pool's pump lease (1) or not (0)",
            ),
            &["pool"],
        )?,
    )?;

    Ok(Metrics {
        registry: Arc::new(registry),
        jobs_added,
        jobs_promoted,
        pump_cycles,
        pump_cycle_duration,
        lease_held,
    })
}

/// Axum handler for the `/metrics` endpoint.
async fn metrics_handler(State(metrics): State<Metrics>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

/// Run the Prometheus metrics HTTP server.
///
/// Listens on the given address and serves metrics at `/metrics`.
/// Shuts down gracefully when shutdown signal is received.
pub async fn run_metrics_server(
    addr: SocketAddr,
    metrics: Metrics,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    debug!(addr = %addr, "metrics server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            debug!("metrics server shutting down");
        })
        .await?;

    Ok(())
}
