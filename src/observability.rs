use std::net::SocketAddr;
use std::time::Instant;

use crate::engine::{EngineError, Store};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine mutations executed. Labels: operation, status.
pub const OPERATIONS_TOTAL: &str = "roombook_operations_total";

/// Histogram: engine mutation latency in seconds, lock wait included. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "roombook_operation_duration_seconds";

/// Counter: reservations rejected because the window was taken.
pub const RESERVATION_CONFLICTS_TOTAL: &str = "roombook_reservation_conflicts_total";

/// Counter: HTTP requests answered. Labels: status.
pub const HTTP_REQUESTS_TOTAL: &str = "roombook_http_requests_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: rooms currently stored.
pub const ROOMS_ACTIVE: &str = "roombook_rooms_active";

/// Gauge: reservations currently stored, orphans included.
pub const RESERVATIONS_ACTIVE: &str = "roombook_reservations_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roombook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roombook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Record outcome and latency of one engine mutation.
pub fn observe<T>(operation: &'static str, started: Instant, result: &Result<T, EngineError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    metrics::counter!(OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_store_size(store: &Store) {
    metrics::gauge!(ROOMS_ACTIVE).set(store.room_count() as f64);
    metrics::gauge!(RESERVATIONS_ACTIVE).set(store.reservation_count() as f64);
}
