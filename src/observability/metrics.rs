//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_dispatches_total` (counter): dispatches by target and outcome
//! - `relay_dispatch_duration_seconds` (histogram): dispatch latency
//! - `relay_active_connections` (gauge): live client connections
//! - `relay_target_health` (gauge): 1=reachable, 0=unreachable
//! - `relay_auth_failures_total` (counter): rejected tokens by reason

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_dispatch(target: &str, ok: bool, start: Instant) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!(
        "relay_dispatches_total",
        "target" => target.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
    metrics::histogram!(
        "relay_dispatch_duration_seconds",
        "target" => target.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_connection_opened() {
    metrics::gauge!("relay_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("relay_active_connections").decrement(1.0);
}

pub fn record_target_health(target: &str, reachable: bool) {
    metrics::gauge!("relay_target_health", "target" => target.to_string())
        .set(if reachable { 1.0 } else { 0.0 });
}

pub fn record_auth_failure(reason: &'static str) {
    metrics::counter!("relay_auth_failures_total", "reason" => reason).increment(1);
}
