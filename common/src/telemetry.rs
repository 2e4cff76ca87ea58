// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging with JSON formatting
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, "Structured logging initialized");
    Ok(())
}

/// Initialize the Prometheus metrics exporter and describe all metrics
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "queue_ticks_skipped_total",
        "Scheduler ticks that did not start a cycle, by reason"
    );
    describe_counter!("queue_cycles_total", "Completed cycles, by outcome");
    describe_counter!(
        "queue_snapshots_persisted_total",
        "Snapshot rows written, by stream"
    );
    describe_counter!(
        "queue_transitions_total",
        "Detected ticket-availability transitions, by kind"
    );
    describe_counter!(
        "queue_notifications_total",
        "Notification attempts, by outcome"
    );
    describe_gauge!("queue_cycles_in_flight", "Cycles currently running");

    tracing::info!(
        metrics_port = metrics_port,
        "Prometheus metrics exporter initialized"
    );
    Ok(())
}

#[inline]
pub fn record_tick_skipped(reason: &'static str) {
    counter!("queue_ticks_skipped_total", "reason" => reason).increment(1);
}

#[inline]
pub fn record_cycle(outcome: &'static str) {
    counter!("queue_cycles_total", "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_snapshot_persisted(stream: &str) {
    counter!("queue_snapshots_persisted_total", "stream" => stream.to_string()).increment(1);
}

#[inline]
pub fn record_transition(kind: &'static str) {
    counter!("queue_transitions_total", "kind" => kind).increment(1);
}

#[inline]
pub fn record_notification(outcome: &'static str) {
    counter!("queue_notifications_total", "outcome" => outcome).increment(1);
}

#[inline]
pub fn update_cycles_in_flight(count: usize) {
    gauge!("queue_cycles_in_flight").set(count as f64);
}
