//! Prometheus metrics
//!
//! Recorders for the playback and pool layers; the embedding connection
//! manager calls these around orchestrator invocations.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and register metric descriptions
///
/// Safe to call more than once; later calls return the existing handle.
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Some(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_counter!(
                "playback_total",
                "Playback episodes by terminal status"
            );
            describe_counter!(
                "playback_frames_sent_total",
                "Audio frames delivered to transports"
            );
            describe_counter!(
                "pool_allocations_total",
                "Pool allocations by pool and tier"
            );
            describe_histogram!(
                "synthesis_duration_seconds",
                Unit::Seconds,
                "Wall time of synthesis per episode"
            );
            describe_histogram!(
                "stream_duration_seconds",
                Unit::Seconds,
                "Wall time of the frame streaming phase per episode"
            );

            let _ = PROMETHEUS_HANDLE.set(handle.clone());
            Some(handle)
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        },
    }
}

/// Render the current metrics in Prometheus exposition format
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Record a finished playback episode
pub fn record_playback(status: &str, frames_sent: u64) {
    counter!("playback_total", "status" => status.to_string()).increment(1);
    counter!("playback_frames_sent_total").increment(frames_sent);
}

/// Record synthesis wall time
pub fn record_synthesis_latency(seconds: f64) {
    histogram!("synthesis_duration_seconds").record(seconds);
}

/// Record streaming-phase wall time
pub fn record_stream_latency(seconds: f64) {
    histogram!("stream_duration_seconds").record(seconds);
}

/// Record a pool allocation
pub fn record_pool_allocation(pool: &str, tier: &str) {
    counter!(
        "pool_allocations_total",
        "pool" => pool.to_string(),
        "tier" => tier.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_and_record() {
        // May be a no-op if another test installed the recorder first
        init_metrics();

        record_playback("completed", 12);
        record_pool_allocation("synthesis", "warm");
        record_synthesis_latency(0.2);

        let rendered = metrics_handler().await;
        if PROMETHEUS_HANDLE.get().is_some() {
            assert!(rendered.contains("playback_total"));
        }
    }
}
