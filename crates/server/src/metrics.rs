//! Prometheus registry and encoding for the server.
//!
//! Core metrics (cache, upstream, search, sync) are registered alongside
//! the server-side gauges.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Current sync queue length (collected on scrape).
pub static SYNC_QUEUE_LENGTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("manhwadex_sync_queue_length", "Current sync queue length").unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(SYNC_QUEUE_LENGTH.clone()))
        .unwrap();

    for metric in manhwadex_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap_or_default()
}
