//! Prometheus metrics for core components.
//!
//! Covers the cache tiers, the upstream client, the search path and the
//! background synchroniser.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

/// Cache requests by tier and outcome ("hit" / "miss").
pub static CACHE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("manhwadex_cache_requests_total", "Cache requests by tier"),
        &["tier", "outcome"],
    )
    .unwrap()
});

/// Requests issued to the upstream catalogue by endpoint class.
pub static UPSTREAM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "manhwadex_upstream_requests_total",
            "Requests issued to the upstream catalogue",
        ),
        &["endpoint"], // "catalogue", "login", "random"
    )
    .unwrap()
});

/// Search requests by the sources that answered them.
pub static SEARCH_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("manhwadex_search_requests_total", "Search requests"),
        &["source"], // "cache", "local", "external", "external_failed"
    )
    .unwrap()
});

/// Search latency in seconds.
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("manhwadex_search_duration_seconds", "Search latency")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0]),
        &["source"],
    )
    .unwrap()
});

/// Sync attempts by result.
pub static SYNC_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("manhwadex_sync_outcomes_total", "Sync attempts by result"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Items re-queued for another sync attempt.
pub static SYNC_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("manhwadex_sync_retries_total", "Sync retries enqueued").unwrap()
});

/// Failures of the sync queue machinery itself (seeding, scheduling).
pub static SYNC_QUEUE_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("manhwadex_sync_queue_errors_total", "Sync queue errors").unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CACHE_REQUESTS.clone()),
        Box::new(UPSTREAM_REQUESTS.clone()),
        Box::new(SEARCH_REQUESTS.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(SYNC_OUTCOMES.clone()),
        Box::new(SYNC_RETRIES.clone()),
        Box::new(SYNC_QUEUE_ERRORS.clone()),
    ]
}
