//! Prometheus metrics for cache monitoring.
//!
//! Recorded through the `metrics` facade; exporting is left to the host
//! application.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names for the cache layer.
pub mod names {
    /// Total cache hits.
    pub const CACHE_HITS_TOTAL: &str = "linkedall_cache_hits_total";
    /// Total cache misses.
    pub const CACHE_MISSES_TOTAL: &str = "linkedall_cache_misses_total";
    /// Total degraded cache operations.
    pub const CACHE_ERRORS_TOTAL: &str = "linkedall_cache_errors_total";
    /// Key-value store operation duration in seconds.
    pub const OPERATION_DURATION_SECONDS: &str = "linkedall_cache_operation_duration_seconds";

    /// Entries waiting for the next write-back flush.
    pub const WRITE_BACK_PENDING: &str = "linkedall_cache_write_back_pending";
    /// Write-back entries persisted, by outcome.
    pub const WRITE_BACK_FLUSHED_TOTAL: &str = "linkedall_cache_write_back_flushed_total";
}

/// Label used when an operation has no namespace prefix.
const NO_NAMESPACE: &str = "none";

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Total number of cache hits");
    describe_counter!(names::CACHE_MISSES_TOTAL, "Total number of cache misses");
    describe_counter!(
        names::CACHE_ERRORS_TOTAL,
        "Total number of cache operations that failed and were degraded"
    );
    describe_histogram!(
        names::OPERATION_DURATION_SECONDS,
        "Key-value store operation duration in seconds"
    );

    describe_gauge!(
        names::WRITE_BACK_PENDING,
        "Current number of write-back entries awaiting flush"
    );
    describe_counter!(
        names::WRITE_BACK_FLUSHED_TOTAL,
        "Total number of write-back entries flushed to the system of record"
    );
}

/// Cache metrics recorder.
#[derive(Clone)]
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a cache hit.
    pub fn hit(namespace: Option<&str>) {
        counter!(
            names::CACHE_HITS_TOTAL,
            "namespace" => namespace_label(namespace)
        )
        .increment(1);
    }

    /// Record a cache miss.
    pub fn miss(namespace: Option<&str>) {
        counter!(
            names::CACHE_MISSES_TOTAL,
            "namespace" => namespace_label(namespace)
        )
        .increment(1);
    }

    /// Record an operation whose failure was converted into a default.
    pub fn error(operation: &'static str) {
        counter!(names::CACHE_ERRORS_TOTAL, "operation" => operation).increment(1);
    }

    /// Record a store round-trip, retries included.
    pub fn operation_duration(operation: &'static str, duration: Duration) {
        histogram!(
            names::OPERATION_DURATION_SECONDS,
            "operation" => operation
        )
        .record(duration.as_secs_f64());
    }

    /// Update the pending write-back gauge.
    pub fn write_back_pending(pending: usize) {
        gauge!(names::WRITE_BACK_PENDING).set(pending as f64);
    }

    /// Record the outcome of a write-back flush.
    pub fn write_back_flushed(succeeded: usize, failed: usize) {
        counter!(names::WRITE_BACK_FLUSHED_TOTAL, "outcome" => "success").increment(succeeded as u64);
        counter!(names::WRITE_BACK_FLUSHED_TOTAL, "outcome" => "failure").increment(failed as u64);
    }
}

fn namespace_label(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => ns.to_string(),
        _ => NO_NAMESPACE.to_string(),
    }
}
