//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "fedigate_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Inbox / queue metrics
    pub static ref INBOX_JOBS_ENQUEUED: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_inbox_jobs_enqueued_total", "Total number of inbox jobs enqueued"),
        &["lane"]
    ).expect("metric can be created");
    pub static ref INBOX_JOBS_DISPLACED: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_inbox_jobs_displaced_total", "Inbox jobs dropped because their lane was full"),
        &["lane"]
    ).expect("metric can be created");
    pub static ref INBOX_JOBS_PROCESSED: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_inbox_jobs_processed_total", "Inbox jobs handled by workers"),
        &["lane", "result"]
    ).expect("metric can be created");
    pub static ref INBOX_LANE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("fedigate_inbox_lane_depth", "Current number of jobs waiting in a lane"),
        &["lane"]
    ).expect("metric can be created");
    pub static ref ACTIVITYPUB_ACTIVITIES_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_activitypub_activities_received_total", "Total number of ActivityPub activities received"),
        &["activity_type"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_cache_hits_total", "Total number of cache hits"),
        &["cache_name"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_cache_misses_total", "Total number of cache misses"),
        &["cache_name"]
    ).expect("metric can be created");

    // Relationship metrics
    pub static ref RELATIONSHIP_REPAIRS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_relationship_repairs_total", "One-sided edges repaired by reconciliation"),
        &["action"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("fedigate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(INBOX_JOBS_ENQUEUED.clone()))
        .expect("INBOX_JOBS_ENQUEUED can be registered");
    REGISTRY
        .register(Box::new(INBOX_JOBS_DISPLACED.clone()))
        .expect("INBOX_JOBS_DISPLACED can be registered");
    REGISTRY
        .register(Box::new(INBOX_JOBS_PROCESSED.clone()))
        .expect("INBOX_JOBS_PROCESSED can be registered");
    REGISTRY
        .register(Box::new(INBOX_LANE_DEPTH.clone()))
        .expect("INBOX_LANE_DEPTH can be registered");
    REGISTRY
        .register(Box::new(ACTIVITYPUB_ACTIVITIES_RECEIVED.clone()))
        .expect("ACTIVITYPUB_ACTIVITIES_RECEIVED can be registered");
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(RELATIONSHIP_REPAIRS_TOTAL.clone()))
        .expect("RELATIONSHIP_REPAIRS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
