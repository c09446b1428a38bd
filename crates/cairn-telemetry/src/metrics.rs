//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters the coordinator actually moves: HTTP traffic,
//!   dispatched/settled operations, root-hash lookups and the tracked-request gauge.

use std::sync::Arc;

use prometheus::{
    Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder, core::Collector,
};

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    operations_dispatched_total: IntCounterVec,
    operations_settled_total: IntCounterVec,
    root_hash_lookups_total: IntCounterVec,
    tracked_requests: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of request records currently held by the status table.
    pub tracked_requests: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let operations_dispatched_total = counter_vec(
            "operations_dispatched_total",
            "Store operations handed to the dispatcher by kind",
            &["kind"],
        )?;
        let operations_settled_total = counter_vec(
            "operations_settled_total",
            "Store operations observed as settled by kind and outcome",
            &["kind", "outcome"],
        )?;
        let root_hash_lookups_total = counter_vec(
            "root_hash_lookups_total",
            "Root hash resolutions by outcome (zero, hit, computed, failed)",
            &["outcome"],
        )?;
        let tracked_requests = IntGauge::with_opts(Opts::new(
            "tracked_requests",
            "Request records held by the status table",
        ))
        .map_err(|source| TelemetryError::Metric {
            name: "tracked_requests",
            source,
        })?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(
            &registry,
            "operations_dispatched_total",
            &operations_dispatched_total,
        )?;
        register(
            &registry,
            "operations_settled_total",
            &operations_settled_total,
        )?;
        register(&registry, "root_hash_lookups_total", &root_hash_lookups_total)?;
        register(&registry, "tracked_requests", &tracked_requests)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                operations_dispatched_total,
                operations_settled_total,
                root_hash_lookups_total,
                tracked_requests,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count an operation handed to the dispatcher.
    pub fn inc_operation_dispatched(&self, kind: &str) {
        self.inner
            .operations_dispatched_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count an operation whose outcome was observed by a poll.
    pub fn inc_operation_settled(&self, kind: &str, outcome: &str) {
        self.inner
            .operations_settled_total
            .with_label_values(&[kind, outcome])
            .inc();
    }

    /// Count a root hash resolution.
    pub fn inc_root_hash_lookup(&self, outcome: &str) {
        self.inner
            .root_hash_lookups_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Set the tracked request gauge.
    pub fn set_tracked_requests(&self, count: usize) {
        self.inner
            .tracked_requests
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Encode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::EncodeUtf8 { source })
    }

    /// Take a point-in-time snapshot of the health-relevant gauges.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tracked_requests: self.inner.tracked_requests.get(),
        }
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::Metric { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::Metric { name, source })
}
