//! Prometheus metrics for route decisions and connection binding

use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

/// Global metrics registry
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get the global metrics instance
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Sluice metrics collection
pub struct Metrics {
    /// Registry for all metrics
    pub registry: Registry,

    // Routing metrics
    /// Route decisions by target (master/slave)
    pub routes_total: IntCounterVec,
    /// Routing failures by error kind
    pub route_errors_total: IntCounterVec,
    /// Route cache lookups and inserts (hit/miss/insert)
    pub route_cache_total: IntCounterVec,

    // Binding metrics
    /// Connection binding events (bind/release/unbind/overwrite)
    pub binding_events_total: IntCounterVec,
    /// Backend connection acquisition failures by instance
    pub acquire_failures_total: IntCounterVec,
    /// ERR packets written to clients by error code
    pub session_errors_total: IntCounterVec,
}

fn counter_vec(name: &str, help: &str, label: &str) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help), &[label]).expect("valid metric definition")
}

impl Metrics {
    /// Create a new metrics collection
    pub fn new() -> Self {
        let registry = Registry::new();

        let routes_total = counter_vec(
            "sluice_routes_total",
            "Total number of route decisions by target",
            "target",
        );
        let route_errors_total = counter_vec(
            "sluice_route_errors_total",
            "Total number of routing failures by error kind",
            "kind",
        );
        let route_cache_total = counter_vec(
            "sluice_route_cache_total",
            "Route cache activity by result",
            "result",
        );
        let binding_events_total = counter_vec(
            "sluice_binding_events_total",
            "Backend connection binding events",
            "event",
        );
        let acquire_failures_total = counter_vec(
            "sluice_acquire_failures_total",
            "Backend connection acquisition failures by instance",
            "instance",
        );
        let session_errors_total = counter_vec(
            "sluice_session_errors_total",
            "Total number of error packets written to clients",
            "code",
        );

        for collector in [
            Box::new(routes_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(route_errors_total.clone()),
            Box::new(route_cache_total.clone()),
            Box::new(binding_events_total.clone()),
            Box::new(acquire_failures_total.clone()),
            Box::new(session_errors_total.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric registered once");
        }

        Self {
            registry,
            routes_total,
            route_errors_total,
            route_cache_total,
            binding_events_total,
            acquire_failures_total,
            session_errors_total,
        }
    }

    /// Record route decision
    pub fn record_route(&self, target: &str) {
        self.routes_total.with_label_values(&[target]).inc();
    }

    /// Record a routing failure
    pub fn record_route_error(&self, kind: &str) {
        self.route_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn record_route_cache(&self, result: &str) {
        self.route_cache_total.with_label_values(&[result]).inc();
    }

    pub fn record_binding(&self, event: &str) {
        self.binding_events_total.with_label_values(&[event]).inc();
    }

    pub fn record_acquire_failure(&self, instance: &str) {
        self.acquire_failures_total
            .with_label_values(&[instance])
            .inc();
    }

    pub fn record_session_error(&self, code: u16) {
        self.session_errors_total
            .with_label_values(&[&code.to_string()])
            .inc();
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
