//! Prometheus metrics for tokio_esi.
//!
//! Covers the HTTP front end (rate, status, latency) and the ESI processor
//! (documents assembled or passed through, include fetches, fatal errors).

use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use regex::Regex;
use std::sync::OnceLock;

/// Global regex for path normalization (compiled once)
static PATH_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_path_regex() -> &'static Regex {
    PATH_REGEX.get_or_init(|| Regex::new(r"/\d+(/|$)").expect("Invalid regex"))
}

/// Prometheus metrics registry with all application metrics.
pub struct Metrics {
    registry: Registry,

    /// Total HTTP requests by method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration in seconds
    pub http_request_duration_seconds: HistogramVec,

    /// Top-level documents by outcome (assembled, passthrough, failed)
    pub esi_documents_total: CounterVec,

    /// Include sub-requests by response status
    pub esi_includes_total: CounterVec,

    /// Fatal ESI errors by kind
    pub esi_errors_total: CounterVec,

    /// Time spent assembling a top-level document
    pub esi_processing_duration_seconds: Histogram,
}

impl Metrics {
    /// Create a new metrics registry with all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let latency_buckets = vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ];

        let http_requests_total = CounterVec::new(
            Opts::new("tokio_esi_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tokio_esi_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(latency_buckets.clone()),
            &["method"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let esi_documents_total = CounterVec::new(
            Opts::new(
                "tokio_esi_documents_total",
                "Responses seen by the ESI processor, by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(esi_documents_total.clone()))?;

        let esi_includes_total = CounterVec::new(
            Opts::new(
                "tokio_esi_includes_total",
                "esi:include sub-requests, by response status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(esi_includes_total.clone()))?;

        let esi_errors_total = CounterVec::new(
            Opts::new("tokio_esi_errors_total", "Fatal ESI errors, by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(esi_errors_total.clone()))?;

        let esi_processing_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "tokio_esi_processing_duration_seconds",
                "Time to assemble a top-level document, including all includes",
            )
            .buckets(latency_buckets),
        )?;
        registry.register(Box::new(esi_processing_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            esi_documents_total,
            esi_includes_total,
            esi_errors_total,
            esi_processing_duration_seconds,
        })
    }

    /// Record HTTP request metrics.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        let path_normalized = normalize_path(path);

        self.http_requests_total
            .with_label_values(&[method, &path_normalized, &status_str])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method])
            .observe(duration_secs);
    }

    /// Count a top-level document by outcome
    /// (`assembled`, `passthrough` or `failed`).
    pub fn record_document(&self, outcome: &str) {
        self.esi_documents_total.with_label_values(&[outcome]).inc();
    }

    /// Count an include sub-request by its response status.
    pub fn record_include(&self, status: u16) {
        self.esi_includes_total
            .with_label_values(&[&status.to_string()])
            .inc();
    }

    /// Count a fatal ESI error.
    pub fn record_error(&self, kind: &str) {
        self.esi_errors_total.with_label_values(&[kind]).inc();
    }

    /// Observe top-level processing time.
    pub fn observe_processing(&self, duration_secs: f64) {
        self.esi_processing_duration_seconds.observe(duration_secs);
    }

    /// Export all metrics in Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Replace numeric path segments with `:id` to keep label cardinality low.
fn normalize_path(path: &str) -> String {
    let regex = get_path_regex();
    let mut normalized = path.to_string();
    // Adjacent numeric segments share a slash, so one pass can miss every
    // second one.
    while regex.is_match(&normalized) {
        normalized = regex.replace_all(&normalized, "/:id$1").into_owned();
    }
    normalized
}
