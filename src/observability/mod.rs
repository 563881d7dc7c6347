//! Observability: Prometheus metrics.
//!
//! ```rust,ignore
//! use tokio_esi::observability::Metrics;
//!
//! let metrics = Metrics::new()?;
//! metrics.record_http_request("GET", "/news/42", 200, 0.012);
//! println!("{}", metrics.export()?);
//! ```

pub mod metrics;

pub use metrics::Metrics;
