//! Logging setup and unified JSON log format.
//!
//! JSON log format (`LOG_FORMAT=json`):
//! ```json
//! {"ts":"2024-12-28T15:04:05.123Z","level":"info","type":"app","msg":"Server started","ctx":{"service":"tokio_esi"},"data":{}}
//! ```
//!
//! Events with target `access` become `"type":"access"` lines, every
//! `ERROR` event becomes `"type":"error"`, everything else is `"app"`.

use std::collections::HashMap;
use std::net::IpAddr;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::core::time::iso8601_now;

/// Fields lifted out of `data` into `ctx`.
const CONTEXT_FIELDS: [&str; 1] = ["request_id"];

/// Install the global subscriber.
///
/// Falls back to `tokio_esi=info` when the configured filter does not parse.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|e| {
        eprintln!("Warning: Invalid log filter '{}': {}", config.filter, e);
        EnvFilter::new("tokio_esi=info")
    });

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(JsonFormatter::new(config.service_name.clone())),
            )
            .init(),
    }
}

/// Custom JSON formatter for tracing.
pub struct JsonFormatter {
    service_name: String,
}

impl JsonFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Build the JSON line for a level, target and recorded fields.
    fn render(&self, level: Level, target: &str, visitor: FieldVisitor) -> serde_json::Value {
        let level_str = match level {
            Level::TRACE | Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };

        let log_type = if target == "access" {
            "access"
        } else if level == Level::ERROR {
            "error"
        } else {
            "app"
        };

        let mut data = visitor.fields;

        let msg = if log_type == "access" {
            // "METHOD /path STATUS"
            let method = data.get("method").and_then(|v| v.as_str()).unwrap_or("?");
            let path = data.get("path").and_then(|v| v.as_str()).unwrap_or("?");
            let status = data.get("status").and_then(|v| v.as_u64()).unwrap_or(0);
            format!("{} {} {}", method, path, status)
        } else {
            visitor.message.unwrap_or_default()
        };

        let mut ctx = serde_json::Map::new();
        ctx.insert("service".into(), serde_json::json!(self.service_name));
        for key in CONTEXT_FIELDS {
            if let Some(value) = data.remove(key) {
                ctx.insert(key.into(), value);
            }
        }

        serde_json::json!({
            "ts": iso8601_now(),
            "level": level_str,
            "type": log_type,
            "msg": msg,
            "ctx": ctx,
            "data": data,
        })
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);

        let entry = self.render(*meta.level(), meta.target(), visitor);

        writeln!(
            writer,
            "{}",
            serde_json::to_string(&entry).unwrap_or_default()
        )
    }
}

/// Field visitor for collecting tracing fields.
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, serde_json::Value>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: HashMap::new(),
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value).trim_matches('"').to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{:?}", value)),
            );
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }
}

/// One served request, as written to the access log.
#[derive(Debug)]
pub struct AccessEntry<'a> {
    pub request_id: &'a str,
    pub ip: Option<IpAddr>,
    pub method: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub status: u16,
    pub bytes: u64,
    pub duration_ms: f64,
    pub ua: Option<&'a str>,
    pub referer: Option<&'a str>,
}

/// Emit an access log event (target `access`).
pub fn log_access(entry: &AccessEntry<'_>) {
    let ip = entry.ip.map(|ip| ip.to_string());

    tracing::info!(
        target: "access",
        request_id = entry.request_id,
        ip = ip.as_deref().unwrap_or("-"),
        method = entry.method,
        path = entry.path,
        query = entry.query,
        status = entry.status as u64,
        bytes = entry.bytes,
        duration_ms = entry.duration_ms,
        ua = entry.ua,
        referer = entry.referer,
    );
}
