use crate::config::{LogFormat, TelemetryConfig};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const ITEMS_STORED: &str = "catalog_items_stored";
pub const ITEMS_FAILED: &str = "catalog_items_failed";
pub const MARKETS_SKIPPED: &str = "catalog_markets_skipped";
pub const MARKETS_ABANDONED: &str = "catalog_markets_abandoned";
pub const FETCH_OUTCOMES: &str = "catalog_fetch_outcomes";
pub const FETCH_DURATION_MS: &str = "catalog_fetch_duration_ms";

pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    if config.metrics_enabled {
        let addr: SocketAddr = ([0, 0, 0, 0], config.metrics_port).into();
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;

        describe_metrics();

        tracing::info!(
            port = config.metrics_port,
            "Metrics endpoint started at http://0.0.0.0:{}/metrics",
            config.metrics_port
        );
    }

    Ok(())
}

fn describe_metrics() {
    describe_counter!(ITEMS_STORED, "Catalog payloads written to the object store");
    describe_counter!(ITEMS_FAILED, "ASINs that produced no stored payload");
    describe_counter!(MARKETS_SKIPPED, "Markets given up before any ASIN was fetched");
    describe_counter!(MARKETS_ABANDONED, "Markets whose identifier pages stopped partway through");
    describe_counter!(FETCH_OUTCOMES, "Catalog fetches by outcome");
    describe_histogram!(FETCH_DURATION_MS, Unit::Milliseconds, "Catalog fetch latency including 202 waits");
}

pub fn shutdown() {
    tracing::info!("Shutting down telemetry");
}
