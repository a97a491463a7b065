use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "nimbus_cache_hit_total",
            Unit::Count,
            "Total number of cache hits."
        );
        describe_counter!(
            "nimbus_cache_miss_total",
            Unit::Count,
            "Total number of cache misses."
        );
        describe_counter!(
            "nimbus_cache_set_total",
            Unit::Count,
            "Total number of cache writes."
        );
        describe_counter!(
            "nimbus_cache_delete_total",
            Unit::Count,
            "Total number of cache keys removed."
        );
        describe_counter!(
            "nimbus_cache_error_total",
            Unit::Count,
            "Total number of degraded cache operations."
        );
        describe_counter!(
            "nimbus_cache_invalidation_total",
            Unit::Count,
            "Total number of invalidation events processed."
        );
        describe_histogram!(
            "nimbus_cache_warmup_ms",
            Unit::Milliseconds,
            "Cache warmup latency in milliseconds."
        );
        describe_gauge!(
            "nimbus_ws_connections",
            Unit::Count,
            "Currently registered WebSocket connections."
        );
        describe_counter!(
            "nimbus_ws_messages_total",
            Unit::Count,
            "Total number of inbound WebSocket messages by kind."
        );
        describe_counter!(
            "nimbus_ws_terminated_total",
            Unit::Count,
            "Connections terminated by the liveness sweep."
        );
        describe_counter!(
            "nimbus_lifecycle_transitions_total",
            Unit::Count,
            "Simulated cloud-PC lifecycle transitions that settled."
        );
    });
}
