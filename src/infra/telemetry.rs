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
            "stampa_jobs_submitted_total",
            Unit::Count,
            "Total number of jobs accepted for rendering."
        );
        describe_counter!(
            "stampa_jobs_completed_total",
            Unit::Count,
            "Total number of jobs that produced an artifact."
        );
        describe_counter!(
            "stampa_jobs_failed_total",
            Unit::Count,
            "Total number of jobs that ended in failure, timeouts included."
        );
        describe_counter!(
            "stampa_jobs_rejected_total",
            Unit::Count,
            "Total number of submissions rejected due to a full queue."
        );
        describe_gauge!(
            "stampa_queue_depth",
            Unit::Count,
            "Current number of job ids waiting in the queue."
        );
        describe_histogram!(
            "stampa_render_duration_ms",
            Unit::Milliseconds,
            "Wall-clock time from worker pickup to a terminal state."
        );
    });
}
