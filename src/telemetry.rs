use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize tracing with JSON output for structured logging. Provides the
/// correlation ids and structured fields the audit trail and dashboards
/// rely on. A no-op when tracing is disabled in configuration; the
/// configured log level is the fallback when RUST_LOG is unset.
pub fn init_telemetry(observability: &ObservabilityConfig) -> Result<()> {
    if !observability.tracing_enabled {
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&observability.log_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(filter)
        .init();

    tracing::info!("Chairflow telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common transition attributes
pub fn create_transition_span(
    operation: &str,
    appointment_id: Option<Uuid>,
    chair_id: Option<Uuid>,
    correlation_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "flow_transition",
        operation = operation,
        appointment.id = appointment_id.map(tracing::field::display),
        chair.id = chair_id.map(tracing::field::display),
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}
