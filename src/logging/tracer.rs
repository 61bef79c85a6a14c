/*!
 * Tracing Setup
 * Structured logging for the orchestrator and every worker thread
 *
 * Environment variables:
 * - RUST_LOG: overrides the configured filter
 */

use super::types::{LoggingConfig, LoggingError, LoggingResult};
use tracing::info;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Install the global tracing subscriber
///
/// Fails on an invalid filter directive or when a subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> LoggingResult<()> {
    let directive = std::env::var("RUST_LOG").unwrap_or_else(|_| config.filter.clone());
    let env_filter =
        EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
            filter: directive.clone(),
            reason: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::NONE)
                    .compact(),
            )
            .try_init()
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
    info!(filter = %directive, json = config.json, "Tracing initialized");
    Ok(())
}

/// Unique identifier for one pipeline run, attached to orchestrator logs
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}
