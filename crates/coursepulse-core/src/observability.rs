//! Observability infrastructure for coursepulse.
//!
//! Structured logging with consistent spans: every rollup pass and every
//! dashboard derivation runs inside a span carrying the operation name and
//! course scope, so log lines from concurrent passes stay attributable.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `coursepulse_rollup=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for a rollup pass.
///
/// # Example
///
/// ```rust
/// use coursepulse_core::observability::rollup_span;
///
/// let span = rollup_span("enrollment");
/// let _guard = span.enter();
/// // ... run the pass
/// ```
#[must_use]
pub fn rollup_span(pass: &str) -> Span {
    tracing::info_span!("rollup", pass = pass)
}

/// Creates a span for a dashboard-facing derivation scoped to one course.
#[must_use]
pub fn insight_span(operation: &str, course: &str) -> Span {
    tracing::info_span!("insight", op = operation, course = course)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        // Second call must be a no-op, not a double-registration panic.
        init_logging(LogFormat::Json);
    }

    #[test]
    fn span_constructors_are_enterable() {
        init_logging(LogFormat::Pretty);
        let rollup = rollup_span("enrollment");
        let _rollup_guard = rollup.enter();
        let insight = insight_span("funnel", "course-v1:RG+Analytics+2024");
        let _insight_guard = insight.enter();
    }
}
