//! Structured logging bootstrap.
//!
//! The security core only emits `tracing` events. This module installs the
//! subscriber that turns them into log lines: JSON for production hosts,
//! the human-readable `fmt` layer for development.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Structured logger handle
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    /// Name of the service the logger was installed for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Install the global `tracing` subscriber.
///
/// Fails if the filter directive is invalid or a global subscriber is
/// already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::LoggerInit(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(config.with_source_location)
            .with_line_number(config.with_source_location);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggerInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(config.with_source_location)
            .with_line_number(config.with_source_location);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggerInit(e.to_string()))?;
    }

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging configured"
    );

    Ok(StructuredLogger {
        service_name: config.service_name.clone(),
    })
}

/// Emit a security event with the standard `subsystem` field.
#[macro_export]
macro_rules! log_security_event {
    (info, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            subsystem = "ipc-security",
            $($($field)*,)?
            $msg
        )
    };

    (warn, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            subsystem = "ipc-security",
            $($($field)*,)?
            $msg
        )
    };

    (error, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            subsystem = "ipc-security",
            $($($field)*,)?
            $msg
        )
    };

    (debug, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            subsystem = "ipc-security",
            $($($field)*,)?
            $msg
        )
    };
}
