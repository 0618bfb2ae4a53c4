//! # Design
//!
//! - Centralize application-level errors for bootstrap and the bulk pass.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration was missing.
    #[error("missing environment configuration")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: &'static str,
    },
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: vfsgen_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: vfsgen_telemetry::TelemetryError,
    },
    /// Overlay generation failed for a library.
    #[error("overlay generation failed")]
    Overlay {
        /// Operation identifier.
        operation: &'static str,
        /// Library being generated.
        library_id: String,
        /// Source overlay error.
        source: vfsgen_overlay::OverlayError,
    },
    /// The catalog snapshot could not be decoded.
    #[error("catalog snapshot is malformed")]
    Snapshot {
        /// Snapshot file.
        path: PathBuf,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// Configuration values were invalid.
    #[error("invalid configuration")]
    InvalidConfig {
        /// Field name that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Optional value associated with the failure.
        value: Option<String>,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: vfsgen_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: vfsgen_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn overlay(
        operation: &'static str,
        library_id: String,
        source: vfsgen_overlay::OverlayError,
    ) -> Self {
        Self::Overlay {
            operation,
            library_id,
            source,
        }
    }
}
