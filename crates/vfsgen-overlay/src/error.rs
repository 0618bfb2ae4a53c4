//! # Design
//!
//! - Provide structured, constant-message errors for overlay generation.
//! - Capture operation context (paths, libraries) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use vfsgen_catalog::CatalogError;

/// Result type for overlay operations.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Errors produced by overlay generation.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// IO failures while interacting with the filesystem.
    #[error("overlay io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("overlay walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// The catalog could not enumerate the requested scope.
    #[error("overlay catalog failure")]
    Catalog {
        /// Library the scope belongs to.
        library_id: String,
        /// Underlying catalog error.
        source: CatalogError,
    },
    /// The platform refused to create symbolic links.
    #[error("symbolic links are not supported")]
    SymlinkUnsupported {
        /// Link that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A background worker panicked or was cancelled.
    #[error("overlay worker failed")]
    Join {
        /// Operation the worker was performing.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
    /// The link executor was shut down while work was pending.
    #[error("overlay executor closed")]
    ExecutorClosed,
    /// A generation pass shared with concurrent callers failed.
    #[error("shared overlay generation failed")]
    Shared {
        /// Failure observed by every caller of the pass.
        source: Arc<OverlayError>,
    },
    /// Input validation failures.
    #[error("overlay invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl OverlayError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn join(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Join { operation, source }
    }

    /// Take back a failure handed out by the path cache.
    ///
    /// The original error is returned when no other caller still holds it.
    pub(crate) fn shared(error: Arc<Self>) -> Self {
        Arc::try_unwrap(error).unwrap_or_else(|source| Self::Shared { source })
    }

    /// The underlying failure, looking through shared passes.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Shared { source } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the error aborts generation for every scope, not just the current one.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self.root_cause(), Self::SymlinkUnsupported { .. })
    }
}
