//! Error types for catalog lookups.

use std::error::Error;

use thiserror::Error;

/// Primary error type for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog backend could not answer the request.
    #[error("catalog unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The requested scope does not exist in the catalog.
    #[error("catalog scope not found")]
    ScopeNotFound {
        /// Library the scope was requested for.
        library_id: String,
    },
}

impl CatalogError {
    /// Wrap an arbitrary backend failure.
    pub fn unavailable(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Unavailable {
            operation,
            source: source.into(),
        }
    }
}

/// Convenience alias for catalog results.
pub type CatalogResult<T> = Result<T, CatalogError>;
