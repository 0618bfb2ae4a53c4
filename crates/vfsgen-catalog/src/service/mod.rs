//! Catalog client abstraction.

use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::model::{FileInfo, FileTriple, ScopeRequest, SeasonInfo, ShowInfo};

/// Read-only access to the metadata catalog.
///
/// Implementations must be safe to share across the worker pool; every method
/// may be called concurrently.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Enumerate the files that fall inside a scope.
    async fn files_for_scope(&self, request: &ScopeRequest) -> CatalogResult<Vec<FileTriple>>;

    /// Look up a series by identifier.
    async fn season_info(&self, series_id: &str) -> Option<SeasonInfo>;

    /// Look up the show a series belongs to.
    async fn show_info(&self, series_id: &str) -> Option<ShowInfo>;

    /// Look up a file as seen from the given series.
    async fn file_info(&self, file_id: &str, series_id: &str) -> Option<FileInfo>;
}
