//! Catalog backed by a JSON snapshot exported from the metadata server.
//!
//! The snapshot lists shows, series and files; each file carries one entry per
//! series it is cross-referenced to, and the locations it is stored at.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use vfsgen_catalog::{
    CatalogClient, CatalogResult, FileInfo, FileTriple, ScopeRequest, SeasonInfo, ShowInfo,
};

use crate::error::{AppError, AppResult};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SnapshotDocument {
    shows: Vec<ShowInfo>,
    seasons: Vec<SeasonInfo>,
    files: Vec<SnapshotFile>,
}

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    locations: Vec<PathBuf>,
    cross_references: Vec<FileInfo>,
}

/// Read-only catalog loaded once from disk.
#[derive(Debug, Default)]
pub struct SnapshotCatalog {
    shows: Vec<ShowInfo>,
    seasons: HashMap<String, SeasonInfo>,
    triples: Vec<FileTriple>,
    files: HashMap<(String, String), FileInfo>,
}

impl SnapshotCatalog {
    /// Load a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when the file cannot be read and
    /// [`AppError::Snapshot`] when it is not a valid snapshot document.
    pub async fn load(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AppError::Io {
                operation: "snapshot.read",
                path: Some(path.to_path_buf()),
                source,
            })?;
        let catalog = Self::from_json(&raw).map_err(|source| AppError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            shows = catalog.shows.len(),
            series = catalog.seasons.len(),
            files = catalog.triples.len(),
            "loaded catalog snapshot"
        );
        Ok(catalog)
    }

    /// Parse a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when `raw` is not a valid snapshot document.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let document: SnapshotDocument = serde_json::from_str(raw)?;
        let mut catalog = Self {
            shows: document.shows,
            seasons: document
                .seasons
                .into_iter()
                .map(|season| (season.id.clone(), season))
                .collect(),
            ..Self::default()
        };
        for file in document.files {
            for info in file.cross_references {
                let episode_ids: Vec<String> =
                    info.episodes.iter().map(|episode| episode.id.clone()).collect();
                for location in &file.locations {
                    catalog.triples.push(FileTriple {
                        source_location: location.clone(),
                        file_id: info.id.clone(),
                        series_id: info.series_id.clone(),
                        episode_ids: episode_ids.clone(),
                    });
                }
                catalog
                    .files
                    .insert((info.id.clone(), info.series_id.clone()), info);
            }
        }
        Ok(catalog)
    }

    fn show_for(&self, series_id: &str) -> Option<&ShowInfo> {
        self.shows.iter().find(|show| show.owns(series_id))
    }
}

#[async_trait]
impl CatalogClient for SnapshotCatalog {
    async fn files_for_scope(&self, request: &ScopeRequest) -> CatalogResult<Vec<FileTriple>> {
        Ok(self
            .triples
            .iter()
            .filter(|triple| {
                request.matches(
                    triple,
                    self.show_for(&triple.series_id),
                    self.seasons.get(&triple.series_id),
                )
            })
            .cloned()
            .collect())
    }

    async fn season_info(&self, series_id: &str) -> Option<SeasonInfo> {
        self.seasons.get(series_id).cloned()
    }

    async fn show_info(&self, series_id: &str) -> Option<ShowInfo> {
        self.show_for(series_id).cloned()
    }

    async fn file_info(&self, file_id: &str, series_id: &str) -> Option<FileInfo> {
        self.files
            .get(&(file_id.to_string(), series_id.to_string()))
            .cloned()
    }
}
