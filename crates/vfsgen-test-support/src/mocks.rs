//! In-memory catalog used by overlay and application tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;
use vfsgen_catalog::{
    CatalogClient, CatalogError, CatalogResult, EpisodeInfo, EpisodeType, FileInfo, FileTriple,
    ScopeRequest, SeasonInfo, SeriesType, ShowInfo, ShowSeason,
};

use crate::fixtures::{temp_dir, touch};

#[derive(Default)]
struct CatalogData {
    shows: Vec<ShowInfo>,
    seasons: HashMap<String, SeasonInfo>,
    files: Vec<FileTriple>,
    file_infos: HashMap<(String, String), FileInfo>,
}

impl CatalogData {
    fn show_for(&self, series_id: &str) -> Option<&ShowInfo> {
        self.shows.iter().find(|show| show.owns(series_id))
    }
}

/// Catalog backed by in-process maps, with call counting and fault injection.
#[derive(Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
    scope_calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    failing: AtomicBool,
}

impl InMemoryCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a show.
    pub fn add_show(&self, show: ShowInfo) {
        self.write().shows.push(show);
    }

    /// Register a series.
    pub fn add_season(&self, season: SeasonInfo) {
        self.write().seasons.insert(season.id.clone(), season);
    }

    /// Cross-reference a source file to episodes of a series.
    ///
    /// The file's [`FileInfo`] is derived from the registered series episodes.
    pub fn add_file(&self, source: &Path, file_id: &str, series_id: &str, episode_ids: &[&str]) {
        let mut data = self.write();
        let episodes = data
            .seasons
            .get(series_id)
            .map(|season| {
                episode_ids
                    .iter()
                    .filter_map(|id| season.episodes.iter().find(|e| e.id == *id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        data.file_infos.insert(
            (file_id.to_string(), series_id.to_string()),
            FileInfo {
                id: file_id.to_string(),
                series_id: series_id.to_string(),
                extra_type: None,
                episodes,
                release_group: None,
                resolution: None,
                part: None,
            },
        );
        data.files.push(FileTriple {
            source_location: source.to_path_buf(),
            file_id: file_id.to_string(),
            series_id: series_id.to_string(),
            episode_ids: episode_ids.iter().map(ToString::to_string).collect(),
        });
    }

    /// Replace the [`FileInfo`] for a file/series pair.
    pub fn set_file_info(&self, info: FileInfo) {
        self.write()
            .file_infos
            .insert((info.id.clone(), info.series_id.clone()), info);
    }

    /// Drop every cross-reference of a file.
    pub fn remove_file(&self, file_id: &str) {
        let mut data = self.write();
        data.files.retain(|triple| triple.file_id != file_id);
        data.file_infos.retain(|(id, _), _| id != file_id);
    }

    /// Delay every `files_for_scope` call.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Make `files_for_scope` fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `files_for_scope` calls observed so far.
    #[must_use]
    pub fn scope_calls(&self) -> usize {
        self.scope_calls.load(Ordering::SeqCst)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CatalogData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CatalogData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn files_for_scope(&self, request: &ScopeRequest) -> CatalogResult<Vec<FileTriple>> {
        self.scope_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::unavailable(
                "files_for_scope",
                std::io::Error::other("injected catalog failure"),
            ));
        }

        let data = self.read();
        Ok(data
            .files
            .iter()
            .filter(|triple| {
                request.matches(
                    triple,
                    data.show_for(&triple.series_id),
                    data.seasons.get(&triple.series_id),
                )
            })
            .cloned()
            .collect())
    }

    async fn season_info(&self, series_id: &str) -> Option<SeasonInfo> {
        self.read().seasons.get(series_id).cloned()
    }

    async fn show_info(&self, series_id: &str) -> Option<ShowInfo> {
        self.read().show_for(series_id).cloned()
    }

    async fn file_info(&self, file_id: &str, series_id: &str) -> Option<FileInfo> {
        self.read()
            .file_infos
            .get(&(file_id.to_string(), series_id.to_string()))
            .cloned()
    }
}

/// A temporary library holding the single-season show "Demo" (series `200`).
pub struct DemoLibrary {
    /// Backing temporary directory.
    pub dir: TempDir,
    /// Directory holding the real files.
    pub source_root: PathBuf,
    /// Directory the overlay is generated into.
    pub overlay_root: PathBuf,
    /// Catalog describing the library.
    pub catalog: Arc<InMemoryCatalog>,
}

impl DemoLibrary {
    /// Series (and show) identifier of "Demo".
    pub const SERIES_ID: &'static str = "200";

    /// Build the library with episodes 1-3 and a special, without any files.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary tree cannot be created.
    pub fn new() -> Result<Self> {
        let dir = temp_dir()?;
        let source_root = dir.path().join("src");
        let overlay_root = dir.path().join("vfs");
        std::fs::create_dir_all(&source_root)?;
        std::fs::create_dir_all(&overlay_root)?;

        let catalog = InMemoryCatalog::new();
        catalog.add_show(ShowInfo {
            id: Self::SERIES_ID.to_string(),
            name: "Demo".to_string(),
            seasons: vec![ShowSeason {
                series_id: Self::SERIES_ID.to_string(),
                season_number: 1,
            }],
            episode_padding: 2,
        });
        let episode = |id: &str, episode_type, number, title: &str| EpisodeInfo {
            id: id.to_string(),
            episode_type,
            number,
            title: Some(title.to_string()),
            extra_type: None,
        };
        catalog.add_season(SeasonInfo {
            id: Self::SERIES_ID.to_string(),
            title: "Demo".to_string(),
            series_type: SeriesType::Tv,
            episodes: vec![
                episode("20", EpisodeType::Normal, 1, "Arrival"),
                episode("21", EpisodeType::Normal, 2, "Departure"),
                episode("22", EpisodeType::Normal, 3, "Return"),
                episode("29", EpisodeType::Special, 1, "Recap"),
                episode("30", EpisodeType::Trailer, 1, "PV"),
            ],
        });

        Ok(Self {
            dir,
            source_root,
            overlay_root,
            catalog: Arc::new(catalog),
        })
    }

    /// Create a source file under `Show/` and cross-reference it.
    ///
    /// # Errors
    ///
    /// Returns an error when the source file cannot be written.
    pub fn add_episode_file(
        &self,
        file_name: &str,
        file_id: &str,
        episode_ids: &[&str],
    ) -> Result<PathBuf> {
        let source = self.source_root.join("Show").join(file_name);
        touch(&source, file_name)?;
        self.catalog
            .add_file(&source, file_id, Self::SERIES_ID, episode_ids);
        Ok(source)
    }

    /// Path of the `Season 01` folder in the overlay.
    #[must_use]
    pub fn season_dir(&self) -> PathBuf {
        self.show_dir().join("Season 01")
    }

    /// Path of the show folder in the overlay.
    #[must_use]
    pub fn show_dir(&self) -> PathBuf {
        self.overlay_root.join("Demo [sid=200]")
    }
}
