//! Typed configuration document.
//!
//! # Design
//! - Pure data carriers; every section falls back to its defaults when omitted.
//! - Keeps domain types separate from IO in `loader.rs`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Kind of content a library holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// Series only.
    Shows,
    /// Movies only.
    Movies,
    /// Anything goes.
    #[default]
    Mixed,
}

impl CollectionType {
    #[must_use]
    /// Render the collection type as its lowercase string representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shows => "shows",
            Self::Movies => "movies",
            Self::Mixed => "mixed",
        }
    }
}

/// One media library mirrored into an overlay root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Stable identifier used in logs, events and the catalog.
    pub id: String,
    /// Content kind of the library.
    #[serde(default)]
    pub collection_type: CollectionType,
    /// Directory the overlay is generated into.
    pub overlay_root: PathBuf,
    /// Directories holding the real media files.
    #[serde(default)]
    pub source_roots: Vec<PathBuf>,
}

impl LibraryConfig {
    /// Whether `path` lies under one of the source roots.
    #[must_use]
    pub fn contains_source(&self, path: &Path) -> bool {
        self.source_roots.iter().any(|root| path.starts_with(root))
    }
}

/// Placement toggles for extras.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtrasConfig {
    /// Link trailers into `trailers`.
    pub add_trailers: bool,
    /// Link theme videos into `backdrops`.
    pub credits_as_theme_videos: bool,
    /// Link theme videos into `extras`.
    pub credits_as_special_features: bool,
}

impl Default for ExtrasConfig {
    fn default() -> Self {
        Self {
            add_trailers: true,
            credits_as_theme_videos: true,
            credits_as_special_features: false,
        }
    }
}

/// Optional detail tokens added to file names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DetailsConfig {
    /// Append `[<release group>]`.
    pub add_release_group: bool,
    /// Append `[<resolution>]`.
    pub add_resolution: bool,
}

/// Path cache lifetimes and size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on cached scope entries.
    pub max_entries: u64,
    /// Lifetime of an entry regardless of access.
    pub absolute_ttl_secs: u64,
    /// Idle lifetime of an entry, refreshed on every hit.
    pub sliding_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: defaults::CACHE_MAX_ENTRIES,
            absolute_ttl_secs: defaults::ABSOLUTE_TTL_SECS,
            sliding_ttl_secs: defaults::SLIDING_TTL_SECS,
        }
    }
}

impl CacheConfig {
    /// Absolute lifetime as a [`Duration`].
    #[must_use]
    pub const fn absolute_ttl(&self) -> Duration {
        Duration::from_secs(self.absolute_ttl_secs)
    }

    /// Sliding lifetime as a [`Duration`].
    #[must_use]
    pub const fn sliding_ttl(&self) -> Duration {
        Duration::from_secs(self.sliding_ttl_secs)
    }
}

/// File classification lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilesConfig {
    /// Extensions (with leading dot) treated as video.
    pub video_extensions: Vec<String>,
    /// Extensions (with leading dot) treated as subtitles.
    pub subtitle_extensions: Vec<String>,
    /// Characters allowed between a video stem and subtitle flags.
    pub flag_delimiters: Vec<char>,
    /// Folder names that may hold user-placed extras.
    pub extras_folder_names: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(ToString::to_string).collect();
        Self {
            video_extensions: owned(defaults::VIDEO_EXTENSIONS),
            subtitle_extensions: owned(defaults::SUBTITLE_EXTENSIONS),
            flag_delimiters: defaults::FLAG_DELIMITERS.to_vec(),
            extras_folder_names: owned(defaults::EXTRAS_FOLDER_NAMES),
        }
    }
}

impl FilesConfig {
    /// Whether `path` carries one of the video extensions.
    #[must_use]
    pub fn is_video(&self, path: &Path) -> bool {
        has_extension(path, &self.video_extensions)
    }

    /// Whether `path` carries one of the subtitle extensions.
    #[must_use]
    pub fn is_subtitle(&self, path: &Path) -> bool {
        has_extension(path, &self.subtitle_extensions)
    }

    /// Whether `name` is one of the extras folder names.
    #[must_use]
    pub fn is_extras_folder(&self, name: &str) -> bool {
        self.extras_folder_names
            .iter()
            .any(|folder| folder.eq_ignore_ascii_case(name))
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    extensions.iter().any(|candidate| {
        candidate
            .strip_prefix('.')
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(extension))
    })
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// Structured JSON lines.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Output format; `None` picks one from the build profile.
    pub format: Option<LogFormat>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Libraries to mirror.
    pub libraries: Vec<LibraryConfig>,
    /// Link executor concurrency ceiling.
    pub threads: usize,
    /// Maximum length of a human-readable name component.
    pub name_cutoff: usize,
    /// Keep movies out of show libraries.
    pub separate_movies: bool,
    /// Keep non-movie series out of movie libraries.
    pub filter_movie_libraries: bool,
    /// Extras placement.
    pub extras: ExtrasConfig,
    /// File name detail tokens.
    pub details: DetailsConfig,
    /// Path cache lifetimes.
    pub cache: CacheConfig,
    /// File classification lists.
    pub files: FilesConfig,
    /// Logging settings.
    pub logging: LoggingSection,
    /// JSON catalog snapshot consumed by the binary.
    pub catalog_snapshot: Option<PathBuf>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            threads: defaults::THREADS,
            name_cutoff: defaults::NAME_CUTOFF,
            separate_movies: false,
            filter_movie_libraries: true,
            extras: ExtrasConfig::default(),
            details: DetailsConfig::default(),
            cache: CacheConfig::default(),
            files: FilesConfig::default(),
            logging: LoggingSection::default(),
            catalog_snapshot: None,
        }
    }
}

impl OverlayConfig {
    /// Find a library by identifier.
    #[must_use]
    pub fn library(&self, id: &str) -> Option<&LibraryConfig> {
        self.libraries.iter().find(|library| library.id == id)
    }

    /// Find the library whose overlay root contains `path`.
    #[must_use]
    pub fn library_for_overlay_path(&self, path: &Path) -> Option<&LibraryConfig> {
        self.libraries
            .iter()
            .find(|library| path.starts_with(&library.overlay_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() -> anyhow::Result<()> {
        let config: OverlayConfig = serde_json::from_str("{}")?;
        assert_eq!(config, OverlayConfig::default());
        assert_eq!(config.threads, 4);
        assert_eq!(config.name_cutoff, 64);
        assert!(config.filter_movie_libraries);
        assert!(config.extras.add_trailers);
        assert_eq!(config.cache.absolute_ttl(), Duration::from_secs(3_600));
        assert_eq!(config.cache.max_entries, 10_000);
        assert!(config.files.video_extensions.iter().any(|ext| ext == ".mkv"));
        Ok(())
    }

    #[test]
    fn file_classification_ignores_case() {
        let files = FilesConfig::default();
        assert!(files.is_video(Path::new("/media/Show/ep01.MKV")));
        assert!(!files.is_video(Path::new("/media/Show/ep01.en.srt")));
        assert!(files.is_subtitle(Path::new("/media/Show/ep01.en.srt")));
        assert!(!files.is_subtitle(Path::new("/media/Show/README")));
        assert!(files.is_extras_folder("Trailers"));
        assert!(!files.is_extras_folder("Season 01"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() -> anyhow::Result<()> {
        let config: OverlayConfig = serde_json::from_str(
            r#"{
                "extras": { "credits_as_special_features": true },
                "logging": { "format": "json" },
                "libraries": [
                    { "id": "anime", "overlay_root": "/vfs/anime", "source_roots": ["/media/anime"] }
                ]
            }"#,
        )?;
        assert!(config.extras.credits_as_theme_videos);
        assert!(config.extras.credits_as_special_features);
        assert_eq!(config.logging.format, Some(LogFormat::Json));
        assert_eq!(config.logging.level, "info");

        let library = config
            .library("anime")
            .ok_or_else(|| anyhow::anyhow!("library missing"))?;
        assert_eq!(library.collection_type, CollectionType::Mixed);
        assert!(library.contains_source(Path::new("/media/anime/Show/ep01.mkv")));
        assert!(!library.contains_source(Path::new("/media/other/ep01.mkv")));
        assert!(
            config
                .library_for_overlay_path(Path::new("/vfs/anime/Demo [sid=1]"))
                .is_some()
        );
        Ok(())
    }
}
