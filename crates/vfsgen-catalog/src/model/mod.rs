//! Catalog DTOs shared between catalog clients and the overlay generator.
//!
//! # Design
//! - Keep records plain and serialisable so snapshots and fakes can build them directly.
//! - Identifiers stay opaque strings; the overlay never interprets them beyond equality.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ordering::classify_extra;

/// A physical file the catalog cross-references to a series and its episodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileTriple {
    /// Absolute location of the real file on disk.
    pub source_location: PathBuf,
    /// Catalog identifier of the file.
    pub file_id: String,
    /// Catalog identifier of the series the file is linked under.
    pub series_id: String,
    /// Episodes of that series the file covers.
    #[serde(default)]
    pub episode_ids: Vec<String>,
}

/// Kind of series as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeriesType {
    /// Regular television series.
    #[default]
    Tv,
    /// Theatrical or direct-to-video movie.
    Movie,
    /// Original video animation.
    Ova,
    /// Web release.
    Web,
    /// TV special.
    TvSpecial,
    /// Anything else.
    Other,
}

/// Raw episode type as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeType {
    /// Regular episode.
    #[default]
    Normal,
    /// Special episode.
    Special,
    /// Episode belonging to the following season.
    Other,
    /// Opening or ending theme.
    ThemeSong,
    /// Opening song.
    OpeningSong,
    /// Ending song.
    EndingSong,
    /// Trailer or promotional video.
    Trailer,
    /// Parody episode.
    Parody,
    /// Type not known to the catalog.
    Unknown,
}

/// Classification of non-regular ("extra") content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraType {
    /// Theme song audio.
    ThemeSong,
    /// Theme video (openings, endings, music videos).
    ThemeVideo,
    /// Trailer.
    Trailer,
    /// Behind-the-scenes material.
    BehindTheScenes,
    /// Deleted scene.
    DeletedScene,
    /// Short clip.
    Clip,
    /// Interview.
    Interview,
    /// Standalone scene.
    Scene,
    /// Sample.
    Sample,
    /// Extra of an unrecognised kind.
    Unknown,
}

/// Episode metadata needed for placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    /// Catalog identifier of the episode.
    pub id: String,
    /// Raw episode type.
    #[serde(default)]
    pub episode_type: EpisodeType,
    /// Episode number within its type.
    pub number: u32,
    /// Preferred (English) title, if any.
    #[serde(default)]
    pub title: Option<String>,
    /// Explicit extra classification assigned by the catalog.
    #[serde(default)]
    pub extra_type: Option<ExtraType>,
}

impl EpisodeInfo {
    /// Extra classification, falling back to a heuristic on the raw type and title.
    #[must_use]
    pub fn extra_kind(&self) -> Option<ExtraType> {
        self.extra_type
            .or_else(|| classify_extra(self.episode_type, self.title.as_deref()))
    }
}

/// A catalog series, which the overlay places as one season of a show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonInfo {
    /// Catalog identifier of the series.
    pub id: String,
    /// Display title of the series.
    pub title: String,
    /// Series kind.
    #[serde(default)]
    pub series_type: SeriesType,
    /// All episodes known for the series.
    #[serde(default)]
    pub episodes: Vec<EpisodeInfo>,
}

impl SeasonInfo {
    /// Whether the series is a movie.
    #[must_use]
    pub fn is_movie(&self) -> bool {
        self.series_type == SeriesType::Movie
    }

    /// Whether the given episode is considered extra content in this season.
    #[must_use]
    pub fn is_extra_episode(&self, episode: &EpisodeInfo) -> bool {
        episode.extra_kind().is_some()
    }

    /// Whether any of `episode_ids` names extra content of this season.
    #[must_use]
    pub fn has_extra(&self, episode_ids: &[String]) -> bool {
        self.extras().any(|episode| episode_ids.contains(&episode.id))
    }

    /// Regular episodes, in catalog order.
    pub fn main_episodes(&self) -> impl Iterator<Item = &EpisodeInfo> {
        self.episodes.iter().filter(|episode| {
            matches!(
                episode.episode_type,
                EpisodeType::Normal | EpisodeType::Other
            ) && episode.extra_kind().is_none()
        })
    }

    /// Special episodes that are not extras, in catalog order.
    pub fn specials(&self) -> impl Iterator<Item = &EpisodeInfo> {
        self.episodes.iter().filter(|episode| {
            episode.episode_type == EpisodeType::Special && episode.extra_kind().is_none()
        })
    }

    /// Extra episodes, in catalog order.
    pub fn extras(&self) -> impl Iterator<Item = &EpisodeInfo> {
        self.episodes
            .iter()
            .filter(|episode| episode.extra_kind().is_some())
    }
}

/// Placement of one series within a show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSeason {
    /// Catalog identifier of the series.
    pub series_id: String,
    /// Base season number assigned to the series.
    pub season_number: u32,
}

/// A show: one or more series presented together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowInfo {
    /// Identifier embedded in the show folder name.
    pub id: String,
    /// Display name of the show.
    pub name: String,
    /// Series that make up the show.
    #[serde(default)]
    pub seasons: Vec<ShowSeason>,
    /// Minimum digits used for episode numbers.
    #[serde(default = "default_episode_padding")]
    pub episode_padding: usize,
}

const fn default_episode_padding() -> usize {
    2
}

impl ShowInfo {
    /// Base season number for a series of this show.
    #[must_use]
    pub fn season_base(&self, series_id: &str) -> Option<u32> {
        self.seasons
            .iter()
            .find(|season| season.series_id == series_id)
            .map(|season| season.season_number)
    }

    /// Whether the series belongs to this show.
    #[must_use]
    pub fn owns(&self, series_id: &str) -> bool {
        self.season_base(series_id).is_some()
    }
}

/// Part of a multi-file episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePart {
    /// One-based index of this part.
    pub index: u32,
    /// Total number of parts.
    pub count: u32,
}

/// A file as seen from one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Catalog identifier of the file.
    pub id: String,
    /// Series the file is viewed through.
    pub series_id: String,
    /// Explicit extra classification for the whole file.
    #[serde(default)]
    pub extra_type: Option<ExtraType>,
    /// Episodes of the series covered by the file, first is primary.
    #[serde(default)]
    pub episodes: Vec<EpisodeInfo>,
    /// Release group name.
    #[serde(default)]
    pub release_group: Option<String>,
    /// Resolution label (e.g. `1080p`).
    #[serde(default)]
    pub resolution: Option<String>,
    /// Part information for split episodes.
    #[serde(default)]
    pub part: Option<FilePart>,
}

impl FileInfo {
    /// Primary episode of the file.
    #[must_use]
    pub fn primary_episode(&self) -> Option<&EpisodeInfo> {
        self.episodes.first()
    }
}

/// Subtree of a library that is generated as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// Every file in the library.
    Library,
    /// One show, optionally restricted to a season (`0` selects specials).
    Show {
        /// Show identifier from the folder name.
        series_id: String,
        /// Season number from the folder name.
        season: Option<u32>,
    },
    /// One movie and its extras.
    Movie {
        /// Show identifier from the folder name.
        series_id: String,
        /// Episode identifier from the folder name.
        episode_id: String,
    },
    /// A single file.
    Episode {
        /// Series identifier from the file name.
        series_id: String,
        /// File identifier from the file name.
        file_id: String,
    },
}

impl Scope {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Show { season: None, .. } => "show",
            Self::Show { season: Some(_), .. } => "season",
            Self::Movie { .. } => "movie",
            Self::Episode { .. } => "episode",
        }
    }

    /// Whether `triple` belongs to this scope.
    ///
    /// `show` owns the triple's series and `season` is that series. A movie
    /// scope also takes the extras of its series.
    #[must_use]
    pub fn contains(
        &self,
        triple: &FileTriple,
        show: Option<&ShowInfo>,
        season: Option<&SeasonInfo>,
    ) -> bool {
        let owned_by = |show_id: &str| show.is_some_and(|show| show.id == show_id);
        match self {
            Self::Library => true,
            Self::Show { series_id, .. } => owned_by(series_id),
            Self::Movie {
                series_id,
                episode_id,
            } => {
                owned_by(series_id)
                    && (triple.episode_ids.contains(episode_id)
                        || season.is_some_and(|season| season.has_extra(&triple.episode_ids)))
            }
            Self::Episode { series_id, file_id } => {
                triple.series_id == *series_id && triple.file_id == *file_id
            }
        }
    }
}

/// Request passed to [`crate::CatalogClient::files_for_scope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRequest {
    /// Library the scope belongs to.
    pub library_id: String,
    /// Source folders configured for the library.
    pub source_roots: Vec<PathBuf>,
    /// Scope to enumerate.
    pub scope: Scope,
}

impl ScopeRequest {
    /// Whether `source` lies under a configured source folder. Libraries
    /// without source folders accept every location.
    #[must_use]
    pub fn covers_source(&self, source: &Path) -> bool {
        self.source_roots.is_empty() || self.source_roots.iter().any(|root| source.starts_with(root))
    }

    /// Whether `triple` answers this request.
    #[must_use]
    pub fn matches(
        &self,
        triple: &FileTriple,
        show: Option<&ShowInfo>,
        season: Option<&SeasonInfo>,
    ) -> bool {
        self.covers_source(&triple.source_location) && self.scope.contains(triple, show, season)
    }
}
