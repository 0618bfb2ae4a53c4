//! Season/episode placement and extras classification.
//!
//! # Design
//! - Placement is policy: the overlay asks an [`OrderingPolicy`] and never decides numbering itself.
//! - [`DefaultOrdering`] numbers specials and extras by their position inside the owning series.

use serde::{Deserialize, Serialize};

use crate::model::{EpisodeInfo, EpisodeType, ExtraType, FileInfo, SeasonInfo, ShowInfo};

/// Named sub-folders extras are redirected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrasFolder {
    /// `trailers`
    Trailers,
    /// `behind the scenes`
    BehindTheScenes,
    /// `interviews`
    Interviews,
    /// `clips`
    Clips,
    /// `deleted scenes`
    DeletedScenes,
    /// `scenes`
    Scenes,
    /// `samples`
    Samples,
    /// `theme-music`
    ThemeMusic,
    /// `backdrops`
    Backdrops,
    /// `extras`
    Extras,
}

impl ExtrasFolder {
    /// Folder name as written to disk.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trailers => "trailers",
            Self::BehindTheScenes => "behind the scenes",
            Self::Interviews => "interviews",
            Self::Clips => "clips",
            Self::DeletedScenes => "deleted scenes",
            Self::Scenes => "scenes",
            Self::Samples => "samples",
            Self::ThemeMusic => "theme-music",
            Self::Backdrops => "backdrops",
            Self::Extras => "extras",
        }
    }
}

/// Toggles that shape where extras end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtrasPreferences {
    /// Link trailers into `trailers`.
    pub add_trailers: bool,
    /// Link theme videos into `backdrops`.
    pub credits_as_theme_videos: bool,
    /// Link theme videos into `extras`.
    pub credits_as_special_features: bool,
}

impl Default for ExtrasPreferences {
    fn default() -> Self {
        Self {
            add_trailers: true,
            credits_as_theme_videos: true,
            credits_as_special_features: false,
        }
    }
}

/// Decides season/episode numbering and extras placement.
pub trait OrderingPolicy: Send + Sync {
    /// Season number for an episode, or `None` when the series is not part of the show.
    fn season_number(&self, show: &ShowInfo, season: &SeasonInfo, episode: &EpisodeInfo)
    -> Option<u32>;

    /// In-season episode number, or `None` when the episode is not part of the series.
    fn episode_number(
        &self,
        show: &ShowInfo,
        season: &SeasonInfo,
        episode: &EpisodeInfo,
    ) -> Option<u32>;

    /// Whether the episode is placed in `Season 00`.
    fn is_special(&self, show: &ShowInfo, season: &SeasonInfo, episode: &EpisodeInfo) -> bool;

    /// Extras folders for a file.
    ///
    /// `None` means regular content. `Some(vec![])` means the file is an extra
    /// that is not linked anywhere.
    fn extras_folders(&self, file: &FileInfo, season: &SeasonInfo) -> Option<Vec<ExtrasFolder>>;
}

/// Stock ordering policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOrdering {
    preferences: ExtrasPreferences,
}

impl DefaultOrdering {
    /// Build the policy with the given extras preferences.
    #[must_use]
    pub const fn new(preferences: ExtrasPreferences) -> Self {
        Self { preferences }
    }

    fn position<'a>(
        mut episodes: impl Iterator<Item = &'a EpisodeInfo>,
        episode: &EpisodeInfo,
    ) -> Option<u32> {
        episodes
            .position(|candidate| candidate.id == episode.id)
            .and_then(|index| u32::try_from(index + 1).ok())
    }
}

impl OrderingPolicy for DefaultOrdering {
    fn season_number(
        &self,
        show: &ShowInfo,
        season: &SeasonInfo,
        episode: &EpisodeInfo,
    ) -> Option<u32> {
        let base = show.season_base(&season.id)?;
        Some(match episode.episode_type {
            EpisodeType::Other => base + 1,
            _ => base,
        })
    }

    fn episode_number(
        &self,
        _show: &ShowInfo,
        season: &SeasonInfo,
        episode: &EpisodeInfo,
    ) -> Option<u32> {
        if episode.extra_kind().is_some() {
            return Self::position(season.extras(), episode);
        }
        if episode.episode_type == EpisodeType::Special {
            return Self::position(season.specials(), episode);
        }
        Some(episode.number)
    }

    fn is_special(&self, _show: &ShowInfo, _season: &SeasonInfo, episode: &EpisodeInfo) -> bool {
        episode.episode_type == EpisodeType::Special && episode.extra_kind().is_none()
    }

    fn extras_folders(&self, file: &FileInfo, season: &SeasonInfo) -> Option<Vec<ExtrasFolder>> {
        let is_extra = file
            .episodes
            .iter()
            .any(|episode| season.is_extra_episode(episode));
        let extra_type = file
            .extra_type
            .or_else(|| file.primary_episode().and_then(EpisodeInfo::extra_kind));

        let Some(extra_type) = extra_type else {
            return is_extra.then(|| vec![ExtrasFolder::Extras]);
        };

        let prefs = self.preferences;
        Some(match extra_type {
            ExtraType::ThemeSong => vec![ExtrasFolder::ThemeMusic],
            ExtraType::ThemeVideo => {
                let mut folders = Vec::new();
                if prefs.credits_as_theme_videos {
                    folders.push(ExtrasFolder::Backdrops);
                }
                if prefs.credits_as_special_features {
                    folders.push(ExtrasFolder::Extras);
                }
                folders
            }
            ExtraType::Trailer if prefs.add_trailers => vec![ExtrasFolder::Trailers],
            ExtraType::Trailer => Vec::new(),
            ExtraType::BehindTheScenes => vec![ExtrasFolder::BehindTheScenes],
            ExtraType::DeletedScene => vec![ExtrasFolder::DeletedScenes],
            ExtraType::Clip => vec![ExtrasFolder::Clips],
            ExtraType::Interview => vec![ExtrasFolder::Interviews],
            ExtraType::Scene => vec![ExtrasFolder::Scenes],
            ExtraType::Sample => vec![ExtrasFolder::Samples],
            ExtraType::Unknown => vec![ExtrasFolder::Extras],
        })
    }
}

/// Derive an extra classification from the raw episode type and title.
#[must_use]
pub fn classify_extra(episode_type: EpisodeType, title: Option<&str>) -> Option<ExtraType> {
    match episode_type {
        EpisodeType::Normal | EpisodeType::Other | EpisodeType::Unknown => None,
        EpisodeType::ThemeSong | EpisodeType::OpeningSong | EpisodeType::EndingSong => {
            Some(ExtraType::ThemeVideo)
        }
        EpisodeType::Trailer => Some(ExtraType::Trailer),
        EpisodeType::Special => {
            let title = title?.to_lowercase();
            if title.contains("interview") {
                Some(ExtraType::Interview)
            } else if title.starts_with("cinema ")
                && (title.contains("intro") || title.contains("outro"))
            {
                Some(ExtraType::Clip)
            } else if title.contains("music video") {
                Some(ExtraType::ThemeVideo)
            } else if title.contains("making of")
                || title.contains("music in")
                || title.contains("advance screening")
            {
                Some(ExtraType::BehindTheScenes)
            } else {
                None
            }
        }
        EpisodeType::Parody => Some(ExtraType::Unknown),
    }
}
