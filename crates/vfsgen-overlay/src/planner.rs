//! Translate catalog file triples into planned links.
//!
//! # Design
//! - Every failure to place a triple (missing season, show, file or episode,
//!   missing source, collection-type mismatch) skips that triple only.
//! - Human-readable name parts are sanitised and truncated before identifier
//!   tokens are appended, so truncation never touches the tokens.
//! - Sidecars (subtitles, `.nfo`) are discovered beside the source and linked
//!   beside every video target under the video's own base name.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};
use vfsgen_catalog::{
    CatalogClient, EpisodeInfo, ExtrasFolder, FileInfo, FileTriple, OrderingPolicy, SeasonInfo,
    ShowInfo,
};
use vfsgen_config::{CollectionType, DetailsConfig, FilesConfig, LibraryConfig, OverlayConfig};

use crate::identity::{EPISODE_KEY, FILE_KEY, SERIES_KEY, token};
use crate::model::{LinkKind, PlannedLink};
use crate::naming::{display_name, sanitize_component};
use crate::scope::season_folder;

/// Release group token used when the catalog has none.
const NO_GROUP: &str = "No Group";
/// File name used for the main video of a movie.
const MOVIE_NAME: &str = "Movie";

/// Naming and placement knobs for the planner.
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    /// Keep movie series out of `shows` libraries.
    pub separate_movies: bool,
    /// Keep non-movie series out of `movies` libraries.
    pub filter_movie_libraries: bool,
    /// Maximum length of human-readable name parts.
    pub name_cutoff: usize,
    /// Optional detail tokens.
    pub details: DetailsConfig,
    /// File classification lists.
    pub files: FilesConfig,
}

impl PlannerOptions {
    /// Extract planner options from the overlay configuration.
    #[must_use]
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            separate_movies: config.separate_movies,
            filter_movie_libraries: config.filter_movie_libraries,
            name_cutoff: config.name_cutoff,
            details: config.details,
            files: config.files.clone(),
        }
    }
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self::from_config(&OverlayConfig::default())
    }
}

/// A file found next to a source video.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Sidecar {
    path: PathBuf,
    suffix: String,
    kind: LinkKind,
}

/// Where one source file should appear.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Placement {
    folders: Vec<PathBuf>,
    stem: String,
    extension: String,
    episode_ids: Vec<String>,
}

/// Plans overlay links from catalog data.
pub struct LinkPlanner {
    catalog: Arc<dyn CatalogClient>,
    ordering: Arc<dyn OrderingPolicy>,
    options: PlannerOptions,
}

impl LinkPlanner {
    /// Build a planner over the given catalog and ordering policy.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        ordering: Arc<dyn OrderingPolicy>,
        options: PlannerOptions,
    ) -> Self {
        Self {
            catalog,
            ordering,
            options,
        }
    }

    /// Options the planner was built with.
    #[must_use]
    pub const fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Plan links for every triple, skipping the ones that cannot be placed.
    pub async fn plan(&self, library: &LibraryConfig, triples: &[FileTriple]) -> Vec<PlannedLink> {
        let mut links = Vec::new();
        for triple in triples {
            links.extend(self.plan_file(library, triple).await);
        }
        links
    }

    /// Plan the video and sidecar links for one triple.
    pub async fn plan_file(&self, library: &LibraryConfig, triple: &FileTriple) -> Vec<PlannedLink> {
        if !self.source_usable(library, &triple.source_location).await {
            return Vec::new();
        }
        let Some(placement) = self.place(library, triple).await else {
            return Vec::new();
        };
        let sidecars = self.sidecars(&triple.source_location).await;

        let link = |target: PathBuf, source: &Path, kind| PlannedLink {
            target,
            source: source.to_path_buf(),
            kind,
            series_id: triple.series_id.clone(),
            file_id: triple.file_id.clone(),
            episode_ids: placement.episode_ids.clone(),
        };

        let video_name = format!("{}{}", placement.stem, placement.extension);
        let mut links = Vec::with_capacity(placement.folders.len() * (1 + sidecars.len()));
        for folder in &placement.folders {
            links.push(link(
                folder.join(&video_name),
                &triple.source_location,
                LinkKind::Video,
            ));
            for sidecar in &sidecars {
                links.push(link(
                    folder.join(format!("{}{}", placement.stem, sidecar.suffix)),
                    &sidecar.path,
                    sidecar.kind,
                ));
            }
        }
        links
    }

    /// Drop cross-references of multi-series files to series whose show owns
    /// no single-series file in the same batch.
    pub async fn retain_unambiguous(&self, triples: Vec<FileTriple>) -> Vec<FileTriple> {
        let Some(keep) = self.unambiguous_mask(&triples).await else {
            return triples;
        };
        let before = triples.len();
        let retained: Vec<FileTriple> = triples
            .into_iter()
            .zip(keep)
            .filter_map(|(triple, keep)| keep.then_some(triple))
            .collect();
        debug!(
            dropped = before - retained.len(),
            "filtered ambiguous multi-series cross-references"
        );
        retained
    }

    async fn unambiguous_mask(&self, triples: &[FileTriple]) -> Option<Vec<bool>> {
        let mut series_per_file: HashMap<&str, HashSet<&str>> = HashMap::new();
        for triple in triples {
            series_per_file
                .entry(triple.file_id.as_str())
                .or_default()
                .insert(triple.series_id.as_str());
        }
        if series_per_file.values().all(|series| series.len() <= 1) {
            return None;
        }

        let mut show_ids: HashMap<&str, Option<String>> = HashMap::new();
        for series in series_per_file.values().flatten() {
            if !show_ids.contains_key(series) {
                let show = self.catalog.show_info(series).await.map(|show| show.id);
                show_ids.insert(*series, show);
            }
        }
        let owned_shows: HashSet<&str> = series_per_file
            .values()
            .filter(|series| series.len() == 1)
            .flatten()
            .filter_map(|series| show_of(&show_ids, series))
            .collect();

        Some(
            triples
                .iter()
                .map(|triple| {
                    series_per_file
                        .get(triple.file_id.as_str())
                        .is_none_or(|series| series.len() == 1)
                        || show_of(&show_ids, &triple.series_id)
                            .is_some_and(|show| owned_shows.contains(show))
                })
                .collect(),
        )
    }

    async fn source_usable(&self, library: &LibraryConfig, source: &Path) -> bool {
        if !library.source_roots.is_empty() && !library.contains_source(source) {
            trace!(source = %source.display(), "source outside library roots");
            return false;
        }
        if !self.options.files.is_video(source) {
            trace!(source = %source.display(), "source is not a video file");
            return false;
        }
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            debug!(source = %source.display(), "source missing on disk");
            return false;
        }
        true
    }

    async fn place(&self, library: &LibraryConfig, triple: &FileTriple) -> Option<Placement> {
        let Some(season) = self.catalog.season_info(&triple.series_id).await else {
            debug!(series_id = %triple.series_id, "series missing from catalog");
            return None;
        };

        let movie = season.is_movie();
        let excluded = match library.collection_type {
            CollectionType::Shows => movie && self.options.separate_movies,
            CollectionType::Movies => !movie && self.options.filter_movie_libraries,
            CollectionType::Mixed => false,
        };
        if excluded {
            trace!(
                series_id = %triple.series_id,
                collection_type = library.collection_type.as_str(),
                "series excluded by collection type"
            );
            return None;
        }

        let Some(show) = self.catalog.show_info(&triple.series_id).await else {
            debug!(series_id = %triple.series_id, "show missing from catalog");
            return None;
        };
        let Some(file) = self
            .catalog
            .file_info(&triple.file_id, &triple.series_id)
            .await
        else {
            debug!(file_id = %triple.file_id, series_id = %triple.series_id, "file missing from catalog");
            return None;
        };
        let Some(episode) = file.primary_episode() else {
            debug!(file_id = %triple.file_id, "file has no episodes");
            return None;
        };

        let naming = Naming::new(self, &show, &season, &file, episode)?;
        let extras = self.ordering.extras_folders(&file, &season);
        let root = &library.overlay_root;

        let (folders, name) = if movie && library.collection_type != CollectionType::Shows {
            naming.movie_layout(root, extras.as_deref(), episode)
        } else {
            naming.show_layout(root, extras.as_deref())
        };
        if folders.is_empty() {
            trace!(file_id = %triple.file_id, "extra is not linked anywhere");
            return None;
        }

        let mut stem = format!("{name} ");
        for detail in self.details(&file) {
            stem.push_str(&format!("[{detail}] "));
        }
        stem.push_str(&token(SERIES_KEY, &triple.series_id));
        stem.push(' ');
        stem.push_str(&token(FILE_KEY, &triple.file_id));

        let extension = triple
            .source_location
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or_else(String::new, |ext| format!(".{ext}"));

        Some(Placement {
            folders,
            stem,
            extension,
            episode_ids: file.episodes.iter().map(|e| e.id.clone()).collect(),
        })
    }

    fn details(&self, file: &FileInfo) -> Vec<String> {
        let mut details = Vec::new();
        if self.options.details.add_release_group {
            let group = file
                .release_group
                .as_deref()
                .map(sanitize_component)
                .filter(|group| !group.is_empty());
            details.push(group.unwrap_or_else(|| NO_GROUP.to_string()));
        }
        if self.options.details.add_resolution
            && let Some(resolution) = file
                .resolution
                .as_deref()
                .map(sanitize_component)
                .filter(|resolution| !resolution.is_empty())
        {
            details.push(resolution);
        }
        details
    }

    async fn sidecars(&self, source: &Path) -> Vec<Sidecar> {
        let (Some(dir), Some(source_stem)) = (
            source.parent(),
            source.file_stem().and_then(|stem| stem.to_str()),
        ) else {
            return Vec::new();
        };

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "failed to list source folder");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    debug!(dir = %dir.display(), error = %err, "failed to read source folder entry");
                    break;
                }
            };
            let path = entry.path();
            if path == source || entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
                continue;
            }
            if let Some(sidecar) = self.classify_sidecar(&path, source_stem) {
                found.push(sidecar);
            }
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }

    fn classify_sidecar(&self, path: &Path, source_stem: &str) -> Option<Sidecar> {
        let name = path.file_name()?.to_str()?;
        let stem = path.file_stem()?.to_str()?;
        let prefix = stem.get(..source_stem.len())?;
        if !prefix.eq_ignore_ascii_case(source_stem) {
            return None;
        }
        let suffix = name.get(source_stem.len()..)?.to_string();
        let rest = &stem[source_stem.len()..];

        if self.options.files.is_subtitle(path) {
            let delimited = rest
                .chars()
                .next()
                .is_none_or(|ch| self.options.files.flag_delimiters.contains(&ch));
            return delimited.then(|| Sidecar {
                path: path.to_path_buf(),
                suffix,
                kind: LinkKind::Subtitle,
            });
        }
        let is_nfo = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("nfo"));
        (is_nfo && rest.is_empty()).then(|| Sidecar {
            path: path.to_path_buf(),
            suffix,
            kind: LinkKind::Nfo,
        })
    }
}

fn show_of<'a>(show_ids: &'a HashMap<&str, Option<String>>, series: &str) -> Option<&'a str> {
    show_ids.get(series).and_then(Option::as_deref)
}

/// Names shared by both layouts for one file.
struct Naming<'a> {
    show: &'a ShowInfo,
    show_name: String,
    episode_name: String,
    episode_number: u32,
    season_number: u32,
    is_special: bool,
    part_suffix: String,
    season: &'a SeasonInfo,
}

impl<'a> Naming<'a> {
    fn new(
        planner: &LinkPlanner,
        show: &'a ShowInfo,
        season: &'a SeasonInfo,
        file: &FileInfo,
        episode: &EpisodeInfo,
    ) -> Option<Self> {
        let cutoff = planner.options.name_cutoff;
        let ordering = &planner.ordering;

        let Some(episode_number) = ordering.episode_number(show, season, episode) else {
            debug!(episode_id = %episode.id, "episode has no number in its season");
            return None;
        };
        let Some(season_number) = ordering.season_number(show, season, episode) else {
            debug!(series_id = %season.id, show_id = %show.id, "series has no season in its show");
            return None;
        };

        let show_name = Some(sanitize_component(&show.name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Series {}", show.id));
        let episode_title = episode
            .title
            .clone()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| format!("Episode {:?} {episode_number}", episode.episode_type));

        Some(Self {
            show,
            show_name: display_name(&show_name, cutoff),
            episode_name: display_name(&episode_title, cutoff),
            episode_number,
            season_number,
            is_special: ordering.is_special(show, season, episode),
            part_suffix: file
                .part
                .filter(|part| part.count > 1)
                .map_or_else(String::new, |part| format!(".pt{}", part.index)),
            season,
        })
    }

    fn movie_layout(
        self,
        root: &Path,
        extras: Option<&[ExtrasFolder]>,
        episode: &EpisodeInfo,
    ) -> (Vec<PathBuf>, String) {
        let movie_folder = |episode_id: &str| {
            root.join(format!(
                "{} {} {}",
                self.show_name,
                token(SERIES_KEY, &self.show.id),
                token(EPISODE_KEY, episode_id)
            ))
        };
        match extras {
            Some(extras) => {
                let folders = extras
                    .iter()
                    .flat_map(|extra| {
                        self.season
                            .main_episodes()
                            .map(move |main| movie_folder(&main.id).join(extra.as_str()))
                    })
                    .collect();
                (folders, self.episode_name)
            }
            None => (vec![movie_folder(&episode.id)], MOVIE_NAME.to_string()),
        }
    }

    fn show_layout(self, root: &Path, extras: Option<&[ExtrasFolder]>) -> (Vec<PathBuf>, String) {
        let show_folder = root.join(format!(
            "{} {}",
            self.show_name,
            token(SERIES_KEY, &self.show.id)
        ));
        let shown_season = if self.is_special { 0 } else { self.season_number };
        let season_dir = show_folder.join(season_folder(shown_season));

        match extras {
            Some(extras) => {
                let mut folders = Vec::new();
                for extra in extras {
                    folders.push(show_folder.join(extra.as_str()));
                    if self.season_number != 0 {
                        folders.push(season_dir.join(extra.as_str()));
                    }
                }
                (folders, self.episode_name)
            }
            None => {
                let name = format!(
                    "{} S{shown_season:02}E{:0width$}{}",
                    self.show_name,
                    self.episode_number,
                    self.part_suffix,
                    width = self.show.episode_padding
                );
                (vec![season_dir], name)
            }
        }
    }
}
