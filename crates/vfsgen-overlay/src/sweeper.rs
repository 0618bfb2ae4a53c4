//! Remove overlay entries the latest pass did not produce.
//!
//! # Design
//! - Only video, subtitle and `.nfo` files are considered; anything else under
//!   the overlay is left alone.
//! - Stale subtitles that a player dropped beside a still-valid video link are
//!   moved next to the real video and linked back instead of being deleted.
//! - Unidentified videos inside extras folders belong to the user and are skipped.
//! - Folders emptied by the sweep are pruned deepest first, never past the
//!   swept root and never the overlay root itself.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use vfsgen_config::FilesConfig;
use walkdir::WalkDir;

use crate::error::{OverlayError, OverlayResult};
use crate::executor::create_symlink;
use crate::identity::{IdentityLookup, decode_identity};
use crate::model::{LinkAction, LinkKind};
use crate::result::LinkGenerationResult;

/// Kept video links keyed by the `(series_id, file_id)` in their names.
type VideoIndex<'a> = HashMap<(String, String), Vec<&'a Path>>;

/// Deletes orphaned overlay entries under a scope root.
#[derive(Debug, Clone)]
pub struct ReconciliationSweeper {
    overlay_root: PathBuf,
    files: FilesConfig,
    lookup: IdentityLookup,
}

impl ReconciliationSweeper {
    /// Build a sweeper for one library overlay.
    #[must_use]
    pub const fn new(overlay_root: PathBuf, files: FilesConfig, lookup: IdentityLookup) -> Self {
        Self {
            overlay_root,
            files,
            lookup,
        }
    }

    /// Remove every media entry under `scope_root` that is not in `known`.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Walkdir`] when `scope_root` exists but cannot be
    /// listed. Failures on individual entries are logged and skipped.
    pub fn clean(
        &self,
        scope_root: &Path,
        known: &BTreeSet<PathBuf>,
    ) -> OverlayResult<LinkGenerationResult> {
        let mut result = LinkGenerationResult::default();
        if !scope_root.is_dir() {
            return Ok(result);
        }

        let mut removed = Vec::new();
        let mut videos = None;
        for (path, kind) in self.stale_entries(scope_root, known)? {
            match kind {
                LinkKind::Nfo => {}
                LinkKind::Subtitle => {
                    let videos = videos.get_or_insert_with(|| self.video_index(known));
                    if self.relink_subtitle(&path, videos) {
                        result.record(LinkKind::Subtitle, LinkAction::Fixed);
                        result.paths.insert(path);
                        continue;
                    }
                }
                LinkKind::Video => {
                    if self.is_user_extra(&path) {
                        debug!(path = %path.display(), "keeping unidentified video in extras folder");
                        result.record(LinkKind::Video, LinkAction::Skipped);
                        continue;
                    }
                }
            }
            if self.remove_entry(&path) {
                result.record(kind, LinkAction::Removed);
                removed.push(path);
            }
        }

        self.prune_directories(scope_root, &removed);
        Ok(result)
    }

    fn stale_entries(
        &self,
        scope_root: &Path,
        known: &BTreeSet<PathBuf>,
    ) -> OverlayResult<Vec<(PathBuf, LinkKind)>> {
        let mut stale = Vec::new();
        for entry in WalkDir::new(scope_root).follow_links(false).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(OverlayError::walkdir("sweep.walk", scope_root, err));
                }
                Err(err) => {
                    warn!(root = %scope_root.display(), error = %err, "skipping unreadable overlay entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();
            let Some(kind) = self.classify(path) else {
                continue;
            };
            if !known.contains(path) {
                stale.push((path.to_path_buf(), kind));
            }
        }
        Ok(stale)
    }

    fn classify(&self, path: &Path) -> Option<LinkKind> {
        if self.files.is_video(path) {
            Some(LinkKind::Video)
        } else if self.files.is_subtitle(path) {
            Some(LinkKind::Subtitle)
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("nfo"))
        {
            Some(LinkKind::Nfo)
        } else {
            None
        }
    }

    fn video_index<'a>(&self, known: &'a BTreeSet<PathBuf>) -> VideoIndex<'a> {
        let mut index = VideoIndex::new();
        for path in known.iter().filter(|path| self.files.is_video(path)) {
            if let Some(identity) = decode_identity(path) {
                index.entry(identity).or_default().push(path);
            }
        }
        index
    }

    /// Move a real subtitle file beside the real video of a kept link and link it back.
    fn relink_subtitle(&self, path: &Path, videos: &VideoIndex<'_>) -> bool {
        let is_real_file = fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_file());
        if !is_real_file {
            return false;
        }
        let Some(candidates) = decode_identity(path).and_then(|identity| videos.get(&identity)) else {
            return false;
        };
        let Some((video_link, extension)) = candidates.iter().find_map(|candidate| {
            let stem = candidate.with_extension("");
            let extension = path.to_str()?.strip_prefix(stem.to_str()?)?.to_string();
            Some((*candidate, extension))
        }) else {
            return false;
        };

        let Ok(real_video) = fs::read_link(video_link) else {
            return false;
        };
        let mut real_subtitle = OsString::from(real_video.with_extension(""));
        real_subtitle.push(&extension);
        let real_subtitle = PathBuf::from(real_subtitle);

        let placed = if real_subtitle.exists() {
            fs::remove_file(path)
        } else {
            fs::rename(path, &real_subtitle).or_else(|_| {
                fs::copy(path, &real_subtitle)?;
                fs::remove_file(path)
            })
        };
        if let Err(err) = placed.and_then(|()| create_symlink(&real_subtitle, path)) {
            warn!(
                path = %path.display(),
                target = %real_subtitle.display(),
                error = %err,
                "failed to move subtitle beside its video"
            );
            return false;
        }

        info!(
            path = %path.display(),
            target = %real_subtitle.display(),
            "moved subtitle beside its video"
        );
        if let Some(identity) = self.lookup.get(video_link) {
            self.lookup.insert(path.to_path_buf(), identity);
        }
        true
    }

    fn is_user_extra(&self, path: &Path) -> bool {
        let Some(parents) = path
            .strip_prefix(&self.overlay_root)
            .ok()
            .and_then(Path::parent)
        else {
            return false;
        };
        let folders: Vec<_> = parents.iter().collect();
        folders.len() > 1
            && folders
                .last()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.files.is_extras_folder(name))
            && decode_identity(path).is_none()
    }

    fn remove_entry(&self, path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed stale overlay entry");
                self.lookup.remove(path);
                true
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.lookup.remove(path);
                false
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove stale overlay entry");
                false
            }
        }
    }

    fn prune_directories(&self, scope_root: &Path, removed: &[PathBuf]) {
        let mut candidates: HashSet<&Path> = HashSet::new();
        for path in removed {
            for dir in path.ancestors().skip(1) {
                if !dir.starts_with(scope_root) || dir == self.overlay_root {
                    break;
                }
                candidates.insert(dir);
            }
        }

        let mut candidates: Vec<&Path> = candidates.into_iter().collect();
        candidates.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        for dir in candidates {
            let empty = fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none());
            if !empty {
                continue;
            }
            match fs::remove_dir(dir) {
                Ok(()) => debug!(dir = %dir.display(), "removed empty overlay folder"),
                Err(err) => debug!(dir = %dir.display(), error = %err, "failed to remove empty overlay folder"),
            }
        }
    }
}
