//! Mapping from query paths to generation scopes.
//!
//! A path inside a source root, or the overlay root itself, maps to the whole
//! library. Paths below the overlay root map by shape:
//!
//! - `<Show> [sid=S]` to the show, `<Movie> [sid=S] [eid=E]` to the movie
//! - `<Show> [sid=S]/Season NN` to one season
//! - `<Show>/Season NN/<file> [sid=S] [fid=F]` and `<Movie>/<file>` to one file
//!
//! Anything else has no scope and is never generated.

use std::path::{Component, Path, PathBuf};

use vfsgen_catalog::Scope;
use vfsgen_config::LibraryConfig;

use crate::identity::{EPISODE_KEY, FILE_KEY, SERIES_KEY, attribute};

/// A query path reduced to its generation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    /// Cache key the generation result is stored under.
    pub key: PathBuf,
    /// Scope handed to the catalog.
    pub scope: Scope,
    /// Directory swept after generation, `None` for single-file scopes.
    pub clean_root: Option<PathBuf>,
}

/// Resolve `path` against `library`, returning `None` for unrecognised shapes.
#[must_use]
pub fn resolve_scope(library: &LibraryConfig, path: &Path) -> Option<ResolvedScope> {
    let root = &library.overlay_root;
    if path == root.as_path() || library.contains_source(path) {
        return Some(ResolvedScope {
            key: root.clone(),
            scope: Scope::Library,
            clean_root: Some(root.clone()),
        });
    }

    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    let folder = segments.first()?;
    let series_id = attribute(folder, SERIES_KEY)?.to_string();
    let movie_episode = attribute(folder, EPISODE_KEY);

    let (scope, sweep) = match (segments.as_slice(), movie_episode) {
        ([_], Some(episode_id)) => (
            Scope::Movie {
                series_id,
                episode_id: episode_id.to_string(),
            },
            true,
        ),
        ([_], None) => (
            Scope::Show {
                series_id,
                season: None,
            },
            true,
        ),
        ([_, season], None) => (
            Scope::Show {
                series_id,
                season: Some(season_number(season)?),
            },
            true,
        ),
        ([_, file], Some(_)) | ([_, _, file], None) => {
            if let [_, season, _] = segments.as_slice() {
                season_number(season)?;
            }
            (file_scope(file)?, false)
        }
        _ => return None,
    };

    Some(ResolvedScope {
        key: path.to_path_buf(),
        scope,
        clean_root: sweep.then(|| path.to_path_buf()),
    })
}

fn file_scope(name: &str) -> Option<Scope> {
    Some(Scope::Episode {
        series_id: attribute(name, SERIES_KEY)?.to_string(),
        file_id: attribute(name, FILE_KEY)?.to_string(),
    })
}

/// Parse `Season NN` folder names.
#[must_use]
pub fn season_number(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("Season ")?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Render the folder name for a season number.
#[must_use]
pub fn season_folder(number: u32) -> String {
    format!("Season {number:02}")
}
