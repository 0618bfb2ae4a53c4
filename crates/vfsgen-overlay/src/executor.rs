//! Realise planned links on disk.
//!
//! # Design
//! - One blocking task per link, bounded by a semaphore sized from `threads`.
//! - Each task reports its own outcome; the caller folds outcomes into a fresh
//!   [`LinkGenerationResult`] once every task joined.
//! - Per-link I/O failures are logged and left uncounted. A platform that
//!   refuses symbolic links fails the whole batch.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::{OverlayError, OverlayResult};
use crate::identity::{IdentityLookup, LinkIdentity};
use crate::model::{LinkAction, PlannedLink};
use crate::result::LinkGenerationResult;

/// Bounded link executor.
#[derive(Clone)]
pub struct LinkExecutor {
    limit: Arc<Semaphore>,
    lookup: IdentityLookup,
}

impl LinkExecutor {
    /// Build an executor running at most `threads` link operations at once.
    #[must_use]
    pub fn new(threads: usize, lookup: IdentityLookup) -> Self {
        Self {
            limit: Arc::new(Semaphore::new(threads.max(1))),
            lookup,
        }
    }

    /// Make every planned link exist and point at its source.
    ///
    /// Every planned target is reported in the result's path set, whether or
    /// not placing it succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::SymlinkUnsupported`] when the platform refuses
    /// to create links and [`OverlayError::Join`] when a worker panics.
    pub async fn apply(&self, links: Vec<PlannedLink>) -> OverlayResult<LinkGenerationResult> {
        let mut result = LinkGenerationResult::default();
        let mut workers = JoinSet::new();

        for link in links {
            result.paths.insert(link.target.clone());
            let permit = Arc::clone(&self.limit)
                .acquire_owned()
                .await
                .map_err(|_| OverlayError::ExecutorClosed)?;
            workers.spawn_blocking(move || {
                let _permit = permit;
                let outcome = realize_link(&link);
                (link, outcome)
            });
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            let (link, outcome) = match joined {
                Ok(done) => done,
                Err(err) => {
                    failure.get_or_insert(OverlayError::join("link.realize", err));
                    continue;
                }
            };
            match outcome {
                Ok(action) => {
                    result.record(link.kind, action);
                    self.lookup.insert(
                        link.target,
                        LinkIdentity {
                            series_id: link.series_id,
                            file_id: link.file_id,
                            episode_ids: link.episode_ids,
                        },
                    );
                }
                Err(err) if err.kind() == ErrorKind::Unsupported => {
                    workers.abort_all();
                    failure.get_or_insert(OverlayError::SymlinkUnsupported {
                        path: link.target,
                        source: err,
                    });
                }
                Err(err) => {
                    error!(
                        link = %link.target.display(),
                        target = %link.source.display(),
                        error = %err,
                        "failed to place symbolic link"
                    );
                }
            }
        }

        failure.map_or(Ok(result), Err)
    }
}

/// Create, repair, or keep one link.
fn realize_link(link: &PlannedLink) -> io::Result<LinkAction> {
    if let Some(parent) = link.target.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::symlink_metadata(&link.target) {
        Err(err) if err.kind() == ErrorKind::NotFound => match create_symlink(&link.source, &link.target) {
            Ok(()) => {
                debug!(link = %link.target.display(), target = %link.source.display(), "linked");
                Ok(LinkAction::Created)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => reconcile_existing(link),
            Err(err) => Err(err),
        },
        Err(err) => Err(err),
        Ok(_) => reconcile_existing(link),
    }
}

fn reconcile_existing(link: &PlannedLink) -> io::Result<LinkAction> {
    if points_to(&link.target, &link.source) {
        return Ok(LinkAction::Skipped);
    }
    warn!(
        link = %link.target.display(),
        target = %link.source.display(),
        "fixing broken symbolic link"
    );
    match fs::remove_file(&link.target) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    match create_symlink(&link.source, &link.target) {
        Ok(()) => Ok(LinkAction::Fixed),
        Err(err) if err.kind() == ErrorKind::AlreadyExists && points_to(&link.target, &link.source) => {
            Ok(LinkAction::Fixed)
        }
        Err(err) => Err(err),
    }
}

/// Whether `link` is a symbolic link resolving to `source`.
pub(crate) fn points_to(link: &Path, source: &Path) -> bool {
    fs::read_link(link).is_ok_and(|target| target == source)
}

/// Create a file symbolic link at `link` pointing at `source`.
pub(crate) fn create_symlink(source: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(source, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(source, link)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (source, link);
        Err(io::Error::from(ErrorKind::Unsupported))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vfsgen_test_support::{read_link, temp_dir, touch};

    use crate::model::LinkKind;

    fn planned(target: PathBuf, source: PathBuf, kind: LinkKind) -> PlannedLink {
        PlannedLink {
            target,
            source,
            kind,
            series_id: "200".to_string(),
            file_id: "10".to_string(),
            episode_ids: vec!["20".to_string()],
        }
    }

    #[tokio::test]
    async fn creates_then_skips_existing_links() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let source = dir.path().join("src/ep01.mkv");
        touch(&source, "video")?;
        let target = dir.path().join("vfs/Demo [sid=200]/Season 01/ep [sid=200] [fid=10].mkv");

        let lookup = IdentityLookup::new();
        let executor = LinkExecutor::new(2, lookup.clone());
        let first = executor
            .apply(vec![planned(target.clone(), source.clone(), LinkKind::Video)])
            .await?;
        assert_eq!(first.videos.created, 1);
        assert_eq!(read_link(&target), Some(source.clone()));
        assert!(first.paths.contains(&target));
        assert_eq!(
            lookup.get(&target).map(|identity| identity.file_id),
            Some("10".to_string())
        );

        let second = executor
            .apply(vec![planned(target.clone(), source, LinkKind::Video)])
            .await?;
        assert_eq!(second.videos.skipped, 1);
        assert_eq!(second.created() + second.fixed(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn repairs_links_to_the_wrong_source() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let old_source = dir.path().join("src/old.srt");
        let new_source = dir.path().join("src/new.srt");
        touch(&old_source, "old")?;
        touch(&new_source, "new")?;
        let target = dir.path().join("vfs/ep [sid=200] [fid=10].en.srt");
        fs::create_dir_all(dir.path().join("vfs"))?;
        create_symlink(&old_source, &target)?;

        let broken = dir.path().join("vfs/ep [sid=200] [fid=10].mkv");
        create_symlink(&dir.path().join("src/missing.mkv"), &broken)?;
        let video = dir.path().join("src/ep.mkv");
        touch(&video, "video")?;

        let executor = LinkExecutor::new(4, IdentityLookup::new());
        let result = executor
            .apply(vec![
                planned(target.clone(), new_source.clone(), LinkKind::Subtitle),
                planned(broken.clone(), video.clone(), LinkKind::Video),
            ])
            .await?;
        assert_eq!(result.subtitles.fixed, 1);
        assert_eq!(result.videos.fixed, 1);
        assert_eq!(read_link(&target), Some(new_source));
        assert_eq!(read_link(&broken), Some(video));
        Ok(())
    }

    #[tokio::test]
    async fn io_failures_are_not_counted() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let source = dir.path().join("src/ep01.mkv");
        touch(&source, "video")?;
        let blocker = dir.path().join("vfs/blocker");
        touch(&blocker, "a file where a folder should be")?;

        let good = dir.path().join("vfs/ok [sid=200] [fid=10].mkv");
        let bad = blocker.join("nested [sid=200] [fid=10].mkv");
        let executor = LinkExecutor::new(1, IdentityLookup::new());
        let result = executor
            .apply(vec![
                planned(bad.clone(), source.clone(), LinkKind::Video),
                planned(good.clone(), source, LinkKind::Video),
            ])
            .await?;
        assert_eq!(result.videos.created, 1);
        assert_eq!(result.total(), 1);
        assert!(result.paths.contains(&bad));
        assert!(read_link(&good).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_targets_settle_without_errors() -> anyhow::Result<()> {
        let dir = temp_dir()?;
        let source = dir.path().join("src/ep01.mkv");
        touch(&source, "video")?;
        let target = dir.path().join("vfs/ep [sid=200] [fid=10].mkv");

        let executor = LinkExecutor::new(8, IdentityLookup::new());
        let links = (0..8)
            .map(|_| planned(target.clone(), source.clone(), LinkKind::Video))
            .collect();
        let result = executor.apply(links).await?;
        assert_eq!(result.videos.total(), 8);
        assert!(result.videos.created >= 1);
        assert_eq!(result.videos.fixed, 0);
        assert_eq!(result.paths.len(), 1);
        Ok(())
    }
}
