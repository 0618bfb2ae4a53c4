//! Mergeable counters for a generation pass.
//!
//! # Design
//! - Workers return independent results; callers fold them with [`LinkGenerationResult::combine`].
//! - Combination sums every counter and unions the path sets, so it is associative
//!   and commutative with [`LinkGenerationResult::default`] as identity.

use std::collections::BTreeSet;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::model::{LinkAction, LinkKind};

/// Per-category action counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Links created.
    pub created: u64,
    /// Links repaired.
    pub fixed: u64,
    /// Links already correct.
    pub skipped: u64,
    /// Stale entries deleted.
    pub removed: u64,
}

impl Tally {
    /// Entries the pass kept (created, fixed or skipped).
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.created + self.fixed + self.skipped
    }

    /// Bump the counter for `action`.
    pub const fn record(&mut self, action: LinkAction) {
        match action {
            LinkAction::Created => self.created += 1,
            LinkAction::Fixed => self.fixed += 1,
            LinkAction::Skipped => self.skipped += 1,
            LinkAction::Removed => self.removed += 1,
        }
    }

    /// Count recorded for `action`.
    #[must_use]
    pub const fn get(&self, action: LinkAction) -> u64 {
        match action {
            LinkAction::Created => self.created,
            LinkAction::Fixed => self.fixed,
            LinkAction::Skipped => self.skipped,
            LinkAction::Removed => self.removed,
        }
    }
}

impl Add for Tally {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            created: self.created + rhs.created,
            fixed: self.fixed + rhs.fixed,
            skipped: self.skipped + rhs.skipped,
            removed: self.removed + rhs.removed,
        }
    }
}

/// Aggregate outcome of a generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkGenerationResult {
    /// Video link counters.
    pub videos: Tally,
    /// Subtitle link counters.
    pub subtitles: Tally,
    /// Metadata sidecar counters.
    pub nfos: Tally,
    /// Every overlay path the pass intends to keep.
    pub paths: BTreeSet<PathBuf>,
}

impl LinkGenerationResult {
    /// Merge two results.
    #[must_use]
    pub fn combine(mut self, other: Self) -> Self {
        self += other;
        self
    }

    /// Counters for one category.
    #[must_use]
    pub const fn tally(&self, kind: LinkKind) -> &Tally {
        match kind {
            LinkKind::Video => &self.videos,
            LinkKind::Subtitle => &self.subtitles,
            LinkKind::Nfo => &self.nfos,
        }
    }

    /// Mutable counters for one category.
    pub const fn tally_mut(&mut self, kind: LinkKind) -> &mut Tally {
        match kind {
            LinkKind::Video => &mut self.videos,
            LinkKind::Subtitle => &mut self.subtitles,
            LinkKind::Nfo => &mut self.nfos,
        }
    }

    /// Record one action for one category.
    pub const fn record(&mut self, kind: LinkKind, action: LinkAction) {
        self.tally_mut(kind).record(action);
    }

    fn sum_of(&self, pick: impl Fn(&Tally) -> u64) -> u64 {
        pick(&self.videos) + pick(&self.subtitles) + pick(&self.nfos)
    }

    /// Links created across all categories.
    #[must_use]
    pub fn created(&self) -> u64 {
        self.sum_of(|tally| tally.created)
    }

    /// Links repaired across all categories.
    #[must_use]
    pub fn fixed(&self) -> u64 {
        self.sum_of(|tally| tally.fixed)
    }

    /// Links left untouched across all categories.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.sum_of(|tally| tally.skipped)
    }

    /// Stale entries removed across all categories.
    #[must_use]
    pub fn removed(&self) -> u64 {
        self.sum_of(|tally| tally.removed)
    }

    /// Kept entries across all categories.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.sum_of(Tally::total)
    }

    /// Whether the pass left the overlay exactly as it found it.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.removed() == 0 && self.skipped() == self.total()
    }

    /// Emit the end-of-pass summary, at `debug` for no-op passes and `info` otherwise.
    pub fn log_summary(&self, path: &Path, elapsed: Duration) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        macro_rules! summary {
            ($level:ident) => {
                $level!(
                    path = %path.display(),
                    created_videos = self.videos.created,
                    fixed_videos = self.videos.fixed,
                    skipped_videos = self.videos.skipped,
                    removed_videos = self.videos.removed,
                    created_subtitles = self.subtitles.created,
                    fixed_subtitles = self.subtitles.fixed,
                    skipped_subtitles = self.subtitles.skipped,
                    removed_subtitles = self.subtitles.removed,
                    created_nfos = self.nfos.created,
                    fixed_nfos = self.nfos.fixed,
                    skipped_nfos = self.nfos.skipped,
                    removed_nfos = self.nfos.removed,
                    total = self.total(),
                    elapsed_ms,
                    "overlay generation finished"
                )
            };
        }
        if self.is_noop() {
            summary!(debug);
        } else {
            summary!(info);
        }
    }
}

impl AddAssign for LinkGenerationResult {
    fn add_assign(&mut self, rhs: Self) {
        self.videos = self.videos + rhs.videos;
        self.subtitles = self.subtitles + rhs.subtitles;
        self.nfos = self.nfos + rhs.nfos;
        self.paths.extend(rhs.paths);
    }
}

impl Add for LinkGenerationResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.combine(rhs)
    }
}

impl Sum for LinkGenerationResult {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::combine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seed: u64, paths: &[&str]) -> LinkGenerationResult {
        LinkGenerationResult {
            videos: Tally {
                created: seed,
                fixed: seed % 3,
                skipped: seed * 2,
                removed: 1,
            },
            subtitles: Tally {
                created: 0,
                fixed: seed,
                skipped: 4,
                removed: seed % 2,
            },
            nfos: Tally {
                removed: seed,
                ..Tally::default()
            },
            paths: paths.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn combine_is_associative_and_commutative() {
        let a = sample(1, &["/vfs/a.mkv", "/vfs/shared.mkv"]);
        let b = sample(5, &["/vfs/b.mkv"]);
        let c = sample(8, &["/vfs/c.mkv", "/vfs/shared.mkv"]);

        let left = (a.clone() + b.clone()) + c.clone();
        let right = a.clone() + (b.clone() + c.clone());
        assert_eq!(left, right);
        assert_eq!(c.clone() + a.clone() + b.clone(), left);

        let union: BTreeSet<PathBuf> = a
            .paths
            .iter()
            .chain(&b.paths)
            .chain(&c.paths)
            .cloned()
            .collect();
        assert_eq!(left.paths, union);
        assert_eq!(left.paths.len(), 4);
    }

    #[test]
    fn default_is_identity() {
        let a = sample(3, &["/vfs/a.mkv"]);
        assert_eq!(a.clone() + LinkGenerationResult::default(), a);
        assert_eq!(LinkGenerationResult::default() + a.clone(), a);
        let summed: LinkGenerationResult = vec![a.clone()].into_iter().sum();
        assert_eq!(summed, a);
    }

    #[test]
    fn totals_span_categories() {
        let mut result = LinkGenerationResult::default();
        result.record(LinkKind::Video, LinkAction::Created);
        result.record(LinkKind::Video, LinkAction::Skipped);
        result.record(LinkKind::Subtitle, LinkAction::Fixed);
        result.record(LinkKind::Nfo, LinkAction::Removed);

        assert_eq!(result.created(), 1);
        assert_eq!(result.fixed(), 1);
        assert_eq!(result.skipped(), 1);
        assert_eq!(result.removed(), 1);
        assert_eq!(result.total(), 3);
        assert_eq!(result.tally(LinkKind::Nfo).get(LinkAction::Removed), 1);
        assert!(!result.is_noop());
    }

    #[test]
    fn noop_detection() {
        let mut result = LinkGenerationResult::default();
        assert!(result.is_noop());
        result.record(LinkKind::Video, LinkAction::Skipped);
        result.record(LinkKind::Subtitle, LinkAction::Skipped);
        assert!(result.is_noop());
        result.log_summary(Path::new("/vfs"), Duration::from_millis(3));
    }
}
