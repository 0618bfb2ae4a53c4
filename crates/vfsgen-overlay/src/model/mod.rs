//! Domain models for link planning and execution.
//!
//! # Design
//! - Keep planned work plain data so it can cross thread boundaries freely.
//! - Carry catalog identity alongside each link for the reverse lookup.

use std::path::PathBuf;

use serde::Serialize;

/// Category of an overlay entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Video file.
    Video,
    /// Subtitle sidecar.
    Subtitle,
    /// Metadata sidecar (`.nfo`).
    Nfo,
}

impl LinkKind {
    /// Label used in metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Subtitle => "subtitle",
            Self::Nfo => "nfo",
        }
    }
}

/// Outcome of realising or sweeping one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    /// A new link was placed.
    Created,
    /// An existing link pointed elsewhere and was replaced.
    Fixed,
    /// An existing link already pointed at the source.
    Skipped,
    /// A stale entry was deleted.
    Removed,
}

impl LinkAction {
    /// Label used in metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Fixed => "fixed",
            Self::Skipped => "skipped",
            Self::Removed => "removed",
        }
    }
}

/// A link the executor should make exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    /// Path of the link inside the overlay.
    pub target: PathBuf,
    /// Real file the link points at.
    pub source: PathBuf,
    /// Entry category.
    pub kind: LinkKind,
    /// Series the link was planned from.
    pub series_id: String,
    /// File the link was planned from.
    pub file_id: String,
    /// Episodes covered by the file.
    pub episode_ids: Vec<String>,
}
