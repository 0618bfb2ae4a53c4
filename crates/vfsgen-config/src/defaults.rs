//! Default values for configuration documents.
//!
//! # Design
//! - Centralize defaults so serde fallbacks and validation bounds stay consistent.

/// Default link executor concurrency.
pub(crate) const THREADS: usize = 4;
/// Upper bound for link executor concurrency.
pub(crate) const MAX_THREADS: usize = 64;
/// Default maximum length of a human-readable name component.
pub(crate) const NAME_CUTOFF: usize = 64;
/// Smallest accepted name cutoff.
pub(crate) const MIN_NAME_CUTOFF: usize = 8;
/// Default upper bound on cached scope entries.
pub(crate) const CACHE_MAX_ENTRIES: u64 = 10_000;
/// Default absolute cache lifetime in seconds.
pub(crate) const ABSOLUTE_TTL_SECS: u64 = 3_600;
/// Default sliding cache lifetime in seconds.
pub(crate) const SLIDING_TTL_SECS: u64 = 900;
/// Default log level directive.
pub(crate) const LOG_LEVEL: &str = "info";

pub(crate) const VIDEO_EXTENSIONS: &[&str] = &[
    ".mkv", ".mp4", ".m4v", ".avi", ".mov", ".webm", ".wmv", ".ts", ".m2ts", ".mpg", ".mpeg",
    ".flv", ".ogm", ".ogv",
];

pub(crate) const SUBTITLE_EXTENSIONS: &[&str] =
    &[".srt", ".ass", ".ssa", ".vtt", ".sub", ".sup", ".idx", ".smi"];

pub(crate) const FLAG_DELIMITERS: &[char] = &['.'];

/// Folder names that hold user-placed extras.
pub(crate) const EXTRAS_FOLDER_NAMES: &[&str] = &[
    "backdrops",
    "behind the scenes",
    "deleted scenes",
    "interviews",
    "scenes",
    "samples",
    "shorts",
    "featurettes",
    "clips",
    "other",
    "extras",
    "trailers",
];
