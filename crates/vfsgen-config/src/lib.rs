#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, unused)]
#![allow(clippy::module_name_repetitions)]

//! File-backed configuration for the overlay generator.
//!
//! Layout: `model.rs` (typed config document), `validate.rs` (cross-field
//! validation), `loader.rs` (JSON file loading), `defaults.rs` (default values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_path, load_from_str};
pub use model::{
    CacheConfig, CollectionType, DetailsConfig, ExtrasConfig, FilesConfig, LibraryConfig,
    LogFormat, LoggingSection, OverlayConfig,
};
