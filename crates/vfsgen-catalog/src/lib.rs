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

//! Catalog-facing interfaces consumed by the overlay generator.
//!
//! Layout: `model/` (catalog DTOs and scopes), `ordering.rs` (season/episode
//! placement and extras classification), `service/` (the `CatalogClient` trait).

pub mod error;
pub mod model;
pub mod ordering;
pub mod service;

pub use error::{CatalogError, CatalogResult};
pub use model::{
    EpisodeInfo, EpisodeType, ExtraType, FileInfo, FilePart, FileTriple, Scope, ScopeRequest,
    SeasonInfo, SeriesType, ShowInfo, ShowSeason,
};
pub use ordering::{DefaultOrdering, ExtrasFolder, ExtrasPreferences, OrderingPolicy};
pub use service::CatalogClient;
