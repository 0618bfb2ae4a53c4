#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! vfsgen application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (environment, logging and service wiring),
//! `snapshot.rs` (JSON catalog snapshot), `error.rs` (application errors).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level errors.
pub mod error;
/// Catalog backed by a JSON snapshot file.
pub mod snapshot;

pub use bootstrap::{CONFIG_ENV, LibraryReport, run_app, run_pass};
pub use error::{AppError, AppResult};
pub use snapshot::SnapshotCatalog;
