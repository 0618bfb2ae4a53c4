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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint that loads the overlay configuration and generates every
//! configured library once.

use vfsgen_app::{AppResult, run_app};

/// Runs one bulk generation pass and exits.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
