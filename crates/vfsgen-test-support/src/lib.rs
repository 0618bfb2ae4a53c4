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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (temp trees and file helpers), mocks.rs (in-memory catalog).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{read_link, temp_dir, touch};
pub use mocks::{DemoLibrary, InMemoryCatalog};
