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

//! Symbolic-link overlay generation.
//!
//! Layout: `cache.rs` (single-flight TTL path cache), `scope.rs` (overlay path to
//! scope mapping), `planner.rs` (catalog triples to planned links), `executor.rs`
//! (bounded link realisation), `sweeper.rs` (orphan removal), `result.rs`
//! (mergeable counters), `identity.rs` and `naming.rs` (path encoding), and
//! `service.rs` (the `OverlayService` facade).

pub mod cache;
pub mod error;
pub mod executor;
pub mod identity;
pub mod model;
pub mod naming;
pub mod planner;
pub mod result;
pub mod scope;
pub mod service;
pub mod sweeper;

pub use cache::PathCache;
pub use error::{OverlayError, OverlayResult};
pub use executor::LinkExecutor;
pub use identity::{IdentityLookup, LinkIdentity, decode_identity};
pub use model::{LinkAction, LinkKind, PlannedLink};
pub use planner::{LinkPlanner, PlannerOptions};
pub use result::{LinkGenerationResult, Tally};
pub use scope::{ResolvedScope, resolve_scope};
pub use service::{OverlayService, SymlinkFn};
pub use sweeper::ReconciliationSweeper;
