//! Resolver-facing overlay service.
//!
//! # Design
//! - `ensure_generated` is the single entry point used before trusting any
//!   overlay path: it maps the path to its scope, consults the path cache and
//!   runs at most one generation pass per scope key.
//! - A pass enumerates the scope through the catalog, plans and realises the
//!   links, then sweeps the scope folder once every link task has joined.
//! - Failed passes cache nothing, mark the service degraded and publish a
//!   failure event; the next successful pass marks it recovered.

use std::error::Error as StdError;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use dashmap::DashSet;
use tracing::{debug, error, info, trace, warn};
use vfsgen_catalog::{
    CatalogClient, DefaultOrdering, ExtrasPreferences, OrderingPolicy, Scope, ScopeRequest,
};
use vfsgen_config::{FilesConfig, LibraryConfig, OverlayConfig};
use vfsgen_events::{Event, EventBus};
use vfsgen_telemetry::Metrics;

use crate::cache::PathCache;
use crate::error::{OverlayError, OverlayResult};
use crate::executor::{LinkExecutor, create_symlink};
use crate::identity::{self, IdentityLookup, LinkIdentity};
use crate::model::{LinkAction, LinkKind};
use crate::planner::{LinkPlanner, PlannerOptions};
use crate::result::LinkGenerationResult;
use crate::scope::{ResolvedScope, resolve_scope};
use crate::sweeper::ReconciliationSweeper;

const HEALTH_COMPONENT: &str = "overlay";
const PROBE_NAME: &str = ".vfsgen-probe";

/// Creates a symbolic link at the second path resolving to the first.
pub type SymlinkFn = fn(&Path, &Path) -> io::Result<()>;

/// Generates and maintains symbolic-link overlays for the configured libraries.
#[derive(Clone)]
pub struct OverlayService {
    libraries: Arc<RwLock<Vec<LibraryConfig>>>,
    files: FilesConfig,
    catalog: Arc<dyn CatalogClient>,
    planner: Arc<LinkPlanner>,
    executor: LinkExecutor,
    cache: Arc<PathCache>,
    lookup: IdentityLookup,
    probed: Arc<DashSet<PathBuf>>,
    link_probe: SymlinkFn,
    events: EventBus,
    metrics: Metrics,
    health_degraded: Arc<Mutex<bool>>,
}

impl OverlayService {
    /// Build the service with the stock ordering policy.
    #[must_use]
    pub fn new(
        config: &OverlayConfig,
        catalog: Arc<dyn CatalogClient>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        let ordering = DefaultOrdering::new(ExtrasPreferences {
            add_trailers: config.extras.add_trailers,
            credits_as_theme_videos: config.extras.credits_as_theme_videos,
            credits_as_special_features: config.extras.credits_as_special_features,
        });
        let lookup = IdentityLookup::new();
        Self {
            libraries: Arc::new(RwLock::new(config.libraries.clone())),
            files: config.files.clone(),
            planner: Arc::new(LinkPlanner::new(
                Arc::clone(&catalog),
                Arc::new(ordering),
                PlannerOptions::from_config(config),
            )),
            catalog,
            executor: LinkExecutor::new(config.threads, lookup.clone()),
            cache: Arc::new(PathCache::new(
                config.cache.max_entries,
                config.cache.absolute_ttl(),
                config.cache.sliding_ttl(),
            )),
            lookup,
            probed: Arc::new(DashSet::new()),
            link_probe: create_symlink,
            events,
            metrics,
            health_degraded: Arc::new(Mutex::new(false)),
        }
    }

    /// Replace the ordering policy used for placement.
    #[must_use]
    pub fn with_ordering(mut self, ordering: Arc<dyn OrderingPolicy>) -> Self {
        let options = self.planner.options().clone();
        self.planner = Arc::new(LinkPlanner::new(
            Arc::clone(&self.catalog),
            ordering,
            options,
        ));
        self
    }

    /// Replace the link call used to check symbolic-link support.
    #[must_use]
    pub fn with_link_probe(mut self, probe: SymlinkFn) -> Self {
        self.link_probe = probe;
        self
    }

    /// Libraries currently served.
    #[must_use]
    pub fn libraries(&self) -> Vec<LibraryConfig> {
        self.read_libraries().clone()
    }

    /// Whether the last generation pass failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        *self.lock_health_flag()
    }

    /// Make sure the overlay scope containing `path` has been generated.
    ///
    /// Returns `false` for paths outside every library or whose shape maps to
    /// no scope; such answers are not cached. Concurrent callers for the same
    /// scope share one pass.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the generation pass; nothing is cached then,
    /// so a later call retries.
    pub async fn ensure_generated(&self, path: &Path) -> OverlayResult<bool> {
        let Some(library) = self.library_for(path) else {
            trace!(path = %path.display(), "path outside every library");
            return Ok(false);
        };

        if self.generated_ancestor(&library, path).await {
            self.metrics.inc_cache_lookup("hit");
            return Ok(true);
        }
        self.metrics.inc_cache_lookup("miss");

        let Some(scope) = resolve_scope(&library, path) else {
            trace!(path = %path.display(), "path maps to no scope");
            return Ok(false);
        };
        let (ready, _) = self
            .cache
            .get_or_try_insert_with(&scope.key, async {
                self.run_generation(&library, &scope).await.map(|_| true)
            })
            .await
            .map_err(OverlayError::shared)?;
        Ok(ready)
    }

    /// Run a generation pass for the scope of `path`, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::InvalidInput`] when `path` maps to no scope and
    /// propagates generation failures otherwise.
    pub async fn generate(&self, path: &Path) -> OverlayResult<LinkGenerationResult> {
        let library = self
            .library_for(path)
            .ok_or_else(|| unresolved_path("path", "outside every library", path))?;
        let scope = resolve_scope(&library, path)
            .ok_or_else(|| unresolved_path("path", "does not map to a scope", path))?;
        let result = self.run_generation(&library, &scope).await?;
        self.cache.insert(scope.key, true).await;
        Ok(result)
    }

    /// Recover `(series_id, file_id)` from an overlay path without I/O.
    #[must_use]
    pub fn decode_identity(path: &Path) -> Option<(String, String)> {
        identity::decode_identity(path)
    }

    /// Identity registered for a link placed by this service.
    #[must_use]
    pub fn lookup(&self, path: &Path) -> Option<LinkIdentity> {
        self.lookup.get(path)
    }

    /// Forget cached state for `path`.
    ///
    /// A source path invalidates its whole library; an overlay path drops the
    /// entries of its ancestors and descendants.
    pub async fn invalidate(&self, path: &Path) -> usize {
        let Some(library) = self.library_for(path) else {
            return 0;
        };
        let evicted = if library.contains_source(path) {
            self.cache.remove_prefix(&library.overlay_root).await
        } else {
            self.cache.invalidate_related(path).await
        };
        debug!(library = %library.id, path = %path.display(), evicted, "invalidated overlay cache");
        evicted
    }

    /// Drop every cache entry.
    pub async fn clear(&self) -> usize {
        let entries = self.cache.clear().await;
        info!(entries, "cleared overlay cache");
        self.publish_event(Event::CacheCleared { entries });
        entries
    }

    /// Stop serving a library and delete its overlay tree.
    ///
    /// Returns `false` when no library with `library_id` is configured.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Io`] when the overlay directory cannot be removed.
    pub async fn remove_library(&self, library_id: &str) -> OverlayResult<bool> {
        let removed = {
            let mut libraries = self.write_libraries();
            libraries
                .iter()
                .position(|library| library.id == library_id)
                .map(|index| libraries.remove(index))
        };
        let Some(library) = removed else {
            return Ok(false);
        };

        let root = library.overlay_root;
        let evicted = self.cache.remove_prefix(&root).await;
        let forgotten = self.lookup.remove_prefix(&root);
        self.probed.remove(&root);
        match tokio::fs::remove_dir_all(&root).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(OverlayError::io("library.remove", root, err)),
        }
        info!(
            library = library_id,
            root = %root.display(),
            evicted,
            forgotten,
            "removed library overlay"
        );
        self.publish_event(Event::LibraryRemoved {
            library_id: library_id.to_string(),
        });
        Ok(true)
    }

    async fn run_generation(
        &self,
        library: &LibraryConfig,
        scope: &ResolvedScope,
    ) -> OverlayResult<LinkGenerationResult> {
        let label = scope.scope.label();
        let started = Instant::now();
        debug!(
            library = %library.id,
            scope = label,
            path = %scope.key.display(),
            "overlay generation started"
        );
        self.publish_event(Event::GenerationStarted {
            library_id: library.id.clone(),
            scope: label.to_string(),
            path: scope.key.display().to_string(),
        });

        match self.generate_scope(library, scope).await {
            Ok(result) => {
                let elapsed = started.elapsed();
                result.log_summary(&scope.key, elapsed);
                self.mark_recovered();
                self.record_metrics(label, &result, elapsed);
                self.publish_event(Event::GenerationCompleted {
                    library_id: library.id.clone(),
                    scope: label.to_string(),
                    created: result.created(),
                    fixed: result.fixed(),
                    skipped: result.skipped(),
                    removed: result.removed(),
                    elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                });
                Ok(result)
            }
            Err(error) => {
                let detail = describe(&error);
                error!(
                    library = %library.id,
                    scope = label,
                    path = %scope.key.display(),
                    error = %detail,
                    "overlay generation failed"
                );
                self.mark_degraded(&detail);
                self.metrics.inc_generation(label, "failure");
                self.publish_event(Event::GenerationFailed {
                    library_id: library.id.clone(),
                    scope: label.to_string(),
                    message: detail,
                });
                Err(error)
            }
        }
    }

    async fn generate_scope(
        &self,
        library: &LibraryConfig,
        scope: &ResolvedScope,
    ) -> OverlayResult<LinkGenerationResult> {
        self.ensure_symlink_support(&library.overlay_root).await?;

        let request = ScopeRequest {
            library_id: library.id.clone(),
            source_roots: library.source_roots.clone(),
            scope: scope.scope.clone(),
        };
        let triples = self
            .catalog
            .files_for_scope(&request)
            .await
            .map_err(|source| OverlayError::Catalog {
                library_id: library.id.clone(),
                source,
            })?;
        let triples = if scope.scope == Scope::Library {
            self.planner.retain_unambiguous(triples).await
        } else {
            triples
        };

        let mut links = self.planner.plan(library, &triples).await;
        if let Some(root) = &scope.clean_root {
            links.retain(|link| link.target.starts_with(root));
        }
        let mut result = self.executor.apply(links).await?;

        if let Some(root) = scope.clean_root.clone() {
            let sweeper = ReconciliationSweeper::new(
                library.overlay_root.clone(),
                self.files.clone(),
                self.lookup.clone(),
            );
            let known = result.paths.clone();
            let swept = tokio::task::spawn_blocking(move || sweeper.clean(&root, &known))
                .await
                .map_err(|err| OverlayError::join("overlay.sweep", err))??;
            result += swept;
        }
        Ok(result)
    }

    /// Create and remove a probe link in `root` once per overlay root.
    async fn ensure_symlink_support(&self, root: &Path) -> OverlayResult<()> {
        if self.probed.contains(root) {
            return Ok(());
        }
        let owned = root.to_path_buf();
        let link = self.link_probe;
        tokio::task::spawn_blocking(move || probe_symlinks(&owned, link))
            .await
            .map_err(|err| OverlayError::join("overlay.probe", err))??;
        self.probed.insert(root.to_path_buf());
        Ok(())
    }

    fn record_metrics(&self, scope: &str, result: &LinkGenerationResult, elapsed: Duration) {
        self.metrics.inc_generation(scope, "success");
        self.metrics.observe_generation(elapsed);
        for kind in [LinkKind::Video, LinkKind::Subtitle, LinkKind::Nfo] {
            let tally = result.tally(kind);
            for action in [
                LinkAction::Created,
                LinkAction::Fixed,
                LinkAction::Skipped,
                LinkAction::Removed,
            ] {
                self.metrics
                    .add_links(kind.as_str(), action.as_str(), tally.get(action));
            }
        }
    }

    fn library_for(&self, path: &Path) -> Option<LibraryConfig> {
        self.read_libraries()
            .iter()
            .find(|library| path.starts_with(&library.overlay_root) || library.contains_source(path))
            .cloned()
    }

    /// Whether `path` or one of its ancestors up to the overlay root was generated.
    async fn generated_ancestor(&self, library: &LibraryConfig, path: &Path) -> bool {
        if library.contains_source(path) {
            return self.cache.get(&library.overlay_root).await.unwrap_or(false);
        }
        for ancestor in path.ancestors() {
            if self.cache.get(ancestor).await == Some(true) {
                return true;
            }
            if ancestor == library.overlay_root {
                break;
            }
        }
        false
    }

    fn publish_event(&self, event: Event) {
        self.events.publish(event);
    }

    fn mark_degraded(&self, detail: &str) {
        let mut guard = self.lock_health_flag();
        if *guard {
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "overlay generation still degraded"
            );
        } else {
            *guard = true;
            drop(guard);
            warn!(
                component = HEALTH_COMPONENT,
                detail = detail,
                "overlay generation degraded"
            );
            self.publish_event(Event::HealthChanged {
                degraded: vec![HEALTH_COMPONENT.to_string()],
            });
        }
    }

    fn mark_recovered(&self) {
        let mut guard = self.lock_health_flag();
        if std::mem::take(&mut *guard) {
            drop(guard);
            self.publish_event(Event::HealthChanged {
                degraded: Vec::new(),
            });
            info!(component = HEALTH_COMPONENT, "overlay generation recovered");
        }
    }

    fn lock_health_flag(&self) -> MutexGuard<'_, bool> {
        match self.health_degraded.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("overlay health mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    fn read_libraries(&self) -> RwLockReadGuard<'_, Vec<LibraryConfig>> {
        self.libraries.read().unwrap_or_else(|poisoned| {
            error!("overlay library list poisoned; continuing with recovered guard");
            poisoned.into_inner()
        })
    }

    fn write_libraries(&self) -> RwLockWriteGuard<'_, Vec<LibraryConfig>> {
        self.libraries.write().unwrap_or_else(|poisoned| {
            error!("overlay library list poisoned; continuing with recovered guard");
            poisoned.into_inner()
        })
    }
}

fn probe_symlinks(root: &Path, link: SymlinkFn) -> OverlayResult<()> {
    fs::create_dir_all(root).map_err(|err| OverlayError::io("probe.create_root", root, err))?;
    let probe = root.join(PROBE_NAME);
    match fs::remove_file(&probe) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(OverlayError::io("probe.clear", probe, err)),
    }
    match link(root, &probe) {
        Ok(()) => {}
        Err(err) if matches!(err.kind(), ErrorKind::Unsupported | ErrorKind::PermissionDenied) => {
            return Err(OverlayError::SymlinkUnsupported { path: probe, source: err });
        }
        Err(err) => return Err(OverlayError::io("probe.link", probe, err)),
    }
    fs::remove_file(&probe).map_err(|err| OverlayError::io("probe.remove", probe, err))
}

fn unresolved_path(field: &'static str, reason: &'static str, path: &Path) -> OverlayError {
    OverlayError::InvalidInput {
        field,
        reason,
        value: Some(path.display().to_string()),
    }
}

/// Render an error and its sources on one line.
fn describe(error: &OverlayError) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}
