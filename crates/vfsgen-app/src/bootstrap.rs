use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};
use vfsgen_catalog::CatalogClient;
use vfsgen_config::{LogFormat as ConfigLogFormat, OverlayConfig};
use vfsgen_events::EventBus;
use vfsgen_overlay::{LinkGenerationResult, OverlayService};
use vfsgen_telemetry::{LogFormat, LoggingConfig, Metrics};

use crate::error::{AppError, AppResult};
use crate::snapshot::SnapshotCatalog;

/// Environment variable holding the configuration file path.
pub const CONFIG_ENV: &str = "VFSGEN_CONFIG";

/// Outcome of the bulk pass for one library.
#[derive(Debug)]
pub struct LibraryReport {
    /// Library identifier.
    pub library_id: String,
    /// Counters of the pass.
    pub result: LinkGenerationResult,
}

/// Entry point for the vfsgen boot sequence.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, logging cannot be
/// installed, or any library fails to generate.
pub async fn run_app() -> AppResult<()> {
    let path = config_path_from(std::env::var_os(CONFIG_ENV).map(PathBuf::from))?;
    let config =
        vfsgen_config::load_from_path(&path).map_err(|err| AppError::config("config.load", err))?;

    let level = config.logging.level.clone();
    vfsgen_telemetry::init_logging(&LoggingConfig {
        level: &level,
        format: log_format(config.logging.format),
        ..LoggingConfig::default()
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!(config = %path.display(), libraries = config.libraries.len(), "vfsgen starting");
    let reports = run_pass(&config).await?;
    info!(libraries = reports.len(), "vfsgen finished");
    Ok(())
}

/// Generate every configured library once against the configured snapshot.
///
/// Every library is attempted; the first failure is returned after the rest
/// have run.
///
/// # Errors
///
/// Returns [`AppError::InvalidConfig`] when no catalog snapshot is configured,
/// snapshot loading errors, and the first library generation failure.
pub async fn run_pass(config: &OverlayConfig) -> AppResult<Vec<LibraryReport>> {
    let snapshot = config
        .catalog_snapshot
        .as_deref()
        .ok_or(AppError::InvalidConfig {
            field: "catalog_snapshot",
            reason: "missing",
            value: None,
        })?;
    let catalog: Arc<dyn CatalogClient> = Arc::new(SnapshotCatalog::load(snapshot).await?);
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let service = OverlayService::new(config, catalog, EventBus::new(), metrics.clone());

    let mut reports = Vec::new();
    let mut failure = None;
    for library in service.libraries() {
        match service.generate(&library.overlay_root).await {
            Ok(result) => reports.push(LibraryReport {
                library_id: library.id,
                result,
            }),
            Err(err) => {
                error!(library = %library.id, error = %err, "library generation failed");
                failure.get_or_insert(AppError::overlay("overlay.generate", library.id, err));
            }
        }
    }

    match metrics.render() {
        Ok(rendered) => debug!(metrics = %rendered, "generation metrics"),
        Err(err) => debug!(error = %err, "failed to render metrics"),
    }
    failure.map_or(Ok(reports), Err)
}

fn config_path_from(value: Option<PathBuf>) -> AppResult<PathBuf> {
    value
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or(AppError::MissingEnv { name: CONFIG_ENV })
}

const fn log_format(format: Option<ConfigLogFormat>) -> LogFormat {
    match format {
        Some(ConfigLogFormat::Json) => LogFormat::Json,
        Some(ConfigLogFormat::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    }
}
