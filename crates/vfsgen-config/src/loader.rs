//! JSON configuration loading.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::OverlayConfig;

/// Read, parse and validate a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read,
/// [`ConfigError::Parse`] for malformed JSON, and validation errors otherwise.
pub fn load_from_path(path: &Path) -> ConfigResult<OverlayConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    let config: OverlayConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
    config.validate()?;
    info!(
        path = %path.display(),
        libraries = config.libraries.len(),
        threads = config.threads,
        "configuration loaded"
    );
    Ok(config)
}

/// Parse and validate a configuration document held in memory.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed JSON and validation errors otherwise.
pub fn load_from_str(raw: &str) -> ConfigResult<OverlayConfig> {
    let config: OverlayConfig =
        serde_json::from_str(raw).map_err(|source| ConfigError::Parse { path: None, source })?;
    config.validate()?;
    debug!(libraries = config.libraries.len(), "configuration parsed");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_str_rejects_malformed_json() {
        assert!(matches!(
            load_from_str("{ not json"),
            Err(ConfigError::Parse { path: None, .. })
        ));
    }

    #[test]
    fn load_from_str_runs_validation() {
        assert!(matches!(
            load_from_str(r#"{ "threads": 0 }"#),
            Err(ConfigError::InvalidField { .. })
        ));
    }

    #[test]
    fn load_from_path_reports_missing_file() {
        let err = load_from_path(Path::new("/nonexistent/vfsgen.json")).err();
        assert!(matches!(
            err,
            Some(ConfigError::Io {
                operation: "config.read",
                ..
            })
        ));
    }
}
