//! Cross-field validation for configuration documents.

use std::collections::HashSet;
use std::path::Path;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{CacheConfig, FilesConfig, LibraryConfig, OverlayConfig};

impl OverlayConfig {
    /// Validate the document, returning the first violation found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] or [`ConfigError::DuplicateLibrary`]
    /// describing the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.threads == 0 || self.threads > defaults::MAX_THREADS {
            return Err(ConfigError::invalid(
                "overlay",
                "threads",
                Some(self.threads.to_string()),
                "must be between 1 and 64",
            ));
        }
        if self.name_cutoff < defaults::MIN_NAME_CUTOFF {
            return Err(ConfigError::invalid(
                "overlay",
                "name_cutoff",
                Some(self.name_cutoff.to_string()),
                "must be at least 8",
            ));
        }
        validate_cache(&self.cache)?;
        validate_files(&self.files)?;

        let mut seen = HashSet::new();
        for library in &self.libraries {
            validate_library(library)?;
            if !seen.insert(library.id.as_str()) {
                return Err(ConfigError::DuplicateLibrary {
                    id: library.id.clone(),
                });
            }
        }
        Ok(())
    }
}

fn validate_cache(cache: &CacheConfig) -> ConfigResult<()> {
    if cache.max_entries == 0 {
        return Err(ConfigError::invalid(
            "cache",
            "max_entries",
            Some("0".to_string()),
            "must be positive",
        ));
    }
    if cache.absolute_ttl_secs == 0 {
        return Err(ConfigError::invalid(
            "cache",
            "absolute_ttl_secs",
            Some("0".to_string()),
            "must be positive",
        ));
    }
    if cache.sliding_ttl_secs == 0 {
        return Err(ConfigError::invalid(
            "cache",
            "sliding_ttl_secs",
            Some("0".to_string()),
            "must be positive",
        ));
    }
    if cache.sliding_ttl_secs > cache.absolute_ttl_secs {
        return Err(ConfigError::invalid(
            "cache",
            "sliding_ttl_secs",
            Some(cache.sliding_ttl_secs.to_string()),
            "must not exceed absolute_ttl_secs",
        ));
    }
    Ok(())
}

fn validate_files(files: &FilesConfig) -> ConfigResult<()> {
    let lists = [
        ("video_extensions", &files.video_extensions),
        ("subtitle_extensions", &files.subtitle_extensions),
    ];
    for (field, extensions) in lists {
        if let Some(bad) = extensions
            .iter()
            .find(|ext| ext.len() < 2 || !ext.starts_with('.'))
        {
            return Err(ConfigError::invalid(
                "files",
                field,
                Some(bad.clone()),
                "extensions must start with a dot",
            ));
        }
    }
    Ok(())
}

fn validate_library(library: &LibraryConfig) -> ConfigResult<()> {
    let section = format!("libraries.{}", library.id);
    if library.id.trim().is_empty() {
        return Err(ConfigError::invalid(
            "libraries",
            "id",
            None,
            "must not be empty",
        ));
    }
    require_absolute(&section, "overlay_root", &library.overlay_root)?;
    for root in &library.source_roots {
        require_absolute(&section, "source_roots", root)?;
        if library.overlay_root.starts_with(root) || root.starts_with(&library.overlay_root) {
            return Err(ConfigError::invalid(
                section,
                "overlay_root",
                Some(library.overlay_root.display().to_string()),
                "must not overlap a source root",
            ));
        }
    }
    Ok(())
}

fn require_absolute(section: &str, field: &str, path: &Path) -> ConfigResult<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            section,
            field,
            Some(path.display().to_string()),
            "must be an absolute path",
        ))
    }
}
