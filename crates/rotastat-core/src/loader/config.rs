use crate::core::io::resolve::SearchRoots;
use crate::core::models::ModelOptions;
use crate::core::utils::interpolation::InterpolationKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Everything the loader reads from configuration: the search-root snapshot
/// and the numeric-mode flags baked into each constructed model.
///
/// Settings are read once per load call; models never re-read them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoaderSettings {
    pub roots: SearchRoots,
    pub options: ModelOptions,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

impl LoaderSettings {
    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let settings: LoaderSettings =
            toml::from_str(&content).map_err(|e| SettingsError::Toml {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
        Ok(settings)
    }

    pub fn builder() -> LoaderSettingsBuilder {
        LoaderSettingsBuilder::default()
    }
}

/// Fluent construction for callers that assemble settings in code rather
/// than from a file. Every field has a default: no roots, linear
/// interpolation, no entropy correction.
#[derive(Debug, Default)]
pub struct LoaderSettingsBuilder {
    priority: Vec<PathBuf>,
    data_root: Option<PathBuf>,
    extra: Vec<PathBuf>,
    interpolation: InterpolationKind,
    entropy_correction: bool,
}

impl LoaderSettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.priority.push(path.into());
        self
    }

    pub fn data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_root = Some(path.into());
        self
    }

    pub fn extra_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra.push(path.into());
        self
    }

    pub fn interpolation(mut self, kind: InterpolationKind) -> Self {
        self.interpolation = kind;
        self
    }

    pub fn entropy_correction(mut self, enabled: bool) -> Self {
        self.entropy_correction = enabled;
        self
    }

    pub fn build(self) -> LoaderSettings {
        LoaderSettings {
            roots: SearchRoots {
                priority: self.priority,
                data_root: self.data_root,
                extra: self.extra,
            },
            options: ModelOptions {
                interpolation: self.interpolation,
                entropy_correction: self.entropy_correction,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn settings_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loader.toml");
        fs::write(
            &path,
            r#"
[roots]
priority = ["/opt/override/rotlibs"]
data_root = "/opt/data"
extra = ["/home/user/rotlibs"]

[options]
interpolation = "bicubic"
entropy_correction = true
"#,
        )
        .unwrap();

        let settings = LoaderSettings::load(&path).unwrap();

        assert_eq!(
            settings.roots.priority,
            vec![PathBuf::from("/opt/override/rotlibs")]
        );
        assert_eq!(settings.roots.data_root, Some(PathBuf::from("/opt/data")));
        assert_eq!(settings.options.interpolation, InterpolationKind::Bicubic);
        assert!(settings.options.entropy_correction);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loader.toml");
        fs::write(&path, "").unwrap();

        let settings = LoaderSettings::load(&path).unwrap();

        assert_eq!(settings, LoaderSettings::default());
        assert_eq!(settings.options.interpolation, InterpolationKind::Linear);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loader.toml");
        fs::write(&path, "[options]\nsmoothing = true\n").unwrap();

        assert!(matches!(
            LoaderSettings::load(&path),
            Err(SettingsError::Toml { .. })
        ));
    }

    #[test]
    fn builder_collects_roots_in_order() {
        let settings = LoaderSettings::builder()
            .priority_root("/a")
            .priority_root("/b")
            .data_root("/data")
            .extra_root("/extra")
            .interpolation(InterpolationKind::Bicubic)
            .entropy_correction(true)
            .build();

        assert_eq!(
            settings.roots.priority,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(settings.roots.data_root, Some(PathBuf::from("/data")));
        assert_eq!(settings.roots.extra, vec![PathBuf::from("/extra")]);
        assert!(settings.options.entropy_correction);
    }
}
