//! Engine settings loaded from `vibe.toml`.
//!
//! ```toml
//! [engine]
//! extent_strategy = "auto"   # auto | tree | indent
//! strict = false
//! rollback_on_failure = false
//!
//! [spacing]
//! top_level_blank_lines = 2
//! nested_blank_lines = 1
//!
//! [backup]
//! enabled = true
//! dir_name = "VibeBackups"
//! ```
//!
//! Every key is optional. A missing file means defaults.

use crate::backup::{BackupStore, SiblingBackups, DEFAULT_BACKUP_DIR};
use crate::locate::ExtentStrategy;
use crate::patch::applicator::ApplyOptions;
use crate::spacing::SpacingRules;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name looked up in the workspace root.
pub const SETTINGS_FILE: &str = "vibe.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub engine: EngineSection,
    pub spacing: SpacingRules,
    pub backup: BackupSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub extent_strategy: ExtentStrategy,
    /// Fail instead of warning when a target or anchor is missing
    pub strict: bool,
    /// Restore files touched by a batch if a later record fails
    pub rollback_on_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupSection {
    pub enabled: bool,
    pub dir_name: String,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dir_name: DEFAULT_BACKUP_DIR.to_string(),
        }
    }
}

impl EngineSettings {
    fn validate(&self) -> Result<(), String> {
        let dir = self.backup.dir_name.trim();
        if self.backup.enabled && dir.is_empty() {
            return Err("backup.dir_name must not be empty".to_string());
        }
        if dir.contains(['/', '\\']) || dir == ".." || dir == "." {
            return Err(format!(
                "backup.dir_name must be a plain directory name, got '{}'",
                self.backup.dir_name
            ));
        }
        Ok(())
    }

    /// Options for one apply run.
    pub fn apply_options(&self, dry_run: bool) -> ApplyOptions {
        ApplyOptions {
            dry_run,
            strict: self.engine.strict,
            rollback_on_failure: self.engine.rollback_on_failure,
            strategy: self.engine.extent_strategy,
            spacing: self.spacing,
            backup: self
                .backup
                .enabled
                .then(|| {
                    Arc::new(SiblingBackups::new(self.backup.dir_name.trim())) as Arc<dyn BackupStore>
                }),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        message: String,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation {
                path: None,
                message,
            } => ConfigError::Validation {
                path: Some(path),
                message,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read settings from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse settings ({}): {}", path.display(), source),
                None => write!(f, "failed to parse settings: {}", source),
            },
            ConfigError::Validation { path, message } => match path {
                Some(path) => write!(f, "invalid settings ({}): {}", path.display(), message),
                None => write!(f, "invalid settings: {}", message),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { .. } => None,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<EngineSettings, ConfigError> {
    let settings: EngineSettings = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    settings
        .validate()
        .map_err(|message| ConfigError::Validation {
            path: None,
            message,
        })?;
    Ok(settings)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineSettings, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load `explicit` if given, else `<root>/vibe.toml` if present, else defaults.
pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<EngineSettings, ConfigError> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    let candidate = root.join(SETTINGS_FILE);
    if candidate.is_file() {
        load_from_path(candidate)
    } else {
        Ok(EngineSettings::default())
    }
}
