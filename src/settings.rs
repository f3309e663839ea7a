//! Viewer settings with persistence
//!
//! Settings are saved to `~/.config/vista/settings.toml`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};
use vista_assets::{ImportOptions, TextureLoaderConfig};

/// All viewer settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub import: ImportOptions,
    pub textures: TextureLoaderConfig,
    pub logging: LoggingSettings,
}

impl ViewerSettings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vista"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    /// Load settings from the config directory, or return defaults if not
    /// found. Nothing is logged here; the caller reports the returned
    /// [`SettingsOrigin`] once logging is set up.
    pub fn load() -> (Self, SettingsOrigin) {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => (Self::default(), SettingsOrigin::NoConfigDir),
        }
    }

    /// Load settings from a specific file, falling back to defaults on any
    /// error
    pub fn load_from(path: &Path) -> (Self, SettingsOrigin) {
        if !path.exists() {
            return (Self::default(), SettingsOrigin::Missing(path.to_path_buf()));
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| format!("failed to read: {e}"))
            .and_then(|content| toml::from_str::<Self>(&content).map_err(|e| format!("failed to parse: {e}")));
        match parsed {
            Ok(settings) => (settings, SettingsOrigin::File(path.to_path_buf())),
            Err(reason) => (Self::default(), SettingsOrigin::Invalid(path.to_path_buf(), reason)),
        }
    }

    /// Save settings to the config directory
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let Some(path) = Self::settings_path() else {
            anyhow::bail!("Could not determine config directory");
        };
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to a specific file, creating its directory
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Where [`ViewerSettings::load`] got its values from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOrigin {
    File(PathBuf),
    Missing(PathBuf),
    Invalid(PathBuf, String),
    NoConfigDir,
}

impl SettingsOrigin {
    pub fn log(&self) {
        match self {
            SettingsOrigin::File(path) => info!("Loaded settings from {:?}", path),
            SettingsOrigin::Missing(path) => info!("No settings file at {:?}, using defaults", path),
            SettingsOrigin::Invalid(path, reason) => {
                warn!("Settings file {:?} {}, using defaults", path, reason)
            }
            SettingsOrigin::NoConfigDir => warn!("Could not determine config directory"),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Maximum level: error, warn, info, debug or trace
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingSettings {
    /// Parsed level, `INFO` if the configured name is not recognized
    pub fn max_level(&self) -> Level {
        self.level.parse().unwrap_or(Level::INFO)
    }
}
