//! src/config.rs
//! ============================================================================
//! # Config: Router Configuration Loader and Saver
//!
//! Which widgets the router asks the host to externalize, whether diagnostics
//! are emitted, and where logs go. Stored as TOML in the platform config
//! directory resolved through [`directories`](https://docs.rs/directories).
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! config.save().await?;
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use tokio::fs as TokioFs;

use crate::error::RouterError;
use crate::logging::LoggerConfig;
use crate::model::event::{CapabilitySet, Widget};

/// Per-widget switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    pub enabled: bool,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gates every diagnostic the router emits.
    pub debug: bool,

    /// Minimum spacing between repeats of the same resolution diagnostic
    #[serde(with = "humantime_serde")]
    pub diagnostic_interval: Duration,

    pub messages: CapabilityConfig,

    pub cmdline: CapabilityConfig,

    pub popupmenu: CapabilityConfig,

    pub logging: LoggerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            diagnostic_interval: Duration::from_secs(10),
            messages: CapabilityConfig::default(),
            cmdline: CapabilityConfig::default(),
            popupmenu: CapabilityConfig::default(),
            logging: LoggerConfig::default(),
        }
    }
}

impl Config {
    pub fn capability(&self, widget: Widget) -> CapabilityConfig {
        match widget {
            Widget::Message => self.messages,
            Widget::Cmdline => self.cmdline,
            Widget::Popupmenu => self.popupmenu,
        }
    }

    /// Widgets the configuration asks to externalize.
    pub fn requested(&self) -> CapabilitySet {
        let mut set = CapabilitySet::empty();
        for widget in Widget::ALL {
            if self.capability(widget).enabled {
                set.insert(widget);
            }
        }
        set
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RouterError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads config from the platform config dir, creating it with defaults
    /// when missing.
    pub async fn load() -> Result<Self, RouterError> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save_to(&path).await?;

            Ok(default_config)
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self, RouterError> {
        info!("Loading config from {}", path.display());
        let text = TokioFs::read_to_string(path)
            .await
            .map_err(|e| RouterError::config_io(path, e))?;

        Self::from_toml_str(&text)
    }

    pub async fn save(&self) -> Result<(), RouterError> {
        self.save_to(&Self::config_path()?).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), RouterError> {
        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent)
                .await
                .map_err(|e| RouterError::config_io(parent, e))?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        TokioFs::write(path, toml_str)
            .await
            .map_err(|e| RouterError::config_io(path, e))?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> Result<PathBuf, RouterError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf, RouterError> {
        let proj_dirs = ProjectDirs::from("org", "extui", "extui")
            .ok_or_else(|| RouterError::Other("Could not determine config directory.".into()))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_request_everything() {
        let config = Config::default();
        assert!(!config.debug);
        assert_eq!(
            config.requested(),
            CapabilitySet::of(&[Widget::Message, Widget::Cmdline, Widget::Popupmenu])
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            debug = true
            diagnostic_interval = "2s"

            [popupmenu]
            enabled = false
            "#,
        )
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.diagnostic_interval, Duration::from_secs(2));
        assert_eq!(config.requested(), CapabilitySet::of(&[Widget::Message, Widget::Cmdline]));
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = Config::from_toml_str("debug = \"yes\"").unwrap_err();
        assert!(matches!(err, RouterError::Config(_)));
    }

    #[tokio::test]
    async fn test_save_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.cmdline.enabled = false;
        config.save_to(&path).await.unwrap();

        let loaded = Config::load_from(&path).await.unwrap();
        assert!(!loaded.cmdline.enabled);
        assert!(loaded.messages.enabled);
        assert_eq!(loaded.diagnostic_interval, config.diagnostic_interval);
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = Config::load_from(&path).await.unwrap_err();
        match err {
            RouterError::ConfigIo { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
