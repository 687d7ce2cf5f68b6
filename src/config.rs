use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path following platform conventions:
    /// - Linux: $XDG_CONFIG_HOME/claude-code-mirror or ~/.config/claude-code-mirror
    /// - macOS: ~/Library/Application Support/claude-code-mirror
    /// - Windows: %APPDATA%\claude-code-mirror
    pub fn config_dir() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            // Follow XDG Base Directory Specification
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join("claude-code-mirror"))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join("claude-code-mirror"))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home
                .join("Library")
                .join("Application Support")
                .join("claude-code-mirror"))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join("claude-code-mirror"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(".claude-code-mirror"))
        }
    }

    /// Get the settings file path (config.toml)
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("claude-code-mirror.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
        Ok(config_dir)
    }
}

/// Default source root: where Claude Code writes its session logs
pub fn default_source_root() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".claude").join("projects"))
}

/// Persisted sync settings.
///
/// Loaded once at startup and written back only after a successful sync or
/// a settings change. A missing `store_root` means the engine has nothing
/// to do; that is a quiet no-op, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Canonical directory where Claude Code writes session logs
    pub source_root: PathBuf,

    /// Shared store directory the logs are mirrored into (cloud-synced)
    pub store_root: Option<PathBuf>,

    /// Whether the file watcher should sync changes as they happen
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Whether `watch` runs a full sync of existing files before watching
    #[serde(default = "default_true")]
    pub sync_on_start: bool,

    /// Timestamp of the last successful sync
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            source_root: default_source_root().unwrap_or_else(|_| PathBuf::from(".")),
            store_root: None,
            auto_sync: true,
            sync_on_start: true,
            last_sync: None,
        }
    }
}

impl SyncConfig {
    /// Load settings from the default config file, falling back to defaults
    /// when no settings have been saved yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&ConfigManager::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(SyncConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        ConfigManager::ensure_config_dir()?;
        self.save_to(&ConfigManager::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_paths() {
        let config_dir = ConfigManager::config_dir().unwrap();
        assert!(config_dir.to_string_lossy().contains("claude-code-mirror"));

        let config_file = ConfigManager::config_file_path().unwrap();
        assert!(config_file.to_string_lossy().contains("config.toml"));

        let log = ConfigManager::log_file_path().unwrap();
        assert!(log.to_string_lossy().contains("claude-code-mirror.log"));
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert!(config.store_root.is_none());
        assert!(config.auto_sync);
        assert!(config.sync_on_start);
        assert!(config.last_sync.is_none());
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(config.store_root.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = SyncConfig {
            source_root: PathBuf::from("/src/root"),
            store_root: Some(PathBuf::from("/store/root")),
            auto_sync: false,
            sync_on_start: true,
            last_sync: Some(Utc::now()),
        };
        config.save_to(&path).unwrap();

        let loaded = SyncConfig::load_from(&path).unwrap();
        assert_eq!(loaded.source_root, config.source_root);
        assert_eq!(loaded.store_root, config.store_root);
        assert!(!loaded.auto_sync);
        assert_eq!(loaded.last_sync, config.last_sync);
    }
}
