//! Engine configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Database settings
    pub database: DatabaseSettings,
    /// Leaderboard settings
    pub leaderboard: LeaderboardSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            database: DatabaseSettings::default(),
            leaderboard: LeaderboardSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Full path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database.file_name)
    }
}

/// Database-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file name inside the data directory
    pub file_name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            file_name: "stemquest.db".to_string(),
        }
    }
}

/// Leaderboard-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSettings {
    /// Default number of entries returned when the caller passes no limit
    pub default_limit: usize,
    /// Maximum number of entries a single query may request
    pub max_limit: usize,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 500,
        }
    }
}

/// Get the engine data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "stemquest", "StemQuest")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load engine configuration from file.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    let path = get_config_path();

    if !path.exists() {
        let config = EngineConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        };
        return Ok(config);
    }

    let content =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: EngineConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = get_data_dir();

    Ok(config)
}

/// Save engine configuration to file.
pub fn save_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let path = get_config_path();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.database.file_name, "stemquest.db");
        assert_eq!(config.leaderboard.default_limit, 100);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = EngineConfig::default();
        config.leaderboard.default_limit = 25;

        let serialized = toml::to_string_pretty(&config).expect("Failed to serialize");
        let parsed: EngineConfig = toml::from_str(&serialized).expect("Failed to parse");

        assert_eq!(parsed.leaderboard.default_limit, 25);
        assert_eq!(parsed.database.file_name, config.database.file_name);
    }
}
