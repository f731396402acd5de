// Local configuration for LiveDraft clients.
//
// Global config: `~/.livedraft/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root directory for LiveDraft state: `~/.livedraft/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".livedraft"))
}

/// Path to the global config file: `~/.livedraft/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Client configuration at `~/.livedraft/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Message bus URL (e.g. `wss://sync.livedraft.dev`).
    pub bus_url: Option<String>,
    /// REST API base URL (e.g. `https://api.livedraft.dev`).
    pub api_url: Option<String>,
    /// Display name for this user.
    pub display_name: Option<String>,
    /// Minimum interval between presence broadcasts, in milliseconds.
    pub presence_interval_ms: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bus_url: None,
            api_url: None,
            display_name: None,
            presence_interval_ms: 150,
        }
    }
}

impl ClientConfig {
    /// Load from `~/.livedraft/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `~/.livedraft/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_leave_urls_unset() {
        let cfg = ClientConfig::default();
        assert!(cfg.bus_url.is_none());
        assert!(cfg.api_url.is_none());
        assert!(cfg.display_name.is_none());
        assert_eq!(cfg.presence_interval_ms, 150);
    }

    #[test]
    fn config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = ClientConfig {
            bus_url: Some("wss://sync.livedraft.dev".into()),
            api_url: Some("https://api.livedraft.dev".into()),
            display_name: Some("Alice".into()),
            presence_interval_ms: 200,
        };
        cfg.save_to(&path).unwrap();
        let loaded = ClientConfig::load_from(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn parse_from_toml() {
        let toml_str = r#"
bus_url = "wss://sync.livedraft.dev"
display_name = "Bob"
presence_interval_ms = 250
"#;
        let cfg: ClientConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.bus_url.as_deref(), Some("wss://sync.livedraft.dev"));
        assert_eq!(cfg.display_name.as_deref(), Some("Bob"));
        assert_eq!(cfg.presence_interval_ms, 250);
        assert!(cfg.api_url.is_none());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(ClientConfig::load_from(&path).is_err());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep").join("nested").join("config.toml");
        ClientConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn global_dir_is_under_home() {
        let dir = global_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with(".livedraft"));
    }
}
