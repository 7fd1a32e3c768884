use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::io::serial::delimiter::DelimiterMode;
use crate::io::serial::reader::SessionOptions;
use crate::io::{DelimiterSetting, IoError};

/// Bridge tuning loaded from `config.toml`. Every field has a default, so an
/// empty or missing file is valid.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    #[serde(default = "default_transmit_queue_depth")]
    pub transmit_queue_depth: usize,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    #[serde(default)]
    pub max_frame_length: Option<usize>,
    /// Delimiter mode a session starts with
    #[serde(default)]
    pub default_delimiter: DelimiterSetting,
}

fn default_read_timeout_ms() -> u64 {
    10
}
fn default_write_timeout_ms() -> u64 {
    500
}
fn default_discovery_timeout_ms() -> u64 {
    2000
}
fn default_transmit_queue_depth() -> usize {
    32
}
fn default_read_buffer_size() -> usize {
    256
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            transmit_queue_depth: default_transmit_queue_depth(),
            read_buffer_size: default_read_buffer_size(),
            max_frame_length: None,
            default_delimiter: DelimiterSetting::default(),
        }
    }
}

impl BridgeConfig {
    /// `<config dir>/comtap/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("comtap").join("config.toml"))
    }

    /// Load and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, IoError> {
        if !path.exists() {
            return Ok(BridgeConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| IoError::config(format!("Failed to read {}: {}", path.display(), e)))?;
        BridgeConfig::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, IoError> {
        let config: BridgeConfig = toml::from_str(content)
            .map_err(|e| IoError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IoError::config(format!("Failed to create config dir: {}", e)))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| IoError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| IoError::config(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), IoError> {
        if self.read_timeout_ms == 0 {
            return Err(IoError::config("read_timeout_ms must be at least 1"));
        }
        if self.write_timeout_ms == 0 {
            return Err(IoError::config("write_timeout_ms must be at least 1"));
        }
        if self.discovery_timeout_ms == 0 {
            return Err(IoError::config("discovery_timeout_ms must be at least 1"));
        }
        if self.transmit_queue_depth == 0 {
            return Err(IoError::config("transmit_queue_depth must be at least 1"));
        }
        if self.read_buffer_size == 0 {
            return Err(IoError::config("read_buffer_size must be at least 1"));
        }
        if matches!(self.max_frame_length, Some(n) if n < 2) {
            return Err(IoError::config("max_frame_length must be at least 2"));
        }
        self.initial_mode()
            .map_err(|e| IoError::config(format!("default_delimiter: {}", e)))?;
        Ok(())
    }

    pub fn initial_mode(&self) -> Result<DelimiterMode, IoError> {
        DelimiterMode::try_from(&self.default_delimiter)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_timeout: self.read_timeout(),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            transmit_queue_depth: self.transmit_queue_depth,
            read_buffer_size: self.read_buffer_size,
            max_frame_length: self.max_frame_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BridgeConfig::from_toml("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(
            config.initial_mode().unwrap(),
            DelimiterMode::Interval(Duration::from_millis(150))
        );
    }

    #[test]
    fn test_partial_config() {
        let config = BridgeConfig::from_toml(
            r#"
            write_timeout_ms = 1000
            max_frame_length = 512

            [default_delimiter]
            delimitByCode = true
            code = 13
            "#,
        )
        .unwrap();
        assert_eq!(config.write_timeout_ms, 1000);
        assert_eq!(config.read_timeout_ms, 10);
        assert_eq!(config.initial_mode().unwrap(), DelimiterMode::Code(0x0D));

        let options = config.session_options();
        assert_eq!(options.write_timeout, Duration::from_secs(1));
        assert_eq!(options.max_frame_length, Some(512));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(BridgeConfig::from_toml("read_timeout_ms = 0").is_err());
        assert!(BridgeConfig::from_toml("max_frame_length = 1").is_err());
        assert!(BridgeConfig::from_toml("[default_delimiter]\nintervalMs = 0").is_err());
        assert!(matches!(
            BridgeConfig::from_toml("read_timeout_ms = \"fast\""),
            Err(IoError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comtap").join("config.toml");
        let mut config = BridgeConfig::default();
        config.discovery_timeout_ms = 750;
        config.default_delimiter = DelimiterSetting::code(b';');

        config.save(&path).unwrap();
        assert_eq!(BridgeConfig::load(&path).unwrap(), config);
    }
}
