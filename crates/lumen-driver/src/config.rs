//! Renderer configuration.
//!
//! Loaded from TOML or JSON; every field has a default so partial files
//! are fine. The driver can be overridden with `LUMEN_DRIVER`.

use crate::driver::DriverKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Environment variable that overrides [`RendererConfig::driver`].
pub const DRIVER_ENV: &str = "LUMEN_DRIVER";

/// Settings chosen once per renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Which render driver backs the nodes
    pub driver: DriverKind,
    /// App width, used to size the root node
    pub width: u32,
    /// App height
    pub height: u32,
    /// Render worker frame interval, shared driver only
    pub frame_interval_ms: u64,
    /// Log level for the binary's subscriber
    pub log_level: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Shared,
            width: 1920,
            height: 1080,
            frame_interval_ms: 16,
            log_level: "info".to_string(),
        }
    }
}

impl RendererConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Load by file extension (`.toml` or `.json`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "toml" => Self::from_toml_file(path)?,
            "json" => Self::from_json_file(path)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };
        info!("Loaded renderer config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Apply `LUMEN_DRIVER` if set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_driver_override(std::env::var(DRIVER_ENV).ok().as_deref())
    }

    fn apply_driver_override(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.driver = value.parse()?;
            info!("Render driver overridden to {} by {}", self.driver, DRIVER_ENV);
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RendererConfig::from_toml("driver = \"direct\"\nwidth = 640\n").unwrap();
        assert_eq!(config.driver, DriverKind::Direct);
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 1080);
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_json_config() {
        let config =
            RendererConfig::from_json(r#"{"driver": "shared", "frame_interval_ms": 8}"#).unwrap();
        assert_eq!(config.driver, DriverKind::Shared);
        assert_eq!(config.frame_interval_ms, 8);
    }

    #[test]
    fn test_unknown_driver_is_parse_error() {
        let err = RendererConfig::from_toml("driver = \"gpu\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RendererConfig {
            driver: DriverKind::Direct,
            ..RendererConfig::default()
        };
        assert_eq!(RendererConfig::from_toml(&config.to_toml()).unwrap(), config);
    }

    #[test]
    fn test_driver_override() {
        let mut config = RendererConfig::default();
        config.apply_driver_override(Some(" Direct ")).unwrap();
        assert_eq!(config.driver, DriverKind::Direct);

        config.apply_driver_override(Some("")).unwrap();
        assert_eq!(config.driver, DriverKind::Direct);

        let err = config.apply_driver_override(Some("webgl")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDriver(_)));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("lumen-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"height": 720}"#).unwrap();
        let config = RendererConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.height, 720);

        let err = RendererConfig::load(Path::new("renderer.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
