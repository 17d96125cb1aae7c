//! Application configuration.
//!
//! Everything the binary can tune lives in [`AppConfig`], read from an
//! optional JSON file. Every field has a default, so a file only needs the
//! keys it changes:
//!
//! ```json
//! {
//!   "initial_scene": "darkmatterflow",
//!   "window": { "width": 1920, "height": 1080 },
//!   "post": { "bloom": { "strength": 1.2 } }
//! }
//! ```

use crate::error::ConfigError;
use crate::post_process::PostProcessConfig;
use crate::time::ClockConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "stardrift".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    /// Scene activated on startup.
    pub initial_scene: String,
    pub post: PostProcessConfig,
    pub clock: ClockConfig,
    /// Frames per scene in `--headless` runs.
    pub headless_frames: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            initial_scene: "galaxy".to_string(),
            post: PostProcessConfig::default(),
            clock: ClockConfig::default(),
            headless_frames: 120,
        }
    }
}

impl AppConfig {
    /// Read a config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            )));
        }
        if self.clock.max_delta.is_nan() || self.clock.max_delta <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "clock.max_delta must be positive, got {}",
                self.clock.max_delta
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("stardrift-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = AppConfig::load(temp_path("missing")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.initial_scene, "galaxy");
        assert_eq!(config.post.bloom.strength, 1.5);
    }

    #[test]
    fn test_partial_file() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "initial_scene": "darkmatterflow", "window": { "width": 640 } }"#,
        )
        .unwrap();
        assert_eq!(config.initial_scene, "darkmatterflow");
        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.clock.max_delta, 0.1);
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save");
        let mut config = AppConfig::default();
        config.headless_frames = 7;
        config.post.bloom.strength = 0.9;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values() {
        let path = temp_path("invalid");
        std::fs::write(&path, r#"{ "window": { "height": 0 } }"#).unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let path = temp_path("garbage");
        std::fs::write(&path, "not json").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
