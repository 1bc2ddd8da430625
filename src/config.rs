use std::path::Path;

use image::Rgba;
use serde::Deserialize;

use crate::canvas::validate_dimensions;
use crate::error::Result;
use crate::ops::fill::{FillLimits, MAX_FILL_QUEUED, MAX_FILL_VISITED};

/// Engine settings, loadable from TOML.  Missing keys take their defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub width: u32,
    pub height: u32,
    /// Snapshots kept for undo/redo.
    pub history_limit: usize,
    /// Optional cap on snapshot memory, in MiB.
    pub history_memory_limit_mb: Option<usize>,
    pub max_fill_visited: usize,
    pub max_fill_queued: usize,
    /// Run flood fills on a rayon worker and hand the result back.
    pub background_fill: bool,
    /// Colour of the initial layer and of area added by growing the canvas.
    pub background_color: [u8; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            history_limit: 50,
            history_memory_limit_mb: Some(512),
            max_fill_visited: MAX_FILL_VISITED,
            max_fill_queued: MAX_FILL_QUEUED,
            background_fill: true,
            background_color: [255, 255, 255, 255],
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        validate_dimensions(config.width, config.height)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn fill_limits(&self) -> FillLimits {
        FillLimits {
            max_visited: self.max_fill_visited,
            max_queued: self.max_fill_queued,
        }
    }

    pub fn history_memory_bytes(&self) -> Option<usize> {
        self.history_memory_limit_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    pub fn background(&self) -> Rgba<u8> {
        Rgba(self.background_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("width = 320\nbackground_fill = false\n").unwrap();
        assert_eq!(config.width, 320);
        assert_eq!(config.height, 600);
        assert!(!config.background_fill);
        assert_eq!(config.history_limit, 50);
    }

    #[test]
    fn test_rejects_bad_dimensions_and_syntax() {
        assert!(EngineConfig::from_toml_str("width = 0").is_err());
        assert!(EngineConfig::from_toml_str("width = \"wide\"").is_err());
    }

    #[test]
    fn test_memory_limit_in_bytes() {
        let config = EngineConfig {
            history_memory_limit_mb: Some(2),
            ..Default::default()
        };
        assert_eq!(config.history_memory_bytes(), Some(2 * 1024 * 1024));
    }
}
