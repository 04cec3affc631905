//! Editor and playback settings.
//!
//! Every field has a default, so a host can pass a partial JSON object
//! (or nothing at all).

use pov_core::layout::NodeMetrics;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("editor config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid editor config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub node: NodeMetrics,
    /// Gap between clips laid out on the import grid.
    pub grid_margin: f32,
    /// Space kept past the right/bottom-most clip when sizing the canvas.
    pub container_margin: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_step: f32,
    /// How long an imported clip may stay `Pending` before it is marked
    /// errored.
    pub media_timeout_ms: u64,
    /// Empty transition lines given to a freshly linked edge.
    pub default_lines: usize,
    pub playback: PlaybackConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            node: NodeMetrics::default(),
            grid_margin: 20.0,
            container_margin: 100.0,
            zoom_min: 0.5,
            zoom_max: 2.0,
            zoom_step: 0.1,
            media_timeout_ms: 10_000,
            default_lines: 3,
            playback: PlaybackConfig::default(),
        }
    }
}

impl EditorConfig {
    /// Parse a partial config and check it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        let sizes = [
            ("node.width", self.node.width),
            ("node.height", self.node.height),
            ("zoomMin", self.zoom_min),
            ("zoomMax", self.zoom_max),
            ("zoomStep", self.zoom_step),
        ];
        for (name, value) in sizes {
            if !value.is_finite() || value <= 0.0 {
                return invalid(format!("{name} must be a positive number, got {value}"));
            }
        }
        for (name, value) in [
            ("gridMargin", self.grid_margin),
            ("containerMargin", self.container_margin),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be zero or more, got {value}"));
            }
        }
        if self.zoom_min > self.zoom_max {
            return invalid(format!(
                "zoomMin {} is above zoomMax {}",
                self.zoom_min, self.zoom_max
            ));
        }
        Ok(())
    }
}

/// Timings of the fullscreen traversal, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    /// Video opacity 1 → 0 at the end of a clip.
    pub video_fade_ms: u32,
    /// Choice text fade-out once a line is picked.
    pub text_fade_ms: u32,
    /// How long unlinked transition text stays up before advancing.
    pub auto_advance_ms: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            video_fade_ms: 500,
            text_fade_ms: 500,
            auto_advance_ms: 2000,
        }
    }
}
