//! Canvas zoom and screen ↔ canvas coordinate conversion.

use crate::config::EditorConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    value: f32,
    min: f32,
    max: f32,
    step: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

impl Zoom {
    /// Falls back to the default range when `config` does not validate.
    pub fn from_config(config: &EditorConfig) -> Self {
        let fallback;
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("zoom: {e}, using the default range");
                fallback = EditorConfig::default();
                &fallback
            }
        };
        Self {
            value: 1.0f32.clamp(config.zoom_min, config.zoom_max),
            min: config.zoom_min,
            max: config.zoom_max,
            step: config.zoom_step,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Returns true when the factor changed.
    pub fn zoom_in(&mut self) -> bool {
        self.set(self.value + self.step)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.set(self.value - self.step)
    }

    pub fn reset(&mut self) -> bool {
        self.set(1.0)
    }

    /// Clamp into `[min, max]` and round to three decimals so repeated
    /// steps never accumulate float error.
    pub fn set(&mut self, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        let next = ((value * 1000.0).round() / 1000.0).clamp(self.min, self.max);
        if (next - self.value).abs() < f32::EPSILON {
            return false;
        }
        log::debug!("zoom {} -> {next}", self.value);
        self.value = next;
        true
    }

    /// Container pixels → logical canvas units.
    pub fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.value, y / self.value)
    }

    /// Logical canvas units → container pixels.
    pub fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.value, y * self.value)
    }
}
