//! Output settings shared by every stage of an export.

use crate::error::ExportError;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// libx264 constant rate factor (0 = lossless, 51 = worst).
    pub crf: u8,
    /// Length of a title card rendered from text.
    pub title_seconds: f32,
    pub sample_rate: u32,
    /// ffmpeg executable, looked up on `PATH` when not absolute.
    pub program: PathBuf,
    /// Where session directories are created. System temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            crf: 23,
            title_seconds: 3.0,
            sample_rate: 44_100,
            program: PathBuf::from("ffmpeg"),
            scratch_dir: None,
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.width == 0 || self.height == 0 {
            return Err(ExportError::InvalidConfig(
                "width/height must be non-zero".into(),
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(ExportError::InvalidConfig(
                "width/height must be even (required for yuv420p output)".into(),
            ));
        }
        if self.fps == 0 {
            return Err(ExportError::InvalidConfig("fps must be non-zero".into()));
        }
        if self.crf > 51 {
            return Err(ExportError::InvalidConfig(format!(
                "crf {} is outside 0..=51",
                self.crf
            )));
        }
        if !(self.title_seconds.is_finite() && self.title_seconds > 0.0) {
            return Err(ExportError::InvalidConfig(
                "title card duration must be positive".into(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(ExportError::InvalidConfig(
                "sample rate must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// `WxH`, as ffmpeg's `s=` option wants it.
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ExportConfig::default().validate().is_ok());
    }

    #[test]
    fn odd_dimensions_are_rejected() {
        let config = ExportConfig {
            width: 1281,
            ..ExportConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("even"));
    }

    #[test]
    fn zero_fps_and_bad_crf_are_rejected() {
        let zero_fps = ExportConfig {
            fps: 0,
            ..ExportConfig::default()
        };
        assert!(zero_fps.validate().is_err());
        let crf = ExportConfig {
            crf: 60,
            ..ExportConfig::default()
        };
        assert!(crf.validate().is_err());
    }
}
