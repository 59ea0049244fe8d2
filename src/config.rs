use crate::display::Rgb;
use crate::pipeline::QualityHint;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Viewer settings, read from an optional JSON file and overridden from the
/// command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Quality requested for remote participants
    pub quality: QualityHint,
    pub preview_enabled: bool,
    /// Number of synthetic remote participants
    pub participants: u32,
    /// Local preview frame size
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: u32,
    pub background: Rgb,
    pub placeholder_text: String,
    pub window_width: f32,
    pub window_height: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            quality: QualityHint::default(),
            preview_enabled: true,
            participants: 2,
            frame_width: 640,
            frame_height: 480,
            fps: 30,
            background: Rgb::BLACK,
            placeholder_text: "Waiting for video...".to_string(),
            window_width: 960.0,
            window_height: 540.0,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ViewerConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            bail!("fps must be greater than zero");
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            bail!(
                "invalid preview frame size {}x{}",
                self.frame_width,
                self.frame_height
            );
        }
        if self.window_width <= 0.0 || self.window_height <= 0.0 {
            bail!(
                "invalid window size {}x{}",
                self.window_width,
                self.window_height
            );
        }
        Ok(())
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
