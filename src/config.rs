use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::bands::BandLayout;
use crate::audio::spectrum::{MagnitudeScale, WindowFunction};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub bands: BandLayout,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub channel: usize,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub window: WindowFunction,
    #[serde(default)]
    pub scale: MagnitudeScale,
    #[serde(default = "default_db_floor")]
    pub db_floor: f32,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_smoothness")]
    pub smoothness: f32,
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            channel: 0,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window: WindowFunction::default(),
            scale: MagnitudeScale::default(),
            db_floor: default_db_floor(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            smoothness: default_smoothness(),
            normalize: default_normalize(),
        }
    }
}

fn default_sample_rate() -> u32 { 48000 }
fn default_buffer_size() -> usize { 1024 }
fn default_db_floor() -> f32 { -80.0 }
fn default_frame_interval_ms() -> u64 { 16 }
fn default_smoothness() -> f32 { 6.0 }
fn default_normalize() -> bool { true }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

/// `./bandscope.toml`, then `~/.config/bandscope/config.toml`, then the
/// platform config directory.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("bandscope.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("bandscope").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("bandscope").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
