use clap::Parser;
use std::path::PathBuf;

use crate::audio::spectrum::{MagnitudeScale, WindowFunction};
use crate::config::Config;

/// Flags left unset fall back to the config file, then to built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "bandscope", about = "Real-time audio spectrum visualizer")]
pub struct Cli {
    /// Config file (default: ./bandscope.toml or ~/.config/bandscope/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Input device name (exact match)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Preferred sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Analysis window length in samples
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Input channel to analyze
    #[arg(long)]
    pub channel: Option<usize>,

    /// Number of display bands
    #[arg(short, long)]
    pub bands: Option<usize>,

    /// Lowest band edge in Hz
    #[arg(long)]
    pub min_freq: Option<f32>,

    /// Highest band edge in Hz
    #[arg(long)]
    pub max_freq: Option<f32>,

    /// Frame-to-frame smoothing divisor (>= 1)
    #[arg(short, long)]
    pub smoothness: Option<f32>,

    /// Magnitude scale
    #[arg(long, value_enum)]
    pub scale: Option<MagnitudeScale>,

    /// Disable the Hann window
    #[arg(long)]
    pub no_window: bool,

    /// Disable per-frame peak normalization
    #[arg(long)]
    pub no_normalize: bool,

    /// Target frame interval in milliseconds
    #[arg(long)]
    pub frame_interval_ms: Option<u64>,

    /// Log a summary instead of drawing bars
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,
}

impl Cli {
    /// Apply flags that were given on top of the loaded config.
    pub fn merge_into(&self, config: &mut Config) {
        if let Some(ref device) = self.device {
            config.capture.device = Some(device.clone());
        }
        if let Some(v) = self.sample_rate { config.capture.sample_rate = v; }
        if let Some(v) = self.buffer_size { config.capture.buffer_size = v; }
        if let Some(v) = self.channel { config.capture.channel = v; }
        if let Some(v) = self.bands { config.bands.count = v; }
        if let Some(v) = self.min_freq { config.bands.min_freq = v; }
        if let Some(v) = self.max_freq { config.bands.max_freq = v; }
        if let Some(v) = self.smoothness { config.display.smoothness = v; }
        if let Some(v) = self.scale { config.analysis.scale = v; }
        if let Some(v) = self.frame_interval_ms { config.display.frame_interval_ms = v; }
        if self.no_window {
            config.analysis.window = WindowFunction::Rectangular;
        }
        if self.no_normalize {
            config.display.normalize = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "bandscope",
            "--bands",
            "32",
            "--scale",
            "power-db",
            "--no-window",
            "--device",
            "Line In",
        ]);
        let mut config = Config::default();
        cli.merge_into(&mut config);

        assert_eq!(config.bands.count, 32);
        assert_eq!(config.analysis.scale, MagnitudeScale::PowerDb);
        assert_eq!(config.analysis.window, WindowFunction::Rectangular);
        assert_eq!(config.capture.device.as_deref(), Some("Line In"));
        assert_eq!(config.capture.buffer_size, 1024);
    }

    #[test]
    fn unset_flags_keep_config_values() {
        let cli = Cli::parse_from(["bandscope"]);
        let mut config = crate::config::parse_config("[display]\nsmoothness = 3.0\n").unwrap();
        cli.merge_into(&mut config);

        assert_eq!(config.display.smoothness, 3.0);
        assert!(config.display.normalize);
        assert_eq!(config.analysis.window, WindowFunction::Hann);
    }
}
