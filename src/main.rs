mod audio;
mod cli;
mod config;
mod error;
mod pipeline;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

use audio::capture::{self, Capture, CaptureSettings};
use cli::Cli;
use pipeline::{LoopSettings, PipelineSettings, SpectrumPipeline};
use render::headless::HeadlessRenderer;
use render::terminal::TerminalRenderer;
use render::Renderer;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        let default = capture::default_input_device_name();
        println!("Available input devices:");
        for name in capture::list_input_devices()? {
            let marker = if default.as_deref() == Some(name.as_str()) { "*" } else { " " };
            println!(" {} {}", marker, name);
        }
        return Ok(());
    }

    let config_path = cli.config.clone().or_else(config::discover_config);
    let mut cfg = match config_path {
        Some(ref path) => {
            let cfg = config::load_config(path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => config::Config::default(),
    };
    cli.merge_into(&mut cfg);

    log::info!("bandscope - real-time spectrum visualizer");
    log::info!(
        "Bands: {} over {:.0}-{:.0} Hz, window {:?}, scale {:?}, smoothness {}",
        cfg.bands.count,
        cfg.bands.min_freq,
        cfg.bands.max_freq,
        cfg.analysis.window,
        cfg.analysis.scale,
        cfg.display.smoothness
    );

    // Acquire: capture stream + ring, then analysis state, then display
    let capture = Capture::open(&CaptureSettings {
        device: cfg.capture.device.clone(),
        sample_rate: cfg.capture.sample_rate,
        buffer_size: cfg.capture.buffer_size,
    })
    .context("Failed to open audio capture")?;

    if cfg.capture.channel >= capture.ring().channels() {
        anyhow::bail!(
            "Channel {} not available on {} ({} channels)",
            cfg.capture.channel,
            capture.device_name(),
            capture.ring().channels()
        );
    }

    let mut pipeline = SpectrumPipeline::new(
        &PipelineSettings {
            window: cfg.analysis.window,
            scale: cfg.analysis.scale,
            db_floor: cfg.analysis.db_floor,
            bands: cfg.bands,
            smoothness: cfg.display.smoothness,
            normalize: cfg.display.normalize,
        },
        capture.sample_rate(),
        capture.buffer_size(),
    )
    .context("Invalid analysis settings")?;

    capture.start().context("Failed to start audio capture")?;

    let loop_settings = LoopSettings {
        channel: cfg.capture.channel,
        frame_interval: Duration::from_millis(cfg.display.frame_interval_ms),
        max_frames: cli.frames,
    };

    let mut renderer: Box<dyn Renderer> = if cli.headless {
        let per_second = 1000 / cfg.display.frame_interval_ms.max(1);
        Box::new(HeadlessRenderer::new(per_second))
    } else {
        Box::new(TerminalRenderer::new()?)
    };

    let result = pipeline::run(
        capture.ring(),
        capture.status(),
        &mut pipeline,
        &mut renderer,
        &loop_settings,
    );

    // Release in reverse order; the stream stops before the ring is freed
    drop(renderer);
    drop(pipeline);
    if let Err(err) = capture.stop() {
        log::warn!("{}", err);
    }
    drop(capture);

    let stats = result?;
    log::info!("Done after {} frames", stats.frames);
    Ok(())
}
