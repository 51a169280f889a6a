use anyhow::Result;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::bands::{self, BandLayout, BandMapper};
use crate::audio::ring::{SampleRing, Snapshot};
use crate::audio::smoothing::Smoother;
use crate::audio::spectrum::{MagnitudeScale, SpectralAnalyzer, WindowFunction};
use crate::audio::status::CaptureStatus;
use crate::error::PipelineError;
use crate::render::Renderer;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub window: WindowFunction,
    pub scale: MagnitudeScale,
    pub db_floor: f32,
    pub bands: BandLayout,
    pub smoothness: f32,
    pub normalize: bool,
}

/// Stateless analysis stages plus the smoother, the only cross-frame state.
pub struct SpectrumPipeline {
    analyzer: SpectralAnalyzer,
    mapper: BandMapper,
    smoother: Smoother,
    scale: MagnitudeScale,
    db_floor: f32,
    normalize: bool,
}

impl SpectrumPipeline {
    pub fn new(
        settings: &PipelineSettings,
        sample_rate: u32,
        fft_size: usize,
    ) -> Result<Self, PipelineError> {
        let analyzer = SpectralAnalyzer::new(fft_size, settings.window, settings.scale)?;
        let mapper = BandMapper::new(settings.bands, sample_rate, fft_size)?;
        let smoother = Smoother::new(mapper.band_count(), settings.smoothness)?;

        let empty = mapper.assignments().iter().filter(|r| r.is_empty()).count();
        if empty > 0 {
            log::warn!(
                "{} of {} bands get no bins at {} Hz / {} samples; they will stay dark",
                empty,
                mapper.band_count(),
                sample_rate,
                fft_size
            );
        }
        log::debug!("Band edges (Hz): {:?}", mapper.cutoffs());

        Ok(Self {
            analyzer,
            mapper,
            smoother,
            scale: settings.scale,
            db_floor: settings.db_floor,
            normalize: settings.normalize,
        })
    }

    /// Run one window through every stage. Each fallible stage runs before
    /// the smoother is touched, so a failed frame changes nothing.
    pub fn process(&mut self, samples: &[f32]) -> Result<&[f32], PipelineError> {
        let spectrum = self.analyzer.analyze(samples)?;
        let mut levels = self.mapper.map(&spectrum)?;
        if self.normalize {
            bands::normalize(&mut levels, self.scale, self.db_floor);
        }
        self.smoother.update(&levels)
    }

    pub fn bands(&self) -> &[f32] {
        self.smoother.values()
    }

    pub fn band_count(&self) -> usize {
        self.mapper.band_count()
    }

    /// Drop the smoothed history so the next frame starts from silence.
    pub fn reset(&mut self) {
        self.smoother.reset();
    }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub channel: usize,
    pub frame_interval: Duration,
    /// Stop after this many frames; `None` runs until the renderer quits.
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    /// Frames that had a full window to analyze.
    pub analyzed: u64,
    /// Frames that reused the previous bands while the ring filled.
    pub waiting: u64,
}

/// Fixed-cadence render loop. Returns when the renderer asks to stop, the
/// frame limit is reached, or a stage reports an error.
pub fn run<R: Renderer + ?Sized>(
    ring: &SampleRing,
    status: &CaptureStatus,
    pipeline: &mut SpectrumPipeline,
    renderer: &mut R,
    settings: &LoopSettings,
) -> Result<RunStats> {
    let mut stats = RunStats::default();

    log::info!(
        "Render loop: channel {}, {} bands, {:?} per frame",
        settings.channel,
        pipeline.band_count(),
        settings.frame_interval
    );

    loop {
        if settings.max_frames.is_some_and(|max| stats.frames >= max) {
            log::info!("Frame limit reached");
            break;
        }

        let frame_start = Instant::now();

        let report = status.take_report();
        if !report.is_clean() {
            log::warn!(
                "Capture faults: {} skipped, {} dropped, {} stream errors",
                report.skipped,
                report.dropped,
                report.stream_errors
            );
            if let Some(err) = report.last_error {
                log::warn!("Last stream error: {}", err);
            }
            // Levels from before a backend fault no longer describe the input
            if report.stream_errors > 0 {
                pipeline.reset();
            }
        }

        let bands = match ring.snapshot(settings.channel)? {
            Snapshot::Ready(samples) => {
                stats.analyzed += 1;
                pipeline.process(&samples)?
            }
            Snapshot::Insufficient {
                available,
                required,
            } => {
                stats.waiting += 1;
                log::trace!("Waiting for samples ({}/{})", available, required);
                pipeline.bands()
            }
        };

        stats.frames += 1;
        if !renderer.render(bands)? {
            log::info!("Renderer requested shutdown");
            break;
        }

        let deadline = frame_start + settings.frame_interval;
        let now = Instant::now();
        if now < deadline {
            thread::sleep(deadline - now);
        } else {
            log::debug!("Frame overran by {:?}", now - deadline);
        }
    }

    log::info!(
        "Render loop finished: {} frames ({} analyzed, {} waiting)",
        stats.frames,
        stats.analyzed,
        stats.waiting
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    struct Recorder {
        frames: Vec<Vec<f32>>,
        stop_after: usize,
    }

    impl Renderer for Recorder {
        fn render(&mut self, bands: &[f32]) -> Result<bool> {
            self.frames.push(bands.to_vec());
            Ok(self.frames.len() < self.stop_after)
        }
    }

    fn settings(count: usize, smoothness: f32) -> PipelineSettings {
        PipelineSettings {
            window: WindowFunction::Hann,
            scale: MagnitudeScale::Linear,
            db_floor: -80.0,
            bands: BandLayout {
                count,
                min_freq: 20.0,
                max_freq: 5_000.0,
            },
            smoothness,
            normalize: true,
        }
    }

    fn loop_settings(max_frames: Option<u64>) -> LoopSettings {
        LoopSettings {
            channel: 0,
            frame_interval: Duration::from_millis(1),
            max_frames,
        }
    }

    fn sine(freq: f32, rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate).sin())
            .collect()
    }

    #[test]
    fn sine_lights_up_one_band() {
        let mut pipeline = SpectrumPipeline::new(&settings(16, 1.0), 48_000, 1024).unwrap();
        let bands = pipeline.process(&sine(1_000.0, 48_000.0, 1024)).unwrap().to_vec();

        assert_eq!(bands.len(), 16);
        let peak = bands.iter().copied().fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-6);

        let mapper = BandMapper::new(settings(16, 1.0).bands, 48_000, 1024).unwrap();
        let bin = (1_000.0f32 * 1024.0 / 48_000.0).round() as usize;
        let band = mapper
            .assignments()
            .iter()
            .position(|r| r.contains(&bin))
            .unwrap();
        assert!((bands[band] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn failed_frame_keeps_smoother_state() {
        let mut pipeline = SpectrumPipeline::new(&settings(8, 2.0), 48_000, 256).unwrap();
        pipeline.process(&sine(440.0, 48_000.0, 256)).unwrap();
        let before = pipeline.bands().to_vec();

        assert!(pipeline.process(&[0.0; 100]).is_err());
        assert!(pipeline.process(&[]).is_err());
        assert_eq!(pipeline.bands(), before.as_slice());
    }

    #[test]
    fn silence_stays_at_zero() {
        let mut pipeline = SpectrumPipeline::new(&settings(8, 6.0), 48_000, 64).unwrap();
        let bands = pipeline.process(&[0.0; 64]).unwrap();
        assert!(bands.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn stops_when_renderer_declines() {
        let ring = SampleRing::new(1, 64).unwrap();
        ring.push(0, &sine(2_000.0, 48_000.0, 64)).unwrap();
        let status = CaptureStatus::new();
        let mut pipeline = SpectrumPipeline::new(&settings(4, 6.0), 48_000, 64).unwrap();
        let mut renderer = Recorder {
            frames: Vec::new(),
            stop_after: 3,
        };

        let stats = run(&ring, &status, &mut pipeline, &mut renderer, &loop_settings(None)).unwrap();

        assert_eq!(stats, RunStats { frames: 3, analyzed: 3, waiting: 0 });
        assert_eq!(renderer.frames.len(), 3);
        assert!(renderer.frames.iter().all(|f| f.len() == 4));
    }

    #[test]
    fn waits_for_a_full_window() {
        let ring = SampleRing::new(1, 64).unwrap();
        ring.push(0, &[0.5; 10]).unwrap();
        let status = CaptureStatus::new();
        let mut pipeline = SpectrumPipeline::new(&settings(4, 6.0), 48_000, 64).unwrap();
        let mut renderer = Recorder {
            frames: Vec::new(),
            stop_after: usize::MAX,
        };

        let stats = run(&ring, &status, &mut pipeline, &mut renderer, &loop_settings(Some(5))).unwrap();

        assert_eq!(stats, RunStats { frames: 5, analyzed: 0, waiting: 5 });
        assert!(renderer.frames.iter().all(|f| f == &vec![0.0; 4]));
    }

    #[test]
    fn drains_capture_faults_each_frame() {
        let ring = SampleRing::new(1, 8).unwrap();
        let status = CaptureStatus::new();
        status.record_skipped();
        status.record_stream_error("xrun");
        let mut pipeline = SpectrumPipeline::new(&settings(2, 1.0), 48_000, 8).unwrap();
        let mut renderer = Recorder {
            frames: Vec::new(),
            stop_after: 1,
        };

        run(&ring, &status, &mut pipeline, &mut renderer, &loop_settings(None)).unwrap();
        assert!(status.take_report().is_clean());
    }

    #[test]
    fn stream_error_clears_previous_levels() {
        let ring = SampleRing::new(1, 64).unwrap();
        let status = CaptureStatus::new();
        let mut pipeline = SpectrumPipeline::new(&settings(4, 6.0), 48_000, 64).unwrap();
        pipeline.process(&sine(2_000.0, 48_000.0, 64)).unwrap();
        assert!(pipeline.bands().iter().any(|&v| v > 0.0));

        status.record_stream_error("device unplugged");
        let mut renderer = Recorder {
            frames: Vec::new(),
            stop_after: 1,
        };
        run(&ring, &status, &mut pipeline, &mut renderer, &loop_settings(None)).unwrap();

        assert_eq!(renderer.frames, vec![vec![0.0; 4]]);
    }

    #[test]
    fn skipped_bursts_keep_previous_levels() {
        let ring = SampleRing::new(1, 64).unwrap();
        let status = CaptureStatus::new();
        let mut pipeline = SpectrumPipeline::new(&settings(4, 6.0), 48_000, 64).unwrap();
        pipeline.process(&sine(2_000.0, 48_000.0, 64)).unwrap();
        let before = pipeline.bands().to_vec();

        status.record_skipped();
        let mut renderer = Recorder {
            frames: Vec::new(),
            stop_after: 1,
        };
        run(&ring, &status, &mut pipeline, &mut renderer, &loop_settings(None)).unwrap();

        assert_eq!(renderer.frames, vec![before]);
    }

    #[test]
    fn bad_channel_aborts_the_loop() {
        let ring = SampleRing::new(1, 8).unwrap();
        let status = CaptureStatus::new();
        let mut pipeline = SpectrumPipeline::new(&settings(2, 1.0), 48_000, 8).unwrap();
        let mut renderer = Recorder {
            frames: Vec::new(),
            stop_after: 10,
        };
        let settings = LoopSettings {
            channel: 2,
            ..loop_settings(None)
        };

        assert!(run(&ring, &status, &mut pipeline, &mut renderer, &settings).is_err());
        assert!(renderer.frames.is_empty());
    }
}
