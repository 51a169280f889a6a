use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Deserialize;
use std::f32::consts::PI;
use std::sync::Arc;

use crate::error::PipelineError;

/// Smallest magnitude fed to the logarithm, so silence maps to a finite level.
const MIN_MAGNITUDE: f32 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WindowFunction {
    /// Raised cosine, zero at both ends
    #[default]
    Hann,
    /// No weighting
    Rectangular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MagnitudeScale {
    /// sqrt(re² + im²)
    #[default]
    Linear,
    /// 10·log10(magnitude)
    PowerDb,
    /// 20·log10(magnitude)
    AmplitudeDb,
}

impl MagnitudeScale {
    pub fn db_factor(self) -> Option<f32> {
        match self {
            Self::Linear => None,
            Self::PowerDb => Some(10.0),
            Self::AmplitudeDb => Some(20.0),
        }
    }

    pub fn is_decibel(self) -> bool {
        self.db_factor().is_some()
    }
}

/// Windowed forward DFT of one ring snapshot.
///
/// Returns all `fft_size` bins. For real input the upper half mirrors the
/// lower half; dropping it is left to the consumer.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    scale: MagnitudeScale,
}

impl SpectralAnalyzer {
    pub fn new(
        fft_size: usize,
        window: WindowFunction,
        scale: MagnitudeScale,
    ) -> Result<Self, PipelineError> {
        if fft_size == 0 {
            return Err(PipelineError::invalid("fft size must be non-zero"));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window = match window {
            WindowFunction::Hann => hann_window(fft_size),
            WindowFunction::Rectangular => vec![1.0; fft_size],
        };

        Ok(Self {
            fft,
            fft_size,
            window,
            scale,
        })
    }

    pub fn analyze(&self, samples: &[f32]) -> Result<Vec<f32>, PipelineError> {
        if samples.is_empty() {
            return Err(PipelineError::invalid("cannot analyze an empty window"));
        }
        if samples.len() != self.fft_size {
            return Err(PipelineError::SizeMismatch {
                expected: self.fft_size,
                actual: samples.len(),
            });
        }

        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let magnitudes = buffer.iter().map(|c| c.norm());
        let spectrum = match self.scale.db_factor() {
            None => magnitudes.collect(),
            Some(k) => magnitudes.map(|m| k * m.max(MIN_MAGNITUDE).log10()).collect(),
        };

        Ok(spectrum)
    }
}

/// Hann coefficients `0.5 - 0.5·cos(2πi/(n-1))`.
pub fn hann_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / (size - 1) as f32).cos())
        .collect()
}
