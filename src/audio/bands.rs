use serde::Deserialize;
use std::ops::Range;

use super::spectrum::MagnitudeScale;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BandLayout {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_min_freq")]
    pub min_freq: f32,
    #[serde(default = "default_max_freq")]
    pub max_freq: f32,
}

impl Default for BandLayout {
    fn default() -> Self {
        Self {
            count: default_count(),
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
        }
    }
}

fn default_count() -> usize { 64 }
fn default_min_freq() -> f32 { 20.0 }
fn default_max_freq() -> f32 { 5000.0 }

/// Folds linear FFT bins into geometrically spaced bands.
///
/// Boundary `k` sits at `min_freq · base^k` with `base = (max/min)^(1/count)`.
/// A band's value is the maximum magnitude of its bins; a band with no bins
/// reads `0.0`.
pub struct BandMapper {
    layout: BandLayout,
    fft_size: usize,
    base: f32,
    /// Contiguous bin range per band, in band order.
    ranges: Vec<Range<usize>>,
}

impl BandMapper {
    pub fn new(layout: BandLayout, sample_rate: u32, fft_size: usize) -> Result<Self, PipelineError> {
        if layout.count == 0 {
            return Err(PipelineError::invalid("band count must be at least 1"));
        }
        if !(layout.min_freq.is_finite() && layout.max_freq.is_finite()) {
            return Err(PipelineError::invalid("band frequencies must be finite"));
        }
        if layout.min_freq <= 0.0 || layout.min_freq >= layout.max_freq {
            return Err(PipelineError::invalid(format!(
                "band range must satisfy 0 < min_freq < max_freq (got {} .. {})",
                layout.min_freq, layout.max_freq
            )));
        }
        if sample_rate == 0 {
            return Err(PipelineError::invalid("sample rate must be non-zero"));
        }
        if fft_size == 0 {
            return Err(PipelineError::invalid("fft size must be non-zero"));
        }

        let base = (layout.max_freq / layout.min_freq).powf(1.0 / layout.count as f32);
        let freqs = frequency_table(sample_rate, fft_size);
        let ranges = assign_bins(&freqs, layout.count, layout.min_freq, base);

        log::debug!(
            "Band mapper: {} bands over {:.1}-{:.1} Hz (base {:.4}), {} bins @ {:.2} Hz",
            layout.count,
            layout.min_freq,
            layout.max_freq,
            base,
            freqs.len(),
            sample_rate as f32 / fft_size as f32
        );

        Ok(Self {
            layout,
            fft_size,
            base,
            ranges,
        })
    }

    pub fn band_count(&self) -> usize {
        self.layout.count
    }

    /// Geometric band boundaries, `count + 1` values from `min_freq` up.
    pub fn cutoffs(&self) -> Vec<f32> {
        let mut cutoff = self.layout.min_freq;
        let mut cutoffs = Vec::with_capacity(self.layout.count + 1);
        for _ in 0..=self.layout.count {
            cutoffs.push(cutoff);
            cutoff *= self.base;
        }
        cutoffs
    }

    pub fn assignments(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub fn map(&self, spectrum: &[f32]) -> Result<Vec<f32>, PipelineError> {
        if spectrum.len() != self.fft_size {
            return Err(PipelineError::SizeMismatch {
                expected: self.fft_size,
                actual: spectrum.len(),
            });
        }

        let bands = self
            .ranges
            .iter()
            .map(|range| {
                if range.is_empty() {
                    0.0
                } else {
                    spectrum[range.clone()]
                        .iter()
                        .copied()
                        .fold(f32::NEG_INFINITY, f32::max)
                }
            })
            .collect();

        Ok(bands)
    }
}

/// Frequency of bin `i` is `sample_rate / fft_size · i`, first half only.
pub fn frequency_table(sample_rate: u32, fft_size: usize) -> Vec<f32> {
    let resolution = sample_rate as f32 / fft_size as f32;
    (0..fft_size / 2).map(|i| resolution * i as f32).collect()
}

/// Walk the bins in frequency order, advancing at most one band per bin
/// whenever a bin lies strictly above the running cutoff. The last band
/// absorbs everything left, including bins at or above `max_freq`.
fn assign_bins(freqs: &[f32], count: usize, min_freq: f32, base: f32) -> Vec<Range<usize>> {
    let mut ranges = Vec::with_capacity(count);
    let mut cutoff = min_freq;
    let mut start = 0;

    for (i, &freq) in freqs.iter().enumerate() {
        if freq > cutoff && ranges.len() < count - 1 {
            ranges.push(start..i);
            start = i;
            cutoff *= base;
        }
    }
    ranges.push(start..freqs.len());

    // Bins ran out before the bands did
    while ranges.len() < count {
        ranges.push(freqs.len()..freqs.len());
    }

    ranges
}

/// Scale one frame's bands into `[0, 1]` for display.
///
/// Linear magnitudes are divided by the frame peak (left as-is when the peak
/// is not positive). Decibel levels map `[floor_db, peak]` onto `[0, 1]`.
pub fn normalize(values: &mut [f32], scale: MagnitudeScale, floor_db: f32) {
    let peak = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if scale.is_decibel() {
        let span = peak - floor_db;
        if span > 0.0 {
            for v in values.iter_mut() {
                *v = ((*v - floor_db) / span).clamp(0.0, 1.0);
            }
        } else {
            values.iter_mut().for_each(|v| *v = 0.0);
        }
    } else if peak > 0.0 {
        for v in values.iter_mut() {
            *v /= peak;
        }
    }
}
