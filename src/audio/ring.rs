use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::status::CaptureStatus;
use crate::error::PipelineError;

/// Result of asking the ring for an analysis window.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// Exactly `buffer_size` samples, oldest first.
    Ready(Vec<f32>),
    /// The channel has not filled up yet.
    Insufficient { available: usize, required: usize },
}

/// Outcome of a realtime push attempt.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed { frames: usize },
    /// The burst carried no frames; the ring is unchanged.
    Skipped,
    /// The lock was busy and the burst was discarded.
    Dropped,
}

/// Per-channel sample FIFO shared between the audio callback (sole writer)
/// and the render loop (sole reader).
///
/// The mutex is held only for eviction + append or for the copy-out. Each
/// channel deque is allocated up front at `buffer_size`, so the producer never
/// reallocates while holding the lock.
pub struct SampleRing {
    channels: Mutex<Vec<VecDeque<f32>>>,
    channel_count: usize,
    buffer_size: usize,
    status: Arc<CaptureStatus>,
}

impl SampleRing {
    pub fn new(channel_count: usize, buffer_size: usize) -> Result<Self, PipelineError> {
        Self::with_status(channel_count, buffer_size, Arc::new(CaptureStatus::new()))
    }

    pub fn with_status(
        channel_count: usize,
        buffer_size: usize,
        status: Arc<CaptureStatus>,
    ) -> Result<Self, PipelineError> {
        if channel_count == 0 {
            return Err(PipelineError::invalid("ring needs at least one channel"));
        }
        if buffer_size == 0 {
            return Err(PipelineError::invalid("ring buffer size must be non-zero"));
        }

        let channels = (0..channel_count)
            .map(|_| VecDeque::with_capacity(buffer_size))
            .collect();

        Ok(Self {
            channels: Mutex::new(channels),
            channel_count,
            buffer_size,
            status,
        })
    }

    pub fn channels(&self) -> usize {
        self.channel_count
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[cfg(test)]
    pub fn status(&self) -> &Arc<CaptureStatus> {
        &self.status
    }

    /// Number of samples currently held for `channel`.
    #[cfg(test)]
    pub fn len(&self, channel: usize) -> Result<usize, PipelineError> {
        self.check_channel(channel)?;
        Ok(self.channels.lock()[channel].len())
    }

    /// Append `frames` to one channel, evicting the oldest samples first.
    #[allow(dead_code)]
    pub fn push(&self, channel: usize, frames: &[f32]) -> Result<(), PipelineError> {
        self.check_channel(channel)?;
        if frames.is_empty() {
            self.status.record_skipped();
            return Ok(());
        }

        let mut channels = self.channels.lock();
        append_evicting(
            &mut channels[channel],
            self.buffer_size,
            frames.len(),
            frames.iter().copied(),
        );
        Ok(())
    }

    /// Realtime entry point for the audio callback.
    ///
    /// `data` is interleaved across all ring channels. The lock is only tried,
    /// never waited on: if the reader holds it the whole burst is dropped.
    /// A trailing partial frame is ignored.
    pub fn try_push_interleaved<T, F>(&self, data: &[T], to_f32: F) -> PushOutcome
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        let frames = data.len() / self.channel_count;
        if frames == 0 {
            self.status.record_skipped();
            return PushOutcome::Skipped;
        }

        let Some(mut channels) = self.channels.try_lock() else {
            self.status.record_dropped();
            return PushOutcome::Dropped;
        };

        let stride = self.channel_count;
        for (index, buffer) in channels.iter_mut().enumerate() {
            let samples = data[..frames * stride]
                .iter()
                .skip(index)
                .step_by(stride)
                .map(|&s| to_f32(s));
            append_evicting(buffer, self.buffer_size, frames, samples);
        }

        PushOutcome::Pushed { frames }
    }

    /// Copy out the current window, or report that it is not full yet.
    pub fn snapshot(&self, channel: usize) -> Result<Snapshot, PipelineError> {
        self.check_channel(channel)?;
        let channels = self.channels.lock();
        let buffer = &channels[channel];

        if buffer.len() < self.buffer_size {
            return Ok(Snapshot::Insufficient {
                available: buffer.len(),
                required: self.buffer_size,
            });
        }

        Ok(Snapshot::Ready(buffer.iter().copied().collect()))
    }

    fn check_channel(&self, channel: usize) -> Result<(), PipelineError> {
        if channel >= self.channel_count {
            return Err(PipelineError::invalid(format!(
                "channel {} out of range (ring has {})",
                channel, self.channel_count
            )));
        }
        Ok(())
    }
}

/// Evict `len + incoming - capacity` of the oldest samples, then append.
/// Bursts longer than the capacity only keep their newest `capacity` samples.
fn append_evicting<I>(buffer: &mut VecDeque<f32>, capacity: usize, incoming: usize, samples: I)
where
    I: Iterator<Item = f32>,
{
    let kept = incoming.min(capacity);
    let overflow = (buffer.len() + kept).saturating_sub(capacity);
    buffer.drain(..overflow);
    buffer.extend(samples.skip(incoming - kept));
}
