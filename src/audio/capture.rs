use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, SupportedBufferSize, SupportedStreamConfig};
use std::sync::Arc;
use thiserror::Error;

use super::ring::SampleRing;
use super::status::CaptureStatus;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No default input device configured")]
    NoDefaultDevice,

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enumerate input devices: {0}")]
    Enumeration(String),

    #[error("Failed to get device config: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to build audio stream: {0}")]
    BuildStream(String),

    #[error("Failed to start stream: {0}")]
    Play(String),

    #[error("Failed to pause stream: {0}")]
    Pause(String),
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Exact device name; `None` picks the host default.
    pub device: Option<String>,
    /// Preferred rate. Falls back to the device default when unsupported.
    pub sample_rate: u32,
    /// Analysis window length per channel.
    pub buffer_size: usize,
}

/// Live input stream feeding a [`SampleRing`].
///
/// The callback owns its own `Arc<SampleRing>`. `stream` is declared first so
/// it is dropped (and its callback thread stopped) before the ring handle.
pub struct Capture {
    stream: cpal::Stream,
    ring: Arc<SampleRing>,
    status: Arc<CaptureStatus>,
    device_name: String,
    sample_rate: u32,
}

impl Capture {
    /// Open an input stream. The stream is built paused; call [`Capture::start`].
    pub fn open(settings: &CaptureSettings) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        log::info!("Audio host: {:?}", host.id());

        let device = match settings.device.as_deref() {
            Some(name) => find_input_device(&host, name)?,
            None => host
                .default_input_device()
                .ok_or(CaptureError::NoDefaultDevice)?,
        };
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = choose_config(&device, settings.sample_rate)?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        match config.buffer_size() {
            SupportedBufferSize::Range { min, max } => {
                log::debug!("Backend callback size: {}..={} frames", min, max)
            }
            SupportedBufferSize::Unknown => log::debug!("Backend callback size: unknown"),
        }

        let status = Arc::new(CaptureStatus::new());
        let ring = Arc::new(
            SampleRing::with_status(channels, settings.buffer_size, Arc::clone(&status))
                .map_err(|e| CaptureError::Config(e.to_string()))?,
        );

        let stream = match config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, &ring, &status),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, &ring, &status),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, &ring, &status),
            other => return Err(CaptureError::UnsupportedFormat(format!("{:?}", other))),
        }
        .map_err(|e| CaptureError::BuildStream(e.to_string()))?;

        log::info!(
            "Capture device: {} @ {}Hz, {} channels, {:?}, window {} samples",
            device_name,
            sample_rate,
            channels,
            config.sample_format(),
            settings.buffer_size
        );

        Ok(Self {
            stream,
            ring,
            status,
            device_name,
            sample_rate,
        })
    }

    pub fn start(&self) -> Result<(), CaptureError> {
        self.stream
            .play()
            .map_err(|e| CaptureError::Play(e.to_string()))?;
        log::info!("Audio capture started");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), CaptureError> {
        self.stream
            .pause()
            .map_err(|e| CaptureError::Pause(e.to_string()))
    }

    pub fn ring(&self) -> &SampleRing {
        &self.ring
    }

    pub fn status(&self) -> &CaptureStatus {
        &self.status
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.ring.buffer_size()
    }
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Enumeration(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

pub fn default_input_device_name() -> Option<String> {
    cpal::default_host()
        .default_input_device()
        .and_then(|d| d.name().ok())
}

fn find_input_device(host: &cpal::Host, name: &str) -> Result<Device, CaptureError> {
    host.input_devices()
        .map_err(|e| CaptureError::Enumeration(e.to_string()))?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))
}

fn choose_config(device: &Device, sample_rate: u32) -> Result<SupportedStreamConfig, CaptureError> {
    let fallback = device
        .default_input_config()
        .map_err(|e| CaptureError::Config(e.to_string()))?;

    if fallback.sample_rate().0 == sample_rate {
        return Ok(fallback);
    }

    let ranges = device
        .supported_input_configs()
        .map_err(|e| CaptureError::Config(e.to_string()))?;

    let matching = ranges
        .filter(|r| r.min_sample_rate().0 <= sample_rate && sample_rate <= r.max_sample_rate().0)
        .max_by_key(|r| (r.sample_format() == SampleFormat::F32, r.channels()));

    match matching {
        Some(range) => Ok(range.with_sample_rate(SampleRate(sample_rate))),
        None => {
            log::warn!(
                "Device does not support {}Hz, using {}Hz",
                sample_rate,
                fallback.sample_rate().0
            );
            Ok(fallback)
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &SupportedStreamConfig,
    ring: &Arc<SampleRing>,
    status: &Arc<CaptureStatus>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let ring = Arc::clone(ring);
    let errors = Arc::clone(status);

    device.build_input_stream(
        &config.config(),
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            ring.try_push_interleaved(data, <f32 as cpal::Sample>::from_sample);
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
            errors.record_stream_error(err.to_string());
        },
        None,
    )
}
