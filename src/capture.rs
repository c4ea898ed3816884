//! Audio sources feeding a [`DelayMeter`]
//!
//! Two kinds of producers are provided:
//! - [`DeviceCapture`]: one cpal input stream per channel, first device
//!   channel only, converted to `f32`
//! - [`Simulation`]: two threads replaying the same noise sequence with a
//!   known offset, each with its own block size
//!
//! Both push frames from their own threads; the meter serializes appends.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Host, Sample, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig,
};
use delaymeter_core::{Channel, DelayMeter, NoiseGenerator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Target name announced by the simulator
pub const SIMULATED_TARGET_NAME: &str = "Simulated target";

/// Errors that can occur while opening capture devices
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No default input device")]
    NoDefaultInput,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device '{device}' delivers unsupported {format:?} samples")]
    UnsupportedFormat { device: String, format: SampleFormat },
}

/// Information about an input device
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    pub input_channels: u16,
    pub sample_rates: Vec<u32>,
}

/// List input devices of the default host
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let mut devices = Vec::new();

    for device in host.input_devices()? {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let input_channels = device
            .default_input_config()
            .map(|c| c.channels())
            .unwrap_or(0);

        let common_rates = [8000, 16000, 32000, 44100, 48000, 88200, 96000, 192000];
        let mut sample_rates = Vec::new();
        if let Ok(configs) = device.supported_input_configs() {
            for config in configs {
                for &rate in &common_rates {
                    if (config.min_sample_rate().0..=config.max_sample_rate().0).contains(&rate)
                        && !sample_rates.contains(&rate)
                    {
                        sample_rates.push(rate);
                    }
                }
            }
        }
        sample_rates.sort();

        devices.push(DeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            input_channels,
            sample_rates,
        });
    }

    Ok(devices)
}

/// Resolve an input device by name, or the default input for `None`
fn find_input_device(host: &Host, name: Option<&str>) -> Result<Device> {
    let device = match name {
        None => host
            .default_input_device()
            .ok_or(CaptureError::NoDefaultInput)?,
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
    };
    Ok(device)
}

/// Open and start a stream that appends the device's first channel
fn open_input(device: &Device, meter: &Arc<DelayMeter>, channel: Channel) -> Result<Stream> {
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let default = device.default_input_config()?;
    let sample_rate = meter.sample_rate();
    let config = StreamConfig {
        channels: default.channels(),
        sample_rate: SampleRate(sample_rate),
        buffer_size: BufferSize::Default,
    };

    tracing::info!(
        %channel,
        device = %name,
        channels = config.channels,
        format = ?default.sample_format(),
        sample_rate,
        "Opening input stream"
    );

    let stream = match default.sample_format() {
        SampleFormat::F32 => build_input::<f32>(device, &config, meter, channel),
        SampleFormat::I16 => build_input::<i16>(device, &config, meter, channel),
        SampleFormat::U16 => build_input::<u16>(device, &config, meter, channel),
        SampleFormat::I32 => build_input::<i32>(device, &config, meter, channel),
        format => {
            return Err(CaptureError::UnsupportedFormat {
                device: name,
                format,
            }
            .into())
        }
    }
    .with_context(|| format!("failed to open '{}' at {} Hz", name, sample_rate))?;

    stream.play()?;
    Ok(stream)
}

/// Build an input stream converting the first channel of `T` samples to `f32`
fn build_input<T>(
    device: &Device,
    config: &StreamConfig,
    meter: &Arc<DelayMeter>,
    channel: Channel,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let num_channels = (config.channels as usize).max(1);
    let data_meter = Arc::clone(meter);
    let error_meter = Arc::clone(meter);
    let mut mono: Vec<f32> = Vec::new();
    let mut started = false;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            mono.clear();
            mono.extend(
                data.chunks(num_channels)
                    .filter_map(|f| f.first())
                    .map(|&s| f32::from_sample(s)),
            );

            if !started {
                started = true;
                let peak = mono.iter().map(|x| x.abs()).fold(0.0f32, f32::max);
                tracing::info!(%channel, frames = mono.len(), peak, "Input callback started");
            }

            data_meter.append(channel, &mono);
        },
        move |err| {
            tracing::error!(%channel, error = %err, "Input stream error");
            if channel == Channel::Target {
                error_meter.set_target_available(false);
            }
        },
        None,
    )?;
    Ok(stream)
}

/// Running device capture for both channels
///
/// Streams stop when this is dropped.
pub struct DeviceCapture {
    _reference: Stream,
    target_stream: Option<Stream>,
    reference_name: String,
    target_name: String,
}

impl DeviceCapture {
    /// Open the reference and target inputs and select the target on `meter`
    ///
    /// `None` picks the default input device. The reference input must open;
    /// a target that cannot be found or opened is selected but marked
    /// unavailable, so measurements report it instead of failing here.
    pub fn start(
        meter: &Arc<DelayMeter>,
        reference: Option<&str>,
        target: Option<&str>,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let reference_device = find_input_device(&host, reference)?;
        let reference_name = reference_device
            .name()
            .unwrap_or_else(|_| "Unknown".to_string());
        let reference_stream = open_input(&reference_device, meter, Channel::Reference)?;

        let (target_name, target_stream) = match find_input_device(&host, target) {
            Ok(device) => {
                let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                meter.set_target_identity(&name);
                match open_input(&device, meter, Channel::Target) {
                    Ok(stream) => (name, Some(stream)),
                    Err(e) => {
                        tracing::warn!(target_name = %name, error = %e, "Target input unavailable");
                        meter.set_target_available(false);
                        (name, None)
                    }
                }
            }
            Err(e) => {
                let name = target.unwrap_or("default input").to_string();
                tracing::warn!(target_name = %name, error = %e, "Target input unavailable");
                meter.set_target_identity(&name);
                meter.set_target_available(false);
                (name, None)
            }
        };

        tracing::info!(
            reference = %reference_name,
            target = %target_name,
            target_open = target_stream.is_some(),
            "Device capture started"
        );

        Ok(Self {
            _reference: reference_stream,
            target_stream,
            reference_name,
            target_name,
        })
    }

    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// True if the target stream is running
    pub fn target_open(&self) -> bool {
        self.target_stream.is_some()
    }
}

/// Settings for the simulated source pair
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Offset of the target (positive: target lags reference)
    pub delay_ms: f64,
    /// Seed of the shared program noise
    pub seed: u32,
    /// Amplitude of independent noise added to the target
    pub noise_level: f32,
    /// Frames per reference append
    pub reference_block: usize,
    /// Frames per target append
    pub target_block: usize,
    /// Pace appends at the sample rate instead of running flat out
    pub realtime: bool,
    /// Stop after this many frames per channel
    pub frame_limit: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delay_ms: 0.0,
            seed: 0x00C0_FFEE,
            noise_level: 0.02,
            reference_block: 480,
            target_block: 256,
            realtime: true,
            frame_limit: None,
        }
    }
}

impl SimulationConfig {
    /// Offset in whole samples at `sample_rate`
    pub fn delay_samples(&self, sample_rate: u32) -> i64 {
        (self.delay_ms * sample_rate as f64 / 1000.0).round() as i64
    }
}

/// One producer thread's view of the shared sequence
struct Producer {
    channel: Channel,
    source: NoiseGenerator,
    noise: Option<NoiseGenerator>,
    lead_in: usize,
    block: usize,
}

impl Producer {
    fn next_sample(&mut self) -> f32 {
        let mut sample = if self.lead_in > 0 {
            self.lead_in -= 1;
            0.0
        } else {
            self.source.next_sample()
        };
        if let Some(noise) = self.noise.as_mut() {
            sample += noise.next_sample();
        }
        sample
    }

    fn run(
        mut self,
        meter: Arc<DelayMeter>,
        running: Arc<AtomicBool>,
        realtime: bool,
        frame_limit: Option<usize>,
    ) {
        let sample_rate = meter.sample_rate() as f64;
        let started = Instant::now();
        let mut produced = 0usize;
        let mut buffer = vec![0.0f32; self.block.max(1)];

        while running.load(Ordering::Relaxed) {
            let frames = match frame_limit {
                Some(limit) => buffer.len().min(limit.saturating_sub(produced)),
                None => buffer.len(),
            };
            if frames == 0 {
                break;
            }

            for sample in buffer[..frames].iter_mut() {
                *sample = self.next_sample();
            }
            meter.append(self.channel, &buffer[..frames]);
            produced += frames;

            if realtime {
                let due = Duration::from_secs_f64(produced as f64 / sample_rate);
                if let Some(wait) = due.checked_sub(started.elapsed()) {
                    std::thread::sleep(wait);
                }
            }
        }

        tracing::debug!(channel = %self.channel, produced, "Simulated producer finished");
    }
}

/// Simulated reference and target producers
///
/// Threads stop when this is dropped.
pub struct Simulation {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    delay_samples: i64,
}

impl Simulation {
    /// Spawn both producers and select the simulated target on `meter`
    pub fn start(meter: &Arc<DelayMeter>, config: SimulationConfig) -> Result<Self> {
        let delay_samples = config.delay_samples(meter.sample_rate());
        let offset = delay_samples.unsigned_abs() as usize;

        let reference = Producer {
            channel: Channel::Reference,
            source: NoiseGenerator::new(config.seed),
            noise: None,
            lead_in: 0,
            block: config.reference_block,
        };

        let mut target_source = NoiseGenerator::new(config.seed);
        if delay_samples < 0 {
            // Target leads: skip ahead in the shared sequence
            for _ in 0..offset {
                target_source.next_sample();
            }
        }
        let target = Producer {
            channel: Channel::Target,
            source: target_source,
            noise: (config.noise_level > 0.0).then(|| {
                NoiseGenerator::new(config.seed ^ 0x5A5A_5A5A)
                    .with_smoothing(0.0)
                    .with_amplitude(config.noise_level)
            }),
            lead_in: if delay_samples > 0 { offset } else { 0 },
            block: config.target_block,
        };

        meter.set_target_identity(SIMULATED_TARGET_NAME);

        let running = Arc::new(AtomicBool::new(true));
        let mut handles = Vec::with_capacity(2);
        for producer in [reference, target] {
            let meter = Arc::clone(meter);
            let running = Arc::clone(&running);
            let realtime = config.realtime;
            let frame_limit = config.frame_limit;
            let handle = std::thread::Builder::new()
                .name(format!("sim-{}", producer.channel))
                .spawn(move || producer.run(meter, running, realtime, frame_limit))
                .context("failed to spawn simulated producer")?;
            handles.push(handle);
        }

        tracing::info!(
            delay_ms = config.delay_ms,
            delay_samples,
            reference_block = config.reference_block,
            target_block = config.target_block,
            "Simulation started"
        );

        Ok(Self {
            running,
            handles,
            delay_samples,
        })
    }

    /// Offset applied to the target, in samples
    pub fn delay_samples(&self) -> i64 {
        self.delay_samples
    }

    /// Block until both producers reach their frame limit
    ///
    /// Never returns for an unlimited simulation unless stopped elsewhere.
    pub fn wait(mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Simulated producer panicked");
            }
        }
    }

    /// Stop both producers and wait for them
    pub fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        self.wait();
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
