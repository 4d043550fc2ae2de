//! # Audio Capture Module
//!
//! Captures microphone input with CPAL (Cross-Platform Audio Library) and
//! delivers it as PCM16LE mono byte chunks, the format the detection core
//! consumes.
//!
//! ## Features
//! - Default or named input device selection
//! - Prefers mono 16-bit input at the requested rate, converts anything else
//! - Bounded hand-off: chunks are dropped with a warning when the consumer lags

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::{Sender, TrySendError};
use anyhow::{Context, Result, anyhow};

/// Number of chunks the capture callback may queue ahead of the consumer.
pub const CHUNK_QUEUE_CAPACITY: usize = 64;

/// Lists the names of all available input devices.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("failed to enumerate input devices")?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Starts audio capture and streams PCM16LE chunks into `sender`.
///
/// # Arguments
/// * `sender` - Bounded channel the chunks are pushed into with `try_send`
/// * `sample_rate` - Requested sample rate in Hz
/// * `device_name` - Input device to open; the default device when `None`
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and the actual sample rate
/// * `Err(e)` - No device or no usable configuration
pub fn start_audio_capture(
    sender: Sender<Vec<u8>>,
    sample_rate: u32,
    device_name: Option<&str>,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| anyhow!("Input device '{}' not found", wanted))?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?,
    };

    log::info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, sample_rate)
        .ok_or_else(|| anyhow!("No suitable input format found"))?;

    let rate = supported_config
        .min_sample_rate()
        .0
        .max(sample_rate.min(supported_config.max_sample_rate().0));
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_format = config.sample_format();
    let config: cpal::StreamConfig = config.into();

    if rate != sample_rate {
        log::warn!("Requested {} Hz, device runs at {} Hz", sample_rate, rate);
    }
    log::info!(
        "Capture format: {:?}, {} channel(s), {} Hz",
        sample_format,
        config.channels,
        rate
    );

    let stream = match sample_format {
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, sender)?,
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, sender)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, sender)?,
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, sender)?,
        other => return Err(anyhow!("Unsupported sample format {:?}", other)),
    };

    stream.play()?;

    Ok((stream, rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sender: Sender<Vec<u8>>,
) -> Result<cpal::Stream>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let chunk = interleaved_to_pcm16le(data, channels);
            match sender.try_send(chunk) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => log::warn!("Audio chunk dropped: consumer is behind"),
                Err(TrySendError::Disconnected(_)) => {}
            }
        },
        err_fn,
        None,
    )?;
    Ok(stream)
}

/// Down-mixes interleaved frames to mono and encodes them as PCM16LE.
fn interleaved_to_pcm16le<T>(data: &[T], channels: usize) -> Vec<u8>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut bytes = Vec::with_capacity(data.len() / channels * 2);
    for frame in data.chunks(channels) {
        let sum: f32 = frame.iter().map(|&s| <f32 as FromSample<T>>::from_sample_(s)).sum();
        let mono = (sum / frame.len() as f32).clamp(-1.0, 1.0);
        let value = (mono * 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Prefers configurations that cover the target rate, then fewer channels,
/// then 16-bit integer samples over other formats.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| {
            matches!(
                c.sample_format(),
                cpal::SampleFormat::I16
                    | cpal::SampleFormat::F32
                    | cpal::SampleFormat::U16
                    | cpal::SampleFormat::I32
            )
        })
        .min_by_key(|c| {
            let covers = c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let format_rank = match c.sample_format() {
                cpal::SampleFormat::I16 => 0,
                cpal::SampleFormat::F32 => 1,
                _ => 2,
            };
            (!covers, min_diff.min(max_diff), c.channels(), format_rank)
        })
}
