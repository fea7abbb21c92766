/// Audio input device, built on cpal.
///
/// The capture stream runs on cpal's realtime thread and must never block
/// on anything except the device: the callback downmixes, resamples, stamps
/// a sequence number, and pushes into the session's capture buffer. Any
/// push failure is reported over a channel and capture stops contributing
/// frames; it is never swallowed.
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::capture_buffer::CaptureBuffer;
use crate::error::SessionError;
use crate::frame::AudioFrame;
use crate::recognizer::RECOGNIZER_SAMPLE_RATE;

pub struct AudioDeviceSource {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioDeviceSource {
    /// Open an input device. `device_name` empty selects the system
    /// default. Acquisition failure surfaces as AudioDevice so the state
    /// machine can abort the Armed session.
    pub fn open(device_name: &str) -> Result<Self, SessionError> {
        let host = cpal::default_host();

        let device = if device_name.is_empty() {
            host.default_input_device()
                .ok_or_else(|| SessionError::AudioDevice("No input device available".into()))?
        } else {
            host.input_devices()
                .map_err(|e| SessionError::AudioDevice(e.to_string()))?
                .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
                .ok_or_else(|| {
                    SessionError::AudioDevice(format!("Input device not found: {}", device_name))
                })?
        };

        let default_config = device
            .default_input_config()
            .map_err(|e| SessionError::AudioDevice(format!("Failed to get input config: {}", e)))?;

        let mut config: StreamConfig = default_config.into();

        // Prefer the recognizer rate directly; otherwise keep the device
        // default and resample in the callback.
        let supports_16k = device
            .supported_input_configs()
            .map(|mut configs| {
                configs.any(|c| {
                    c.min_sample_rate().0 <= RECOGNIZER_SAMPLE_RATE
                        && c.max_sample_rate().0 >= RECOGNIZER_SAMPLE_RATE
                })
            })
            .unwrap_or(false);

        if supports_16k {
            config.sample_rate = cpal::SampleRate(RECOGNIZER_SAMPLE_RATE);
        } else {
            println!(
                "16kHz not supported, capturing at {} Hz and resampling",
                config.sample_rate.0
            );
        }

        println!(
            "Using audio input device: {} ({} channels, {} Hz)",
            device.name().unwrap_or_else(|_| "unknown".into()),
            config.channels,
            config.sample_rate.0
        );

        Ok(AudioDeviceSource {
            device,
            config,
            stream: None,
        })
    }

    /// Start pushing frames into `buffer`. One frame per device callback,
    /// stamped with a strictly increasing sequence number; frame size
    /// follows the device period, which the buffer doesn't care about.
    pub fn start_capture(
        &mut self,
        buffer: Arc<CaptureBuffer>,
        errors: Sender<SessionError>,
    ) -> Result<(), SessionError> {
        if self.stream.is_some() {
            return Ok(()); // Already capturing
        }

        let channels = self.config.channels as usize;
        let device_rate = self.config.sample_rate.0;
        let mut sequence: u64 = 0;
        let mut failed = false;

        let err_fn = {
            let errors = errors.clone();
            move |err: cpal::StreamError| {
                eprintln!("🔴 Audio stream error: {}", err);
                let _ = errors.send(SessionError::AudioDevice(err.to_string()));
            }
        };

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if failed {
                        return;
                    }

                    let mono = downmix(data, channels);
                    let samples = if device_rate != RECOGNIZER_SAMPLE_RATE {
                        resample(&mono, device_rate, RECOGNIZER_SAMPLE_RATE)
                    } else {
                        mono
                    };

                    if samples.is_empty() {
                        return;
                    }

                    let frame = AudioFrame::new(RECOGNIZER_SAMPLE_RATE, sequence, samples);
                    sequence += 1;

                    if let Err(e) = buffer.push(frame) {
                        // Losing audio is fatal to the session, not a
                        // shrug. Stop contributing and let the state
                        // machine tear the session down.
                        failed = true;
                        let _ = errors.send(e);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| {
                SessionError::AudioDevice(format!(
                    "Failed to build input stream: {}\n\
                    This is likely a microphone permissions issue.",
                    e
                ))
            })?;

        stream
            .play()
            .map_err(|e| SessionError::AudioDevice(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        println!("🎤 Capture started");
        Ok(())
    }

    /// Stop the stream and release the device. Safe to call on every exit
    /// path, including abort; calling it twice is a no-op.
    pub fn stop_capture(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            println!("🎤 Capture stopped");
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for AudioDeviceSource {
    fn drop(&mut self) {
        self.stop_capture();
    }
}

/// List available input devices for the CLI.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;

    let mut names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Average interleaved channels down to mono.
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
        .collect()
}

// Simple linear interpolation resampling
fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let src_idx_floor = src_idx.floor() as usize;
        let src_idx_ceil = (src_idx_floor + 1).min(input.len() - 1);
        let frac = src_idx - src_idx_floor as f64;

        let sample =
            input[src_idx_floor] * (1.0 - frac) as f32 + input[src_idx_ceil] * frac as f32;

        output.push(sample);
    }

    output
}
