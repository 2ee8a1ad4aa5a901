//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio
//! Library). Enumerates input devices, selects a mono f32 configuration
//! near 44.1 kHz, and streams raw sample chunks into a channel for the
//! session reducer. The callback itself does no analysis: it forwards
//! samples and returns, so framing and every piece of mutable state
//! live on one thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::Sender;

/// Preferred capture rate; the nearest rate the device supports is used.
const TARGET_SAMPLE_RATE: u32 = 44_100;

/// An enumerated input device, addressed by its list index.
#[derive(Debug, Clone)]
pub struct InputDevice {
    pub index: usize,
    pub name: String,
}

/// Lists the host's audio input devices.
pub fn list_input_devices() -> Result<Vec<InputDevice>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();
    for (index, device) in host.input_devices()?.enumerate() {
        let name = device.name().unwrap_or_else(|_| format!("input {index}"));
        devices.push(InputDevice { index, name });
    }
    Ok(devices)
}

/// An open microphone stream feeding raw sample chunks into a channel.
///
/// Owns the platform stream exclusively. The callback checks a shared
/// running flag before touching the channel, so closing detaches it
/// even if a callback is already in flight. Close is best-effort and
/// idempotent: teardown errors are logged and swallowed, and closing an
/// already-closed session is a no-op.
pub struct CaptureSession {
    stream: Option<cpal::Stream>,
    running: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CaptureSession {
    /// Opens the input device at `device_index` (None selects the host
    /// default) as a mono f32 stream and starts delivering chunks.
    pub fn open(device_index: Option<usize>, sender: Sender<Vec<f32>>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_index {
            Some(index) => host
                .input_devices()?
                .nth(index)
                .ok_or_else(|| anyhow!("no input device at index {index}"))?,
            None => host
                .default_input_device()
                .ok_or_else(|| anyhow!("no input device available"))?,
        };
        eprintln!("[CAPTURE] Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("no suitable mono f32 input format found"))?;
        let sample_rate = TARGET_SAMPLE_RATE.clamp(
            supported.min_sample_rate().0,
            supported.max_sample_rate().0,
        );
        let config: cpal::StreamConfig =
            supported.with_sample_rate(cpal::SampleRate(sample_rate)).into();
        eprintln!("[CAPTURE] Selected sample rate: {} Hz", sample_rate);

        let running = Arc::new(AtomicBool::new(true));
        let callback_running = Arc::clone(&running);
        let err_fn = |err| eprintln!("[CAPTURE] Stream error: {}", err);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !callback_running.load(Ordering::Relaxed) {
                    return;
                }
                // Chunks are framed downstream; a full channel drops the
                // chunk rather than blocking the audio thread.
                let _ = sender.try_send(data.to_vec());
            },
            err_fn,
            None,
        )?;
        stream.play()?;

        Ok(Self {
            stream: Some(stream),
            running,
            sample_rate,
        })
    }

    /// Sample rate the device was opened at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Detaches the callback and releases the device.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                eprintln!("[CAPTURE] Error pausing stream: {}", e);
            }
            drop(stream);
            eprintln!("[CAPTURE] Capture closed");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Finds the supported configuration closest to the target rate among
/// the mono f32 candidates.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            min_diff.min(max_diff)
        })
}
