//! Microphone input via `cpal`.
//!
//! [`InputDevice`] wraps the cpal host/device/stream lifecycle. Call
//! [`InputDevice::stream`] to begin delivering raw `f32` buffers over an
//! mpsc channel. The returned [`StreamGuard`] is a RAII guard — dropping it
//! stops the underlying cpal stream and releases the device handle.
//!
//! cpal streams are `!Send`, so both [`InputDevice::open`] and the guard
//! must live on the thread that services the stream (see
//! [`crate::audio::chunker`]).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

/// Sample rate requested from the device when a mono config supports it.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors from the capture layer. Both variants are fatal to the current
/// session: the controller forces the session inactive when one surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The platform refused access to the input stream. OS-level permission
    /// denials surface as backend-specific stream build/play failures.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// No usable input device, or the device disappeared.
    #[error("audio input device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        CaptureError::DeviceUnavailable(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceUnavailable(e.to_string())
            }
            other => CaptureError::PermissionDenied(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => {
                CaptureError::DeviceUnavailable(e.to_string())
            }
            other => CaptureError::PermissionDenied(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamGuard
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value drops `cpal::Stream`, which stops the hardware
/// stream and releases the acquired device handle.
pub struct StreamGuard {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// InputDevice
// ---------------------------------------------------------------------------

/// Microphone wrapper built on top of `cpal`.
///
/// Prefers a mono, 16 kHz, `f32` stream configuration when the device
/// supports one; otherwise falls back to the device default and leaves
/// downmixing/resampling to the caller.
pub struct InputDevice {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Sample rate of the opened stream (Hz).
    sample_rate: u32,
    /// Number of interleaved channels the stream delivers.
    channels: u16,
}

impl InputDevice {
    /// Open the system default input device.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::DeviceUnavailable`] when no input device is
    /// present or the device cannot report a stream configuration.
    pub fn open() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            CaptureError::DeviceUnavailable("no input device on the default audio host".into())
        })?;

        // Prefer mono f32 at the target rate; not every backend offers it.
        let preferred = device.supported_input_configs().ok().and_then(|configs| {
            configs
                .filter(|range| {
                    range.channels() == 1
                        && range.sample_format() == cpal::SampleFormat::F32
                        && range.min_sample_rate().0 <= TARGET_SAMPLE_RATE
                        && range.max_sample_rate().0 >= TARGET_SAMPLE_RATE
                })
                .map(|range| range.with_sample_rate(cpal::SampleRate(TARGET_SAMPLE_RATE)))
                .next()
        });

        let supported = match preferred {
            Some(config) => config,
            None => device.default_input_config()?,
        };

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start the input stream and send raw sample buffers to `tx`.
    ///
    /// The cpal callback runs on a dedicated audio thread; each delivered
    /// hardware buffer is forwarded as an owned `Vec<f32>`. Send errors
    /// (receiver dropped) are ignored so the audio thread never panics.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] if the platform rejects the stream
    /// configuration or refuses to start the stream.
    pub fn stream(&self, tx: mpsc::Sender<Vec<f32>>) -> Result<StreamGuard, CaptureError> {
        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(data.to_vec());
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        Ok(StreamGuard { _stream: stream })
    }

    /// Sample rate of the opened stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each delivered buffer.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_are_cloneable_and_comparable() {
        let a = CaptureError::DeviceUnavailable("gone".into());
        assert_eq!(a.clone(), a);
        assert_ne!(a, CaptureError::PermissionDenied("gone".into()));
    }

    #[test]
    fn error_messages_name_the_layer() {
        let e = CaptureError::PermissionDenied("blocked by OS".into());
        assert!(e.to_string().contains("microphone access denied"));
    }
}
