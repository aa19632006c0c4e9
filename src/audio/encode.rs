//! In-memory WAV encoding of captured segments.
//!
//! [`AudioSegment`] is the unit that travels from the capturer to the
//! classification client: an opaque encoded byte blob plus its declared MIME
//! type and nominal duration. Segments are immutable; ownership transfers to
//! the client on submission and the bytes are dropped after the response.

use std::io::Cursor;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};

/// MIME type of the encoded payload.
pub const SEGMENT_MIME_TYPE: &str = "audio/wav";

// ---------------------------------------------------------------------------
// AudioSegment
// ---------------------------------------------------------------------------

/// One fixed-duration encoded audio capture, ready for upload.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Encoded audio bytes (16-bit mono WAV).
    pub bytes: Vec<u8>,
    /// Declared MIME type of `bytes`.
    pub mime_type: &'static str,
    /// Nominal duration covered by the samples.
    pub duration: Duration,
}

impl AudioSegment {
    /// Encode mono `f32` samples into a WAV segment.
    ///
    /// Returns `None` for an empty capture window or a zero sample rate —
    /// such captures are dropped silently rather than delivered.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Option<Self> {
        if samples.is_empty() || sample_rate == 0 {
            return None;
        }

        let bytes = encode_wav(samples, sample_rate)?;
        let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate));

        Some(Self {
            bytes,
            mime_type: SEGMENT_MIME_TYPE,
            duration,
        })
    }
}

// ---------------------------------------------------------------------------
// WAV encoding
// ---------------------------------------------------------------------------

/// Write `samples` as a 16-bit mono WAV into a memory buffer.
fn encode_wav(samples: &[f32], sample_rate: u32) -> Option<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec).ok()?;

    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * f32::from(i16::MAX)) as i16).ok()?;
    }
    writer.finalize().ok()?;

    Some(cursor.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
