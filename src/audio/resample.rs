//! Channel downmixing and sample-rate conversion.
//!
//! Segments are encoded mono at the configured target rate (16 kHz by
//! default); devices usually deliver stereo 44.1/48 kHz. Linear
//! interpolation is plenty for speech-feature extraction on the service
//! side.

// ---------------------------------------------------------------------------
// downmix_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging frames.
///
/// Already-mono input is returned as an owned copy. A trailing partial
/// frame, if any, is discarded.
pub fn downmix_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let width = usize::from(channels);
    samples
        .chunks_exact(width)
        .map(|frame| frame.iter().sum::<f32>() / width as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono audio from `from_hz` to `to_hz` by linear interpolation.
///
/// Equal rates, empty input, or a zero rate are no-ops (the input is
/// returned as an owned copy). Output length is
/// `floor(samples.len() * to_hz / from_hz)`.
pub fn resample(samples: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if from_hz == to_hz || from_hz == 0 || to_hz == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let step = f64::from(from_hz) / f64::from(to_hz);
    let out_len = (samples.len() as f64 / step).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * step;
        let base = pos as usize;
        let frac = (pos - base as f64) as f32;

        let a = samples[base];
        let b = if base + 1 < samples.len() {
            samples[base + 1]
        } else {
            a
        };
        out.push(a + (b - a) * frac);
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
