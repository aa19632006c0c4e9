//! Audio pipeline — microphone capture → mono/16 kHz conversion → fixed
//! 3-second segments → in-memory WAV encoding.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → raw f32 buffers (mpsc)
//!            → downmix_mono → resample → SegmentAssembler
//!            → AudioSegment (WAV bytes) → CaptureEvent channel
//! ```
//!
//! [`ChunkCapturer`] owns the capture thread and the
//! `Idle → Requesting → Active → Idle` state machine; [`SegmentSource`] is
//! the seam the controller (and its tests) program against.

pub mod capture;
pub mod chunker;
pub mod encode;
pub mod resample;

pub use capture::{CaptureError, InputDevice, StreamGuard};
pub use chunker::{CaptureEvent, CaptureState, ChunkCapturer, SegmentAssembler, SegmentSource};
pub use encode::{AudioSegment, SEGMENT_MIME_TYPE};
pub use resample::{downmix_mono, resample};
