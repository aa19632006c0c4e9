//! Real-time speech emotion monitor.
//!
//! Continuously records short microphone segments, submits each one to a
//! remote emotion-classification service, and keeps running session
//! statistics (per-emotion counts, a bounded recent timeline, elapsed
//! duration).
//!
//! # Architecture
//!
//! ```text
//! Microphone ─▶ ChunkCapturer ─▶ AudioSegment (3 s WAV)
//!                    │
//!                    ▼
//!          CaptureController (event loop)
//!                    │  at most one request in flight
//!                    ▼
//!            HttpClassifier ──▶ POST /predict (multipart, 15 s timeout)
//!                    │
//!                    ▼
//!          SessionAggregator (counts, history, elapsed)
//!                    │
//!                    ▼
//!          SharedState (read by observers / the status reporter)
//! ```
//!
//! Data flows one way: capturer → controller → classifier → controller →
//! aggregator. All controller state transitions happen on a single event
//! loop, so no locking is needed beyond the shared observer state.

pub mod api;
pub mod audio;
pub mod config;
pub mod pipeline;
pub mod session;
