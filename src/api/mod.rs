//! Classification service client module.
//!
//! This module provides:
//! * [`Emotion`] — the fixed set of emotion classes the service predicts.
//! * [`Prediction`] — a validated classification result.
//! * [`EmotionClassifier`] — async trait implemented by all client backends.
//! * [`HttpClassifier`] — reqwest-based client for the real service.
//! * [`ApiError`] — error variants for classification calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use emotion_monitor::api::{EmotionClassifier, HttpClassifier};
//! use emotion_monitor::audio::AudioSegment;
//! use emotion_monitor::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = HttpClassifier::from_config(&config.api);
//!
//!     if let Ok(health) = client.health().await {
//!         println!("service status: {}", health.status);
//!     }
//!
//!     // segment: one encoded capture from the audio module
//!     # fn make_segment() -> AudioSegment { unimplemented!() }
//!     let segment = make_segment();
//!     match client.classify(segment).await {
//!         Ok(prediction) => println!("{} ({:.0}%)", prediction.emotion, prediction.confidence * 100.0),
//!         Err(e) => eprintln!("classification failed: {e}"),
//!     }
//! }
//! ```

pub mod client;
pub mod prediction;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ApiError, EmotionClassifier, HttpClassifier, ServiceHealth};
pub use prediction::{Emotion, Prediction, PredictionError, Probabilities};
