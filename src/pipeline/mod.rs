//! Session orchestration.
//!
//! The pipeline layer ties the other modules together:
//!
//! ```text
//! ToggleRequested ─▶ CaptureController ─▶ SegmentSource (audio)
//!                          │                    │ segments
//!                          │◀───────────────────┘
//!                          ├─▶ EmotionClassifier (api)
//!                          ├─▶ SessionAggregator (session)
//!                          └─▶ SharedState (observers)
//! ```
//!
//! [`CaptureController::run`] is the single consumer of the
//! [`ControllerEvent`] channel; everything else only sends.

pub mod runner;
pub mod state;

pub use runner::{CaptureController, ControllerEvent};
pub use state::{new_shared_state, AppState, CaptureSession, ControllerPhase, SharedState};
