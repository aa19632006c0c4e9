//! Controller phases and shared observer state.
//!
//! [`AppState`] is what observers see: current phase, the live session, the
//! latest prediction, derived stats, the bounded recent timeline, and any
//! transient error notice. The controller mutates it; readers (the status
//! reporter, tests) lock and copy.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<AppState>>` — cheap to
//! clone and safe to share across tasks.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::api::Prediction;
use crate::session::{HistoryEntry, SessionStats};

// ---------------------------------------------------------------------------
// ControllerPhase
// ---------------------------------------------------------------------------

/// Top-level states of the capture controller.
///
/// ```text
/// Stopped ──toggle──▶ Starting ──capture ok──▶ Listening ──toggle──▶ Stopped
///                         │
///                         └──capture failure──▶ Stopped
/// ```
///
/// "Submitting" is not a distinct phase: while Listening, a single-flight
/// flag tracks whether one classification call is outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControllerPhase {
    /// No session; microphone released.
    #[default]
    Stopped,

    /// Toggle accepted; waiting for microphone acquisition.
    Starting,

    /// Session live; segments are produced and submitted.
    Listening,
}

impl ControllerPhase {
    /// `true` while a session is live (or being started).
    pub fn is_active(self) -> bool {
        matches!(self, ControllerPhase::Starting | ControllerPhase::Listening)
    }

    /// A short human-readable label for status lines.
    pub fn label(self) -> &'static str {
        match self {
            ControllerPhase::Stopped => "Stopped",
            ControllerPhase::Starting => "Starting",
            ControllerPhase::Listening => "Listening",
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureSession
// ---------------------------------------------------------------------------

/// The one live session, owned by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureSession {
    /// Wall-clock start of the session; `None` before the first start.
    pub started_at: Option<SystemTime>,
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared observer state — the single source of truth for readers.
#[derive(Debug, Default)]
pub struct AppState {
    /// Current controller phase.
    pub phase: ControllerPhase,

    /// The live (or most recent) capture session.
    pub session: CaptureSession,

    /// Most recently accepted prediction, `None` until the first one.
    pub last_prediction: Option<Prediction>,

    /// Derived session statistics, refreshed on every transition.
    pub stats: SessionStats,

    /// Bounded recent timeline, most recent first.
    pub recent: Vec<HistoryEntry>,

    /// Segments discarded because a classification was already in flight.
    pub dropped_segments: u64,

    /// Transient, dismissible error notice. Cleared by the next successful
    /// prediction or session start.
    pub error_notice: Option<String>,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Lock with `.lock().unwrap()` for a short critical section; do **not**
/// hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a default [`AppState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
