//! Running per-session statistics over accepted predictions.
//!
//! The aggregator is the sole owner of session history; only the controller
//! calls [`SessionAggregator::record`], at most once per accepted prediction
//! and in arrival order (which equals segment production order because at
//! most one classification call is ever in flight).
//!
//! Invariant, at all times:
//! `counts.total() == stats().total == history length`.

use std::time::{Duration, Instant, SystemTime};

use crate::api::{Emotion, Prediction};

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// One accepted prediction in the session timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub emotion: Emotion,
    pub confidence: f32,
    pub observed_at: SystemTime,
}

// ---------------------------------------------------------------------------
// EmotionCounts
// ---------------------------------------------------------------------------

/// Per-emotion prediction counts; monotonically non-decreasing within a
/// session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmotionCounts {
    angry: u64,
    happy: u64,
    sad: u64,
    disgust: u64,
}

impl EmotionCounts {
    /// Count for one emotion.
    pub fn get(&self, emotion: Emotion) -> u64 {
        match emotion {
            Emotion::Angry => self.angry,
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Disgust => self.disgust,
        }
    }

    fn increment(&mut self, emotion: Emotion) {
        match emotion {
            Emotion::Angry => self.angry += 1,
            Emotion::Happy => self.happy += 1,
            Emotion::Sad => self.sad += 1,
            Emotion::Disgust => self.disgust += 1,
        }
    }

    /// Sum over all emotions.
    pub fn total(&self) -> u64 {
        self.angry + self.happy + self.sad + self.disgust
    }

    /// Share of the total for one emotion, in `[0, 1]`; `0` when the
    /// session has no predictions yet.
    pub fn fraction(&self, emotion: Emotion) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.get(emotion) as f64 / total as f64
    }
}

// ---------------------------------------------------------------------------
// SessionStats
// ---------------------------------------------------------------------------

/// Derived session snapshot — computed on demand, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub counts: EmotionCounts,
    pub total: u64,
    /// Wall-clock time since the last `reset()`; zero before the first one.
    pub elapsed: Duration,
}

impl SessionStats {
    /// Format the elapsed duration as `MM:SS` for status lines.
    pub fn elapsed_display(&self) -> String {
        let secs = self.elapsed.as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

// ---------------------------------------------------------------------------
// SessionAggregator
// ---------------------------------------------------------------------------

/// Accumulates accepted predictions for the current session.
#[derive(Debug, Default)]
pub struct SessionAggregator {
    started_at: Option<Instant>,
    history: Vec<HistoryEntry>,
    counts: EmotionCounts,
    epoch: u64,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear counts and history, stamp a new session start, and advance the
    /// epoch so results from before the reset can be recognised as stale.
    pub fn reset(&mut self) {
        self.started_at = Some(Instant::now());
        self.history.clear();
        self.counts = EmotionCounts::default();
        self.epoch += 1;
    }

    /// Monotonic identifier of the current session; bumped by every
    /// [`reset`](Self::reset).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Append one accepted prediction. Sole mutator of session history.
    pub fn record(&mut self, prediction: &Prediction, observed_at: SystemTime) {
        self.history.push(HistoryEntry {
            emotion: prediction.emotion,
            confidence: prediction.confidence,
            observed_at,
        });
        self.counts.increment(prediction.emotion);
    }

    /// The last `n` entries, most recent first. Lazy; recomputable on
    /// demand; never longer than `min(n, total)`.
    pub fn recent_history(&self, n: usize) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().rev().take(n)
    }

    /// Snapshot of the derived stats against the current wall clock.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            counts: self.counts,
            total: self.history.len() as u64,
            elapsed: self.started_at.map(|t| t.elapsed()).unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
