//! Session state aggregation.
//!
//! [`SessionAggregator`] consumes predictions in arrival order and maintains
//! per-emotion counts, a bounded-view history, elapsed-time bookkeeping, and
//! the session epoch used to discard stale in-flight results.

pub mod aggregator;

pub use aggregator::{EmotionCounts, HistoryEntry, SessionAggregator, SessionStats};
