//! Capture controller — the event loop coordinating capturer, classifier and
//! aggregator.
//!
//! [`CaptureController`] owns the [`SessionAggregator`] and responds to
//! [`ControllerEvent`]s received over a single `tokio::sync::mpsc` channel.
//! All state transitions happen on that one consumer loop, so the
//! single-flight discipline needs no locks: one flag gates one outstanding
//! classification call.
//!
//! # Event flow
//!
//! ```text
//! ToggleRequested (inactive)
//!   └─▶ aggregator.reset() → source.start() → Listening
//!
//! SegmentReady
//!   ├─ in flight? → segment discarded (at-most-one-in-flight)
//!   └─ else      → spawn classify task, tagged with the session epoch
//!
//! ClassifyOk / ClassifyErr
//!   ├─ stale epoch → discarded
//!   ├─ Ok  → clear flag, aggregator.record, clear error notice
//!   └─ Err → clear flag, surface notice; capture continues
//!
//! CaptureFailed     → surface error, force session inactive
//! ToggleRequested (active) → source.stop(), session inactive
//! Shutdown          → stop capture, drain any in-flight result, exit
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ApiError, EmotionClassifier, Prediction};
use crate::audio::{AudioSegment, CaptureError, CaptureEvent, SegmentSource};
use crate::session::SessionAggregator;

use super::state::{CaptureSession, ControllerPhase, SharedState};

// ---------------------------------------------------------------------------
// ControllerEvent
// ---------------------------------------------------------------------------

/// Discrete events the controller reacts to.
///
/// `ClassifyOk`/`ClassifyErr` carry the epoch captured when the segment was
/// submitted; results from before a session reset are recognised as stale
/// and discarded.
#[derive(Debug)]
pub enum ControllerEvent {
    /// Start the session if stopped, stop it if running.
    ToggleRequested,
    /// The capturer finished one segment.
    SegmentReady(AudioSegment),
    /// A classification call resolved successfully.
    ClassifyOk { prediction: Prediction, epoch: u64 },
    /// A classification call failed.
    ClassifyErr { error: ApiError, epoch: u64 },
    /// The capture layer died after startup.
    CaptureFailed(CaptureError),
    /// Stop capture, drain any in-flight result, and exit the loop.
    Shutdown,
}

// ---------------------------------------------------------------------------
// CaptureController
// ---------------------------------------------------------------------------

/// Coordinates capture, submission and aggregation for one session at a
/// time.
///
/// Create with [`CaptureController::new`], then call [`run`](Self::run)
/// inside a tokio task. `event_tx` must be the sender side of the channel
/// later passed to `run` — spawned classify tasks and the capture forwarder
/// report back through it.
pub struct CaptureController {
    state: SharedState,
    aggregator: SessionAggregator,
    source: Arc<dyn SegmentSource>,
    classifier: Arc<dyn EmotionClassifier>,
    event_tx: mpsc::Sender<ControllerEvent>,
    forwarder: Option<JoinHandle<()>>,
    phase: ControllerPhase,
    in_flight: bool,
    dropped_segments: u64,
    shutting_down: bool,
    timeline_items: usize,
}

impl CaptureController {
    pub fn new(
        state: SharedState,
        source: Arc<dyn SegmentSource>,
        classifier: Arc<dyn EmotionClassifier>,
        event_tx: mpsc::Sender<ControllerEvent>,
        timeline_items: usize,
    ) -> Self {
        Self {
            state,
            aggregator: SessionAggregator::new(),
            source,
            classifier,
            event_tx,
            forwarder: None,
            phase: ControllerPhase::Stopped,
            in_flight: false,
            dropped_segments: 0,
            shutting_down: false,
            timeline_items,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the controller until a `Shutdown` event or channel closure.
    ///
    /// Should be spawned as a tokio task from `main()`.
    pub async fn run(mut self, mut events: mpsc::Receiver<ControllerEvent>) {
        while let Some(event) = events.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }
        log::info!("controller: event loop finished");
    }

    /// React to one event. Returns `false` when the loop should exit.
    async fn handle_event(&mut self, event: ControllerEvent) -> bool {
        match event {
            ControllerEvent::ToggleRequested => {
                self.handle_toggle().await;
                true
            }
            ControllerEvent::SegmentReady(segment) => {
                self.handle_segment(segment);
                true
            }
            ControllerEvent::ClassifyOk { prediction, epoch } => {
                self.handle_prediction(prediction, epoch);
                !(self.shutting_down && !self.in_flight)
            }
            ControllerEvent::ClassifyErr { error, epoch } => {
                self.handle_classify_error(error, epoch);
                !(self.shutting_down && !self.in_flight)
            }
            ControllerEvent::CaptureFailed(error) => {
                self.handle_capture_failure(error).await;
                true
            }
            ControllerEvent::Shutdown => {
                log::info!("controller: shutdown requested");
                if self.phase.is_active() {
                    self.stop_capture().await;
                }
                if self.in_flight {
                    // The outstanding call still resolves; keep draining
                    // until its result has been processed.
                    self.shutting_down = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    /// One toggle, one transition: start when stopped, stop when running.
    async fn handle_toggle(&mut self) {
        match self.phase {
            ControllerPhase::Stopped => self.start_session().await,
            ControllerPhase::Starting | ControllerPhase::Listening => {
                self.stop_capture().await;
                log::info!("controller: session stopped");
            }
        }
    }

    async fn start_session(&mut self) {
        self.aggregator.reset();
        self.in_flight = false;
        self.dropped_segments = 0;
        self.set_phase(ControllerPhase::Starting);

        {
            let mut st = self.state.lock().unwrap();
            st.session = CaptureSession {
                started_at: Some(SystemTime::now()),
                is_active: true,
            };
            st.last_prediction = None;
            st.error_notice = None;
            st.recent.clear();
            st.stats = self.aggregator.stats();
            st.dropped_segments = 0;
        }

        let (capture_tx, capture_rx) = mpsc::channel::<CaptureEvent>(8);
        match self.source.start(capture_tx).await {
            Ok(()) => {
                self.forwarder = Some(spawn_forwarder(capture_rx, self.event_tx.clone()));
                self.set_phase(ControllerPhase::Listening);
                log::info!("controller: session {} listening", self.aggregator.epoch());
            }
            Err(e) => {
                log::error!("controller: capture start failed: {e}");
                self.set_phase(ControllerPhase::Stopped);
                let mut st = self.state.lock().unwrap();
                st.session.is_active = false;
                st.error_notice = Some(e.to_string());
            }
        }
    }

    async fn stop_capture(&mut self) {
        self.source.stop().await;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.set_phase(ControllerPhase::Stopped);

        let mut st = self.state.lock().unwrap();
        st.session.is_active = false;
        st.stats = self.aggregator.stats();
    }

    /// Submit a segment, or discard it when one call is already outstanding.
    fn handle_segment(&mut self, segment: AudioSegment) {
        if self.phase != ControllerPhase::Listening {
            log::debug!("controller: segment after stop, discarding");
            return;
        }

        if self.in_flight {
            self.dropped_segments += 1;
            log::debug!(
                "controller: classification in flight, segment dropped ({} so far)",
                self.dropped_segments
            );
            self.state.lock().unwrap().dropped_segments = self.dropped_segments;
            return;
        }

        self.in_flight = true;
        let classifier = Arc::clone(&self.classifier);
        let event_tx = self.event_tx.clone();
        let epoch = self.aggregator.epoch();

        tokio::spawn(async move {
            let event = match classifier.classify(segment).await {
                Ok(prediction) => ControllerEvent::ClassifyOk { prediction, epoch },
                Err(error) => ControllerEvent::ClassifyErr { error, epoch },
            };
            let _ = event_tx.send(event).await;
        });
    }

    fn handle_prediction(&mut self, prediction: Prediction, epoch: u64) {
        if epoch != self.aggregator.epoch() {
            log::debug!("controller: discarding prediction from stale session {epoch}");
            return;
        }
        self.in_flight = false;

        self.aggregator.record(&prediction, SystemTime::now());
        log::info!(
            "controller: {} ({:.0}%)",
            prediction.emotion,
            prediction.confidence * 100.0
        );

        let mut st = self.state.lock().unwrap();
        st.error_notice = None;
        st.stats = self.aggregator.stats();
        st.recent = self
            .aggregator
            .recent_history(self.timeline_items)
            .cloned()
            .collect();
        st.last_prediction = Some(prediction);
    }

    fn handle_classify_error(&mut self, error: ApiError, epoch: u64) {
        if epoch != self.aggregator.epoch() {
            log::debug!("controller: discarding failure from stale session {epoch}");
            return;
        }
        // Clear the flag before surfacing — a set flag with no outstanding
        // call would block every future submission.
        self.in_flight = false;

        log::warn!("controller: classification failed: {error}");
        self.state.lock().unwrap().error_notice = Some(error.to_string());
    }

    /// Capture failure is fatal to the session; classification failures are
    /// not.
    async fn handle_capture_failure(&mut self, error: CaptureError) {
        log::error!("controller: capture failed: {error}");
        if self.phase.is_active() {
            self.stop_capture().await;
        }
        self.state.lock().unwrap().error_notice = Some(error.to_string());
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_phase(&mut self, phase: ControllerPhase) {
        self.phase = phase;
        self.state.lock().unwrap().phase = phase;
    }
}

/// Forward capture events into the controller's event queue.
fn spawn_forwarder(
    mut capture_rx: mpsc::Receiver<CaptureEvent>,
    event_tx: mpsc::Sender<ControllerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = capture_rx.recv().await {
            let forwarded = match event {
                CaptureEvent::Segment(segment) => ControllerEvent::SegmentReady(segment),
                CaptureEvent::Failed(error) => ControllerEvent::CaptureFailed(error),
            };
            if event_tx.send(forwarded).await.is_err() {
                break;
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Emotion, Probabilities};
    use crate::pipeline::state::new_shared_state;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Mock capturer that records start/stop calls and never produces
    /// segments on its own (tests inject `SegmentReady` directly).
    struct MockSource {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: Option<CaptureError>,
    }

    impl MockSource {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                fail_start: None,
            })
        }

        fn failing(error: CaptureError) -> Arc<Self> {
            Arc::new(Self {
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                fail_start: Some(error),
            })
        }
    }

    #[async_trait]
    impl SegmentSource for MockSource {
        async fn start(&self, _events: mpsc::Sender<CaptureEvent>) -> Result<(), CaptureError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            match &self.fail_start {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        async fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Mock classifier that counts calls and resolves after a fixed delay.
    struct FixedClassifier {
        prediction: Prediction,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl EmotionClassifier for FixedClassifier {
        async fn classify(&self, _segment: AudioSegment) -> Result<Prediction, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.prediction.clone())
        }
    }

    /// Mock classifier that always times out.
    struct TimeoutClassifier;

    #[async_trait]
    impl EmotionClassifier for TimeoutClassifier {
        async fn classify(&self, _segment: AudioSegment) -> Result<Prediction, ApiError> {
            Err(ApiError::Timeout)
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The worked example from the service contract.
    fn happy_prediction() -> Prediction {
        Prediction {
            emotion: Emotion::Happy,
            confidence: 0.87,
            probabilities: Probabilities {
                angry: 0.02,
                happy: 0.87,
                sad: 0.06,
                disgust: 0.05,
            },
        }
    }

    fn segment() -> AudioSegment {
        AudioSegment::from_samples(&[0.1; 1_600], 16_000).expect("segment")
    }

    fn make_controller(
        source: Arc<dyn SegmentSource>,
        classifier: Arc<dyn EmotionClassifier>,
    ) -> (
        CaptureController,
        SharedState,
        mpsc::Sender<ControllerEvent>,
        mpsc::Receiver<ControllerEvent>,
    ) {
        let state = new_shared_state();
        let (tx, rx) = mpsc::channel(32);
        let controller =
            CaptureController::new(Arc::clone(&state), source, classifier, tx.clone(), 10);
        (controller, state, tx, rx)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// Start + stop with no segments produced: empty stats, inactive session.
    #[tokio::test]
    async fn toggle_twice_yields_empty_inactive_session() {
        let source = MockSource::ok();
        let classifier = Arc::new(FixedClassifier {
            prediction: happy_prediction(),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        });
        let (controller, state, tx, rx) = make_controller(source.clone(), classifier);

        tx.send(ControllerEvent::ToggleRequested).await.unwrap();
        tx.send(ControllerEvent::ToggleRequested).await.unwrap();
        tx.send(ControllerEvent::Shutdown).await.unwrap();

        controller.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(st.phase, ControllerPhase::Stopped);
        assert!(!st.session.is_active);
        assert_eq!(st.stats.total, 0);
        assert_eq!(source.starts.load(Ordering::SeqCst), 1);
        assert!(source.stops.load(Ordering::SeqCst) >= 1);
    }

    /// At most one classification call is outstanding, whatever the segment
    /// arrival pattern: dropped = produced − calls_made.
    #[tokio::test(start_paused = true)]
    async fn overlapping_segments_are_dropped_not_queued() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = MockSource::ok();
        let classifier = Arc::new(FixedClassifier {
            prediction: happy_prediction(),
            calls: Arc::clone(&calls),
            delay: Duration::from_millis(50),
        });
        let (controller, state, tx, rx) = make_controller(source, classifier);

        tx.send(ControllerEvent::ToggleRequested).await.unwrap();
        for _ in 0..3 {
            tx.send(ControllerEvent::SegmentReady(segment())).await.unwrap();
        }
        tx.send(ControllerEvent::Shutdown).await.unwrap();

        controller.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(st.dropped_segments, 2);
        assert_eq!(st.stats.total, 1);
        assert_eq!(
            st.last_prediction.as_ref().map(|p| p.emotion),
            Some(Emotion::Happy)
        );
    }

    /// Worked example: Happy at 0.87 lands in history and counts.
    #[tokio::test]
    async fn successful_prediction_updates_history_and_counts() {
        let source = MockSource::ok();
        let classifier = Arc::new(TimeoutClassifier);
        let (mut controller, state, _tx, _rx) = make_controller(source, classifier);

        assert!(controller.handle_event(ControllerEvent::ToggleRequested).await);
        assert!(
            controller
                .handle_event(ControllerEvent::ClassifyOk {
                    prediction: happy_prediction(),
                    epoch: 1,
                })
                .await
        );

        let st = state.lock().unwrap();
        assert_eq!(st.stats.total, 1);
        assert_eq!(st.stats.counts.get(Emotion::Happy), 1);
        assert_eq!(st.recent.len(), 1);
        assert_eq!(st.recent[0].emotion, Emotion::Happy);
        assert!((st.recent[0].confidence - 0.87).abs() < 1e-6);
        assert!(st.error_notice.is_none());
    }

    /// A failed call surfaces a notice, clears the single-flight gate, and
    /// leaves history untouched; capture continues.
    #[tokio::test]
    async fn classify_failure_clears_gate_and_keeps_listening() {
        let source = MockSource::ok();
        let classifier = Arc::new(TimeoutClassifier);
        let (mut controller, state, _tx, _rx) = make_controller(source, classifier);

        controller.handle_event(ControllerEvent::ToggleRequested).await;
        controller
            .handle_event(ControllerEvent::SegmentReady(segment()))
            .await;
        controller
            .handle_event(ControllerEvent::ClassifyErr {
                error: ApiError::Timeout,
                epoch: 1,
            })
            .await;

        {
            let st = state.lock().unwrap();
            assert_eq!(st.phase, ControllerPhase::Listening);
            assert!(st.session.is_active);
            assert_eq!(st.stats.total, 0);
            assert!(st
                .error_notice
                .as_deref()
                .is_some_and(|msg| msg.contains("timed out")));
        }

        // The gate must be open again: the next segment is submitted, not
        // dropped.
        controller
            .handle_event(ControllerEvent::SegmentReady(segment()))
            .await;
        assert_eq!(state.lock().unwrap().dropped_segments, 0);
    }

    /// A call resolving after a reset must not mutate the new session.
    #[tokio::test]
    async fn stale_epoch_results_are_discarded() {
        let source = MockSource::ok();
        let classifier = Arc::new(TimeoutClassifier);
        let (mut controller, state, _tx, _rx) = make_controller(source, classifier);

        controller.handle_event(ControllerEvent::ToggleRequested).await; // epoch 1
        controller
            .handle_event(ControllerEvent::SegmentReady(segment()))
            .await;
        controller.handle_event(ControllerEvent::ToggleRequested).await; // stop
        controller.handle_event(ControllerEvent::ToggleRequested).await; // epoch 2

        controller
            .handle_event(ControllerEvent::ClassifyOk {
                prediction: happy_prediction(),
                epoch: 1,
            })
            .await;
        controller
            .handle_event(ControllerEvent::ClassifyErr {
                error: ApiError::Timeout,
                epoch: 1,
            })
            .await;

        let st = state.lock().unwrap();
        assert_eq!(st.stats.total, 0);
        assert!(st.last_prediction.is_none());
        assert!(st.error_notice.is_none());
    }

    /// Stopping does not abort the in-flight call: a same-epoch result
    /// arriving after the stop is still recorded.
    #[tokio::test]
    async fn in_flight_result_after_stop_is_still_recorded() {
        let source = MockSource::ok();
        let classifier = Arc::new(TimeoutClassifier);
        let (mut controller, state, _tx, _rx) = make_controller(source, classifier);

        controller.handle_event(ControllerEvent::ToggleRequested).await; // epoch 1
        controller
            .handle_event(ControllerEvent::SegmentReady(segment()))
            .await;
        controller.handle_event(ControllerEvent::ToggleRequested).await; // stop
        controller
            .handle_event(ControllerEvent::ClassifyOk {
                prediction: happy_prediction(),
                epoch: 1,
            })
            .await;

        let st = state.lock().unwrap();
        assert_eq!(st.stats.total, 1);
        assert!(!st.session.is_active);
    }

    /// Segments delivered after the session stopped are ignored entirely.
    #[tokio::test]
    async fn segment_after_stop_is_ignored() {
        let source = MockSource::ok();
        let classifier = Arc::new(TimeoutClassifier);
        let (mut controller, state, _tx, _rx) = make_controller(source, classifier);

        controller.handle_event(ControllerEvent::ToggleRequested).await;
        controller.handle_event(ControllerEvent::ToggleRequested).await;
        controller
            .handle_event(ControllerEvent::SegmentReady(segment()))
            .await;

        let st = state.lock().unwrap();
        assert_eq!(st.stats.total, 0);
        assert_eq!(st.dropped_segments, 0);
    }

    /// Permission/device failure on start leaves the session stopped with a
    /// surfaced error.
    #[tokio::test]
    async fn capture_start_failure_keeps_session_stopped() {
        let source = MockSource::failing(CaptureError::PermissionDenied("denied by OS".into()));
        let classifier = Arc::new(TimeoutClassifier);
        let (mut controller, state, _tx, _rx) = make_controller(source.clone(), classifier);

        controller.handle_event(ControllerEvent::ToggleRequested).await;

        let st = state.lock().unwrap();
        assert_eq!(st.phase, ControllerPhase::Stopped);
        assert!(!st.session.is_active);
        assert!(st
            .error_notice
            .as_deref()
            .is_some_and(|msg| msg.contains("denied")));
        assert_eq!(source.starts.load(Ordering::SeqCst), 1);
    }

    /// A capture failure mid-session forces the session inactive.
    #[tokio::test]
    async fn capture_failure_forces_session_inactive() {
        let source = MockSource::ok();
        let classifier = Arc::new(TimeoutClassifier);
        let (mut controller, state, _tx, _rx) = make_controller(source.clone(), classifier);

        controller.handle_event(ControllerEvent::ToggleRequested).await;
        controller
            .handle_event(ControllerEvent::CaptureFailed(
                CaptureError::DeviceUnavailable("unplugged".into()),
            ))
            .await;

        let st = state.lock().unwrap();
        assert_eq!(st.phase, ControllerPhase::Stopped);
        assert!(!st.session.is_active);
        assert!(st.error_notice.is_some());
        assert_eq!(source.stops.load(Ordering::SeqCst), 1);
    }

    /// Shutting down after a capture failure must not restart the session:
    /// recorded stats survive to the final summary and the microphone is
    /// not reacquired.
    #[tokio::test]
    async fn shutdown_after_capture_failure_preserves_stats() {
        let source = MockSource::ok();
        let classifier = Arc::new(TimeoutClassifier);
        let (controller, state, tx, rx) = make_controller(source.clone(), classifier);

        tx.send(ControllerEvent::ToggleRequested).await.unwrap();
        tx.send(ControllerEvent::ClassifyOk {
            prediction: happy_prediction(),
            epoch: 1,
        })
        .await
        .unwrap();
        tx.send(ControllerEvent::CaptureFailed(
            CaptureError::DeviceUnavailable("unplugged".into()),
        ))
        .await
        .unwrap();
        tx.send(ControllerEvent::Shutdown).await.unwrap();

        controller.run(rx).await;

        let st = state.lock().unwrap();
        assert_eq!(st.phase, ControllerPhase::Stopped);
        assert!(!st.session.is_active);
        assert_eq!(st.stats.total, 1);
        assert_eq!(st.stats.counts.get(Emotion::Happy), 1);
        assert_eq!(source.starts.load(Ordering::SeqCst), 1);
    }
}
