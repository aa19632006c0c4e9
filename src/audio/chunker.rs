//! Continuous fixed-duration segment production.
//!
//! [`ChunkCapturer`] drives the capture state machine:
//!
//! ```text
//! Idle ──start()──▶ Requesting ──device ok──▶ Active ──stop()──▶ Idle
//!                       │
//!                       └──device/permission failure──▶ Error
//! ```
//!
//! `Error` is terminal for that attempt; a later `start()` retries from
//! scratch. `start()` while active and `stop()` while inactive are no-ops.
//!
//! cpal streams are `!Send`, so the device is opened and serviced on a
//! dedicated OS thread. The thread downmixes and resamples raw buffers,
//! slices them into chunk-sized blocks, WAV-encodes each block, and delivers
//! the result over a tokio channel. Dropping the stream guard on thread exit
//! releases the device — no leaked handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::AudioConfig;

use super::capture::{CaptureError, InputDevice};
use super::encode::AudioSegment;
use super::resample::{downmix_mono, resample};

// ---------------------------------------------------------------------------
// CaptureEvent / SegmentSource
// ---------------------------------------------------------------------------

/// What a running capturer delivers to its consumer.
#[derive(Debug)]
pub enum CaptureEvent {
    /// One completed, encoded segment.
    Segment(AudioSegment),
    /// The capture died after startup (device unplugged, stream closed).
    Failed(CaptureError),
}

/// Seam between the controller and the audio layer.
///
/// The real implementation is [`ChunkCapturer`]; controller tests substitute
/// a mock. Implementors must be `Send + Sync` (shared as
/// `Arc<dyn SegmentSource>`).
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Acquire the microphone and begin delivering [`CaptureEvent`]s to
    /// `events`. Re-entrant: a no-op when capture is already running.
    async fn start(&self, events: mpsc::Sender<CaptureEvent>) -> Result<(), CaptureError>;

    /// Halt segment production and release the device. A no-op when capture
    /// is not running.
    async fn stop(&self);
}

// ---------------------------------------------------------------------------
// SegmentAssembler
// ---------------------------------------------------------------------------

/// Slices a continuous mono sample stream into fixed-size blocks.
///
/// Pure accumulation logic, kept separate from the device plumbing so it can
/// be tested without hardware.
#[derive(Debug)]
pub struct SegmentAssembler {
    chunk_samples: usize,
    buffer: Vec<f32>,
}

impl SegmentAssembler {
    pub fn new(chunk_samples: usize) -> Self {
        Self {
            chunk_samples: chunk_samples.max(1),
            buffer: Vec::new(),
        }
    }

    /// Append samples, returning every completed chunk (possibly none,
    /// possibly several when a large buffer arrives at once).
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.buffer.extend_from_slice(samples);

        let mut complete = Vec::new();
        while self.buffer.len() >= self.chunk_samples {
            complete.push(self.buffer.drain(..self.chunk_samples).collect());
        }
        complete
    }

    /// Number of samples waiting for the next chunk boundary.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

// ---------------------------------------------------------------------------
// ChunkCapturer
// ---------------------------------------------------------------------------

/// Capture lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Requesting,
    Active,
    Error,
}

struct CapturerInner {
    state: CaptureState,
    stop_flag: Option<Arc<AtomicBool>>,
    worker: Option<thread::JoinHandle<()>>,
}

/// Microphone segment producer backed by a dedicated capture thread.
pub struct ChunkCapturer {
    config: AudioConfig,
    inner: Mutex<CapturerInner>,
}

impl ChunkCapturer {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CapturerInner {
                state: CaptureState::Idle,
                stop_flag: None,
                worker: None,
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CaptureState {
        self.inner.lock().unwrap().state
    }

    fn set_state(&self, state: CaptureState) {
        self.inner.lock().unwrap().state = state;
    }
}

#[async_trait]
impl SegmentSource for ChunkCapturer {
    async fn start(&self, events: mpsc::Sender<CaptureEvent>) -> Result<(), CaptureError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if matches!(inner.state, CaptureState::Requesting | CaptureState::Active) {
                return Ok(());
            }
            inner.state = CaptureState::Requesting;
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), CaptureError>>();

        let config = self.config.clone();
        let worker_flag = Arc::clone(&stop_flag);
        let spawned = thread::Builder::new()
            .name("audio-chunker".into())
            .spawn(move || capture_worker(config, events, worker_flag, ready_tx));

        let worker = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.set_state(CaptureState::Error);
                return Err(CaptureError::DeviceUnavailable(format!(
                    "failed to spawn capture thread: {e}"
                )));
            }
        };

        // Device acquisition happens on the worker thread; wait for its
        // verdict off the async runtime.
        let ready = tokio::task::spawn_blocking(move || ready_rx.recv()).await;

        match ready {
            Ok(Ok(Ok(()))) => {
                let mut inner = self.inner.lock().unwrap();
                inner.state = CaptureState::Active;
                inner.stop_flag = Some(stop_flag);
                inner.worker = Some(worker);
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                self.set_state(CaptureState::Error);
                let _ = worker.join();
                Err(e)
            }
            _ => {
                self.set_state(CaptureState::Error);
                Err(CaptureError::DeviceUnavailable(
                    "capture thread exited before reporting readiness".into(),
                ))
            }
        }
    }

    async fn stop(&self) {
        let (stop_flag, worker) = {
            let mut inner = self.inner.lock().unwrap();
            inner.state = CaptureState::Idle;
            (inner.stop_flag.take(), inner.worker.take())
        };

        if let Some(flag) = stop_flag {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(handle) = worker {
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Capture worker thread
// ---------------------------------------------------------------------------

/// Owns the cpal stream for the lifetime of one capture session.
fn capture_worker(
    config: AudioConfig,
    events: mpsc::Sender<CaptureEvent>,
    stop_flag: Arc<AtomicBool>,
    ready_tx: std::sync::mpsc::Sender<Result<(), CaptureError>>,
) {
    let device = match InputDevice::open() {
        Ok(device) => device,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let (raw_tx, raw_rx) = std::sync::mpsc::channel::<Vec<f32>>();
    let _guard = match device.stream(raw_tx) {
        Ok(guard) => guard,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));
    log::info!(
        "capture active: {} Hz, {} ch native → {} Hz mono, {} ms segments",
        device.sample_rate(),
        device.channels(),
        config.sample_rate,
        config.chunk_duration_ms
    );

    let channels = device.channels();
    let native_rate = device.sample_rate();
    let target_rate = config.sample_rate;
    let mut assembler = SegmentAssembler::new(config.chunk_samples());

    // Poll well inside the allowed inter-segment slack.
    let poll = Duration::from_millis((config.chunk_slack_ms / 4).max(1));

    while !stop_flag.load(Ordering::SeqCst) {
        match raw_rx.recv_timeout(poll) {
            Ok(buffer) => {
                let mono = downmix_mono(&buffer, channels);
                let resampled = resample(&mono, native_rate, target_rate);
                for block in assembler.push(&resampled) {
                    match AudioSegment::from_samples(&block, target_rate) {
                        Some(segment) => {
                            if events.blocking_send(CaptureEvent::Segment(segment)).is_err() {
                                // Consumer gone; shut down quietly.
                                return;
                            }
                        }
                        None => log::debug!("dropped empty capture window"),
                    }
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                let _ = events.blocking_send(CaptureEvent::Failed(
                    CaptureError::DeviceUnavailable("input stream closed unexpectedly".into()),
                ));
                return;
            }
        }
    }
    // _guard drops here: the cpal stream stops and the device is released.
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
