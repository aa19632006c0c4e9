//! Application entry point — real-time emotion monitor.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Probe the classification service (`GET /health`).
//! 4. Build the [`HttpClassifier`] and [`ChunkCapturer`].
//! 5. Create the controller event channel and spawn
//!    [`CaptureController::run`].
//! 6. Start a session and a periodic status reporter.
//! 7. Wait for Ctrl-C, then shut the controller down (stopping any live
//!    session), drain, and print the session summary.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use emotion_monitor::{
    api::{Emotion, HttpClassifier},
    audio::ChunkCapturer,
    config::AppConfig,
    pipeline::{new_shared_state, CaptureController, ControllerEvent, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("failed to load config, using defaults: {e}");
            AppConfig::default()
        }
    };
    log::info!(
        "service {}, {} ms segments at {} Hz",
        config.api.base_url,
        config.audio.chunk_duration_ms,
        config.audio.sample_rate
    );

    let classifier = Arc::new(HttpClassifier::from_config(&config.api));

    // A cold or absent service is not fatal; individual requests will
    // surface their own errors.
    match classifier.health().await {
        Ok(health) => log::info!(
            "service healthy: status={}, model_loaded={}",
            health.status,
            health.model_loaded
        ),
        Err(e) => log::warn!("service health check failed: {e}"),
    }

    let state = new_shared_state();
    let source = Arc::new(ChunkCapturer::new(config.audio.clone()));
    let (event_tx, event_rx) = mpsc::channel::<ControllerEvent>(32);

    let controller = CaptureController::new(
        Arc::clone(&state),
        source,
        classifier,
        event_tx.clone(),
        config.session.timeline_items,
    );
    let controller_task = tokio::spawn(controller.run(event_rx));

    event_tx.send(ControllerEvent::ToggleRequested).await?;

    let reporter = tokio::spawn(report_loop(
        Arc::clone(&state),
        Duration::from_secs(config.session.report_interval_secs),
    ));

    tokio::signal::ctrl_c().await?;
    log::info!("interrupt received, stopping session");

    // Shutdown stops a still-active session itself. A toggle here would
    // restart (and wipe) a session already forced inactive by a capture
    // failure.
    event_tx.send(ControllerEvent::Shutdown).await?;
    controller_task.await?;
    reporter.abort();

    print_summary(&state);
    Ok(())
}

// ---------------------------------------------------------------------------
// Status reporting
// ---------------------------------------------------------------------------

/// Log a one-line status snapshot at a fixed interval.
async fn report_loop(state: SharedState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;

        let (line, notice) = {
            let st = state.lock().unwrap();
            let last = st
                .last_prediction
                .as_ref()
                .map(|p| format!("{} ({:.0}%)", p.emotion, p.confidence * 100.0))
                .unwrap_or_else(|| "-".into());
            (
                format!(
                    "[{}] {} | predictions: {} | last: {} | dropped: {}",
                    st.stats.elapsed_display(),
                    st.phase.label(),
                    st.stats.total,
                    last,
                    st.dropped_segments
                ),
                st.error_notice.clone(),
            )
        };

        log::info!("{line}");
        if let Some(notice) = notice {
            log::warn!("last error: {notice}");
        }
    }
}

/// Final per-emotion breakdown, printed once on exit.
fn print_summary(state: &SharedState) {
    let st = state.lock().unwrap();
    log::info!(
        "session summary: {} predictions over {}",
        st.stats.total,
        st.stats.elapsed_display()
    );
    for emotion in Emotion::ALL {
        log::info!(
            "  {:<8} {:>4}  ({:.0}%)",
            emotion.label(),
            st.stats.counts.get(emotion),
            st.stats.counts.fraction(emotion) * 100.0
        );
    }
    if st.dropped_segments > 0 {
        log::info!("  dropped segments: {}", st.dropped_segments);
    }
}
