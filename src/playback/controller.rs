use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::sink::{PlaybackCancel, PlaybackSink};
use crate::audio::AudioClip;

/// Completion notification for one playback, delivered into the session
/// queue. Emitted exactly once per play, for natural completion and for
/// user-initiated skips alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Finished { question_id: String },
}

/// Plays one question clip at a time and reports completion through a
/// channel rather than a callback, so the orchestrator can process it in
/// its own event order.
pub struct PlaybackController {
    sink: Box<dyn PlaybackSink>,
    notify: mpsc::Sender<PlaybackEvent>,
    current: Option<ActivePlayback>,
}

struct ActivePlayback {
    question_id: String,
    cancel: PlaybackCancel,
    watcher: JoinHandle<()>,
}

impl PlaybackController {
    pub fn new(sink: Box<dyn PlaybackSink>, notify: mpsc::Sender<PlaybackEvent>) -> Self {
        Self {
            sink,
            notify,
            current: None,
        }
    }

    /// Start playing a clip for the given question.
    ///
    /// Any stale playback is cancelled first; its completion signal still
    /// fires but is dropped by [`PlaybackController::on_finished`] because
    /// the current question no longer matches.
    pub fn play(&mut self, question_id: &str, clip: &AudioClip) -> Result<()> {
        if let Some(stale) = self.current.take() {
            warn!(
                "Starting playback for {} while {} is still active; cancelling",
                question_id, stale.question_id
            );
            stale.cancel.cancel();
            stale.watcher.abort();
        }

        let handle = self
            .sink
            .play(clip)
            .context("Failed to start question playback")?;
        let (done, cancel) = handle.into_parts();

        let notify = self.notify.clone();
        let id = question_id.to_string();

        let watcher = tokio::spawn(async move {
            let _ = done.await;
            let _ = notify.send(PlaybackEvent::Finished { question_id: id }).await;
        });

        info!(
            "Playing question audio {} ({} ms via {})",
            question_id, clip.duration_ms, self.sink.name()
        );

        self.current = Some(ActivePlayback {
            question_id: question_id.to_string(),
            cancel,
            watcher,
        });

        Ok(())
    }

    /// Cancel the active playback. No-op when idle. Completion is still
    /// signaled through the normal channel so transition logic is uniform.
    pub fn skip(&mut self) {
        match &self.current {
            Some(active) => {
                info!("Skipping question audio {}", active.question_id);
                active.cancel.cancel();
            }
            None => warn!("Skip requested with no active playback"),
        }
    }

    /// Acknowledge a completion event; clears the active slot when it
    /// matches the finished question.
    pub fn on_finished(&mut self, question_id: &str) {
        if self
            .current
            .as_ref()
            .is_some_and(|active| active.question_id == question_id)
        {
            self.current = None;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    /// Cancel anything active and stop watching. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(active) = self.current.take() {
            active.cancel.cancel();
            active.watcher.abort();
        }
    }
}
