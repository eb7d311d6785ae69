use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{CaptureBackend, CaptureConfig};
use super::clip::AudioClip;

/// Owns the microphone for the lifetime of a session and turns each
/// start/stop cycle into exactly one finalized [`AudioClip`].
///
/// The recorder knows nothing about protocol rules (whether recording is
/// allowed right now is the orchestrator's call); it only guarantees device
/// ownership, one clip per stop, and release on every exit path.
pub struct AnswerRecorder {
    backend: Box<dyn CaptureBackend>,
    config: CaptureConfig,
    active: Option<ActiveRecording>,
}

struct ActiveRecording {
    samples: Arc<Mutex<Vec<i16>>>,
    drain_task: JoinHandle<()>,
}

impl AnswerRecorder {
    pub fn new(backend: Box<dyn CaptureBackend>, config: CaptureConfig) -> Self {
        Self {
            backend,
            config,
            active: None,
        }
    }

    /// Begin capturing. No-op if already recording.
    pub async fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            warn!("Recording already started");
            return Ok(());
        }

        let mut frame_rx = self
            .backend
            .start()
            .await
            .context("Failed to start capture backend")?;

        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&samples);

        let drain_task = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                let mut buffer = sink.lock().await;
                buffer.extend_from_slice(&frame.samples);
            }
        });

        self.active = Some(ActiveRecording {
            samples,
            drain_task,
        });

        info!("Answer recording started ({})", self.backend.name());
        Ok(())
    }

    /// Stop capturing and finalize the clip.
    ///
    /// Returns `None` (no error, no state change) when not recording.
    pub async fn stop(&mut self) -> Result<Option<AudioClip>> {
        let Some(recording) = self.active.take() else {
            return Ok(None);
        };

        // Stopping the backend closes the frame channel, which ends the
        // drain task once the tail frames are flushed.
        self.backend
            .stop()
            .await
            .context("Failed to stop capture backend")?;

        recording
            .drain_task
            .await
            .context("Recording drain task panicked")?;

        let samples = recording.samples.lock().await;
        let clip = AudioClip::from_samples(
            &samples,
            self.config.target_sample_rate,
            self.config.target_channels,
        )?;

        info!(
            "Answer recording finalized ({} ms, {} samples)",
            clip.duration_ms,
            samples.len()
        );

        Ok(Some(clip))
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Abandon any in-flight recording and release the device. Idempotent.
    pub async fn teardown(&mut self) {
        if let Some(recording) = self.active.take() {
            if let Err(err) = self.backend.stop().await {
                warn!("Failed to stop capture backend during teardown: {}", err);
            }
            recording.drain_task.abort();
            let _ = recording.drain_task.await;
            info!("Discarded in-flight recording during teardown");
        }
    }
}
