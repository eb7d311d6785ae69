//! Audio output seams for question playback.
//!
//! [`RodioSink`] drives a real output device; [`NullSink`] completes after a
//! configurable latency so orchestrator behavior can be tested without audio
//! hardware. Both deliver completion through the same [`PlaybackHandle`],
//! whether playback drains naturally or is cancelled.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;
use tracing::error;

use crate::audio::AudioClip;
use crate::error::SessionError;

/// Handle to one in-flight playback.
pub struct PlaybackHandle {
    /// Fires exactly once, on natural completion or after cancellation.
    done: oneshot::Receiver<()>,
    cancel: PlaybackCancel,
}

impl PlaybackHandle {
    pub fn new(done: oneshot::Receiver<()>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            done,
            cancel: PlaybackCancel(cancel),
        }
    }

    pub fn into_parts(self) -> (oneshot::Receiver<()>, PlaybackCancel) {
        (self.done, self.cancel)
    }
}

/// Cancellation token for one playback. Cancelling still fires the
/// completion signal.
#[derive(Clone)]
pub struct PlaybackCancel(Arc<AtomicBool>);

impl PlaybackCancel {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// One audio artifact at a time, completion signaled exactly once.
pub trait PlaybackSink: Send {
    fn play(&mut self, clip: &AudioClip) -> Result<PlaybackHandle>;

    /// Sink name for logging
    fn name(&self) -> &str;
}

/// Plays WAV clips through the default output device via rodio.
///
/// rodio's output stream is not `Send`, so each playback runs on its own
/// thread which polls for cancellation while the sink drains.
pub struct RodioSink;

impl PlaybackSink for RodioSink {
    fn play(&mut self, clip: &AudioClip) -> Result<PlaybackHandle> {
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);
        let wav_bytes = clip.wav_bytes.clone();

        std::thread::spawn(move || {
            let played = play_blocking(wav_bytes, &cancel_flag);
            if let Err(err) = played {
                error!("Playback failed: {}", err);
            }
            let _ = done_tx.send(());
        });

        Ok(PlaybackHandle::new(done_rx, cancel))
    }

    fn name(&self) -> &str {
        "rodio"
    }
}

fn play_blocking(wav_bytes: Vec<u8>, cancel: &AtomicBool) -> Result<()> {
    let (_stream, handle) = rodio::OutputStream::try_default()
        .map_err(|err| SessionError::Media(format!("no output device available: {err}")))?;
    let sink = rodio::Sink::try_new(&handle)
        .map_err(|err| SessionError::Media(format!("failed to open output sink: {err}")))?;
    let source = rodio::Decoder::new(Cursor::new(wav_bytes))
        .map_err(|err| SessionError::Media(format!("failed to decode question audio: {err}")))?;

    sink.append(source);

    loop {
        if cancel.load(Ordering::SeqCst) {
            sink.stop();
            break;
        }
        if sink.empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    Ok(())
}

/// Output double that never touches a device.
///
/// Completes after `latency`; a zero latency completes on the next poll, a
/// longer one leaves the playing window open so tests can observe it and
/// issue skips.
pub struct NullSink {
    pub latency: Duration,
}

impl NullSink {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl PlaybackSink for NullSink {
    fn play(&mut self, _clip: &AudioClip) -> Result<PlaybackHandle> {
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);
        let latency = self.latency;

        tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + latency;
            loop {
                if cancel_flag.load(Ordering::SeqCst) {
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = done_tx.send(());
        });

        Ok(PlaybackHandle::new(done_rx, cancel))
    }

    fn name(&self) -> &str {
        "null"
    }
}
