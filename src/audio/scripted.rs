use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig};

/// Parameters for a deterministic capture run.
///
/// The backend emits `frame_count` frames of `frame_duration_ms` each, with a
/// repeating sample ramp seeded from `seed`, then keeps the stream open until
/// stopped. Identical scripts produce identical PCM, which is what the
/// deterministic answer-scoring in the simulated peer relies on.
#[derive(Debug, Clone)]
pub struct ScriptedCapture {
    pub frame_count: usize,
    pub frame_duration_ms: u64,
    /// Seed folded into every sample so distinct answers produce distinct audio
    pub seed: i16,
    /// Delay between emitted frames; zero emits the whole script immediately
    pub pacing_ms: u64,
}

impl Default for ScriptedCapture {
    fn default() -> Self {
        Self {
            frame_count: 5,
            frame_duration_ms: 100,
            seed: 7,
            pacing_ms: 0,
        }
    }
}

/// Deterministic capture backend used by tests and device-less demo runs.
pub struct ScriptedBackend {
    script: ScriptedCapture,
    config: CaptureConfig,
    capturing: bool,
    emit_task: Option<JoinHandle<()>>,
}

impl ScriptedBackend {
    pub fn new(script: ScriptedCapture, config: CaptureConfig) -> Self {
        Self {
            script,
            config,
            capturing: false,
            emit_task: None,
        }
    }

    /// The exact samples one frame of this script contains.
    pub fn frame_samples(script: &ScriptedCapture, config: &CaptureConfig, index: usize) -> Vec<i16> {
        let samples_per_frame = (config.target_sample_rate as u64 * script.frame_duration_ms / 1000)
            as usize
            * config.target_channels as usize;
        (0..samples_per_frame)
            .map(|i| script.seed.wrapping_mul(index as i16 + 1).wrapping_add(i as i16 % 64))
            .collect()
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            anyhow::bail!("scripted backend already capturing");
        }

        let (tx, rx) = mpsc::channel(64);

        let script = self.script.clone();
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            for index in 0..script.frame_count {
                if script.pacing_ms > 0 {
                    tokio::time::sleep(std::time::Duration::from_millis(script.pacing_ms)).await;
                }
                let frame = AudioFrame {
                    samples: ScriptedBackend::frame_samples(&script, &config, index),
                    sample_rate: config.target_sample_rate,
                    channels: config.target_channels,
                    timestamp_ms: index as u64 * script.frame_duration_ms,
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            // Hold the sender so the stream stays open until stop() aborts us.
            std::future::pending::<()>().await;
        });

        self.emit_task = Some(task);
        self.capturing = true;
        info!("Scripted capture started ({} frames)", self.script.frame_count);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.emit_task.take() {
            task.abort();
            let _ = task.await;
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
