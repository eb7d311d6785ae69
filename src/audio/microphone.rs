//! Microphone capture backend built on cpal.
//!
//! The cpal stream is not `Send`, so it lives on a dedicated thread for the
//! whole capture; the async side talks to it through channels. Frames are
//! converted to the target rate/channel layout before they leave the callback
//! thread.

use std::time::Instant;

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig};
use crate::error::SessionError;

pub struct MicrophoneBackend {
    config: CaptureConfig,
    capturing: bool,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    stream_thread: Option<std::thread::JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        Ok(Self {
            config,
            capturing: false,
            stop_tx: None,
            stream_thread: None,
        })
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            warn!("Microphone capture already started");
            anyhow::bail!("microphone backend already capturing");
        }

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let config = self.config.clone();

        // The stream must be created and dropped on the same thread.
        let handle = std::thread::spawn(move || {
            match build_input_stream(&config, frame_tx) {
                Ok(stream) => {
                    if ready_tx.send(Ok(())).is_err() {
                        return;
                    }
                    // Park until stop() or the backend is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.stream_thread = Some(handle);
                self.capturing = true;
                info!(
                    "Microphone capture started ({}Hz, {} channel(s))",
                    self.config.target_sample_rate, self.config.target_channels
                );
                Ok(frame_rx)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(anyhow::Error::new(SessionError::Media(
                "microphone stream thread exited before reporting readiness".to_string(),
            ))),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.stream_thread.take() {
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
            info!("Microphone capture stopped");
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        // Release the device even on abrupt teardown paths.
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

fn build_input_stream(
    config: &CaptureConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or_else(|| {
        SessionError::Permission("no input device available on the default audio host".to_string())
    })?;

    let supported = device.default_input_config().map_err(|err| {
        SessionError::Permission(format!("failed to query default input config: {err}"))
    })?;

    let device_rate = supported.sample_rate().0;
    let device_channels = supported.channels();
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();

    let target_rate = config.target_sample_rate;
    let target_channels = config.target_channels;
    let started = Instant::now();

    let forward = move |samples: Vec<i16>| {
        let converted = convert_frame(
            samples,
            device_rate,
            device_channels,
            target_rate,
            target_channels,
        );
        let frame = AudioFrame {
            samples: converted,
            sample_rate: target_rate,
            channels: target_channels,
            timestamp_ms: started.elapsed().as_millis() as u64,
        };
        // Never block the audio thread; a full queue just drops the frame.
        let _ = frame_tx.try_send(frame);
    };

    let err_fn = |err: cpal::StreamError| {
        error!("cpal stream error: {}", err);
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                forward(samples);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                forward(data.to_vec());
            },
            err_fn,
            None,
        ),
        other => {
            return Err(anyhow::Error::new(SessionError::Media(format!(
                "unsupported input sample format: {other:?}"
            ))));
        }
    };

    let stream =
        stream.map_err(|err| SessionError::Media(format!("failed to build input stream: {err}")))?;

    stream
        .play()
        .map_err(|err| SessionError::Media(format!("failed to start input stream: {err}")))?;

    Ok(stream)
}

/// Convert a device-format buffer to the target rate and channel layout.
fn convert_frame(
    samples: Vec<i16>,
    from_rate: u32,
    from_channels: u16,
    to_rate: u32,
    to_channels: u16,
) -> Vec<i16> {
    let mut processed = samples;

    if from_channels != to_channels && to_channels == 1 {
        processed = mix_to_mono(&processed, from_channels);
    }

    if from_rate != to_rate && from_rate > to_rate {
        processed = decimate(&processed, to_channels, from_rate, to_rate);
    }

    processed
}

/// Downsample by frame decimation. Cannot upsample.
fn decimate(samples: &[i16], channels: u16, from_rate: u32, to_rate: u32) -> Vec<i16> {
    let ratio = (from_rate / to_rate.max(1)) as usize;
    if ratio <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels.max(1) as usize)
        .step_by(ratio)
        .flatten()
        .copied()
        .collect()
}

/// Sum interleaved channels into mono (clamped, no division to preserve volume)
fn mix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16
        })
        .collect()
}
