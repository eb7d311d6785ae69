pub mod backend;
pub mod clip;
pub mod microphone;
pub mod recorder;
pub mod scripted;

pub use backend::{AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource};
pub use clip::AudioClip;
pub use microphone::MicrophoneBackend;
pub use recorder::AnswerRecorder;
pub use scripted::{ScriptedBackend, ScriptedCapture};
