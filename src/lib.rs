pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod transport;

pub use audio::{
    AnswerRecorder, AudioClip, AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig,
    CaptureSource, MicrophoneBackend, ScriptedBackend, ScriptedCapture,
};
pub use config::Config;
pub use error::{SessionError, SessionErrorKind};
pub use playback::{NullSink, PlaybackController, PlaybackEvent, PlaybackSink, RodioSink};
pub use protocol::{
    AnswerAnalysis, AnswerMetrics, CandidateProfile, ClientEvent, InterviewSummary, PeerEvent,
    Question, QuestionCategory, RoleProfile, Rubric,
};
pub use session::{
    Answer, SessionCommand, SessionConfig, SessionHandle, SessionOrchestrator, SessionPhase,
    SessionSnapshot,
};
pub use transport::{
    NatsTransport, PeerAction, PeerFault, PeerScript, SessionTransport, SimulatedPeerConfig,
    SimulatedTransport, TransportEvent,
};
