//! Session phases and the observable snapshot.
//!
//! The phase graph is:
//!
//! ```text
//! Idle -> Connecting -> AwaitingQuestions -> PresentingQuestion{audio_playing}
//!      -> SubmittingAnswer -> AwaitingAnalysis -> Advancing -+-> PresentingQuestion (next)
//!                                                            +-> Completed (after summary)
//! any non-terminal state -> Errored
//! ```
//!
//! `Completed` and `Errored` are terminal; recovery from `Errored` is a new
//! session, never a silent resume.

use crate::error::SessionErrorKind;
use crate::protocol::{AnswerAnalysis, InterviewSummary, Question};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    /// No session activity yet
    Idle,

    /// Transport channel being established
    Connecting,

    /// start_interview sent; waiting for the question batch
    AwaitingQuestions,

    /// A question is on screen. Recording is enabled exactly when its
    /// audio is not playing.
    PresentingQuestion { audio_playing: bool },

    /// A finalized answer is being dispatched; recording stays disabled
    SubmittingAnswer,

    /// Submission dispatched; waiting for the matching analysis
    AwaitingAnalysis,

    /// Analysis received; moving to the next question or the completion
    /// handshake
    Advancing,

    /// Terminal: summary received, results available
    Completed,

    /// Terminal: unrecoverable failure; restart required
    Errored {
        kind: SessionErrorKind,
        message: String,
    },
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Errored { .. })
    }

    /// Recording may only be armed while presenting with playback finished
    /// or skipped. This is the `recording_enabled => !audio_playing`
    /// invariant in executable form.
    pub fn recording_enabled(&self) -> bool {
        matches!(
            self,
            SessionPhase::PresentingQuestion {
                audio_playing: false
            }
        )
    }

    pub fn audio_playing(&self) -> bool {
        matches!(self, SessionPhase::PresentingQuestion { audio_playing: true })
    }

    /// A short label for logs and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Connecting => "connecting",
            SessionPhase::AwaitingQuestions => "awaiting_questions",
            SessionPhase::PresentingQuestion { .. } => "presenting_question",
            SessionPhase::SubmittingAnswer => "submitting_answer",
            SessionPhase::AwaitingAnalysis => "awaiting_analysis",
            SessionPhase::Advancing => "advancing",
            SessionPhase::Completed => "completed",
            SessionPhase::Errored { .. } => "errored",
        }
    }
}

/// Read-only view of the session published after every transition.
///
/// UI layers subscribe to this through a `tokio::sync::watch` receiver and
/// issue commands back; they never mutate session state directly.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub phase: SessionPhase,

    /// Fixed batch size for this session
    pub question_count: usize,

    /// 0-based index of the question being presented; monotonically
    /// non-decreasing for the life of the session
    pub current_index: usize,

    pub current_question: Option<Question>,

    /// Whether the microphone is actively capturing
    pub recording: bool,

    /// Number of answers submitted so far
    pub answered: usize,

    /// Analyses received so far, in submission order
    pub feedback: Vec<AnswerAnalysis>,

    /// Terminal results, present only in `Completed`
    pub summary: Option<InterviewSummary>,

    /// Most recent locally-recoverable failure (microphone permission or
    /// device trouble); cleared when the next media operation succeeds
    pub notice: Option<String>,

    /// Phase labels in transition order, consecutive duplicates collapsed.
    /// Feeds the UI progress trail and lets tests compare whole sessions.
    pub phase_log: Vec<&'static str>,
}

impl SessionSnapshot {
    pub fn new(session_id: &str, question_count: usize) -> Self {
        Self {
            session_id: session_id.to_string(),
            phase: SessionPhase::Idle,
            question_count,
            current_index: 0,
            current_question: None,
            recording: false,
            answered: 0,
            feedback: Vec::new(),
            summary: None,
            notice: None,
            phase_log: vec![SessionPhase::Idle.label()],
        }
    }

    pub fn recording_enabled(&self) -> bool {
        self.phase.recording_enabled()
    }
}
