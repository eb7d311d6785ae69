//! Wire vocabulary between the session client and the scoring peer.
//!
//! Every message is a member of one of two closed tagged unions:
//! [`ClientEvent`] (client -> peer) and [`PeerEvent`] (peer -> client).
//! Payloads that do not deserialize into these unions are rejected at the
//! transport boundary and never reach the orchestrator.

use serde::{Deserialize, Serialize};

/// Category tag attached to each generated question. Closed set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Behavioral,
    Technical,
    Leadership,
}

/// A single interview question. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    /// Unique identifier assigned by the peer
    pub id: String,
    /// Prompt text read to the candidate
    pub text: String,
    pub category: QuestionCategory,
}

/// Structured candidate profile produced by the resume parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateProfile {
    pub name: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub years_experience: u32,
}

/// Target-role profile produced by the job-posting parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleProfile {
    pub title: String,
    pub company: String,
    pub requirements: Vec<String>,
}

/// Boolean sub-scores returned for each analyzed answer. Closed set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rubric {
    pub addresses_question: bool,
    pub specific_examples: bool,
    pub structured_response: bool,
    pub outcome_oriented: bool,
}

/// Metrics derived from the submitted audio.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AnswerMetrics {
    pub filler_words: u32,
    pub duration_secs: f32,
}

/// Scored feedback for one submitted answer. Arrives exactly once per
/// submission, keyed by question identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerAnalysis {
    pub question_id: String,
    /// Bounded 0-100
    pub score: u8,
    pub rubric: Rubric,
    pub feedback: String,
    pub metrics: AnswerMetrics,
}

/// Terminal results delivered after the completion handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterviewSummary {
    /// Bounded 0-100
    pub overall_score: u8,
    pub per_question: Vec<AnswerAnalysis>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub follow_up: String,
}

/// Error classes the peer may report. Closed set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeerErrorKind {
    Protocol,
    Scoring,
    Internal,
}

/// Messages sent from the session client to the scoring peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    StartInterview {
        candidate_profile: CandidateProfile,
        role_profile: RoleProfile,
    },
    SubmitAnswer {
        question_id: String,
        /// Base64-encoded WAV bytes of the captured answer
        audio_b64: String,
    },
    CompleteInterview {},
}

impl ClientEvent {
    /// Wire name, also used as the NATS subject segment.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::StartInterview { .. } => "start_interview",
            ClientEvent::SubmitAnswer { .. } => "submit_answer",
            ClientEvent::CompleteInterview {} => "complete_interview",
        }
    }
}

/// Messages delivered from the scoring peer to the session client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PeerEvent {
    /// The full question batch, in presentation order. The batch size is
    /// fixed per session; a different length is a protocol violation.
    QuestionsGenerated(Vec<Question>),
    QuestionAudio {
        question_id: String,
        /// Base64-encoded WAV bytes of the spoken question
        audio_b64: String,
    },
    AnswerAnalyzed(AnswerAnalysis),
    InterviewComplete(InterviewSummary),
    Error {
        kind: PeerErrorKind,
        message: String,
    },
}

impl PeerEvent {
    /// Wire name, also used as the NATS subject segment.
    pub fn name(&self) -> &'static str {
        match self {
            PeerEvent::QuestionsGenerated(_) => "questions_generated",
            PeerEvent::QuestionAudio { .. } => "question_audio",
            PeerEvent::AnswerAnalyzed(_) => "answer_analyzed",
            PeerEvent::InterviewComplete(_) => "interview_complete",
            PeerEvent::Error { .. } => "error",
        }
    }
}
