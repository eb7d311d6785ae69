pub mod events;

pub use events::{
    AnswerAnalysis, AnswerMetrics, CandidateProfile, ClientEvent, InterviewSummary, PeerErrorKind,
    PeerEvent, Question, QuestionCategory, RoleProfile, Rubric,
};
