use serde::{Deserialize, Serialize};

use crate::protocol::{CandidateProfile, RoleProfile};

/// Configuration for one interview session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "interview-2026-08-05-staff-eng")
    pub session_id: String,

    /// Fixed number of questions the peer must deliver; a batch of any
    /// other size is a protocol violation
    pub question_count: usize,

    /// Candidate profile from the resume parser, sent with start_interview
    pub candidate: CandidateProfile,

    /// Target-role profile from the job-posting parser
    pub role: RoleProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("interview-{}", uuid::Uuid::new_v4()),
            question_count: 8,
            candidate: CandidateProfile::default(),
            role: RoleProfile::default(),
        }
    }
}
