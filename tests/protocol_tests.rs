use interview_coach::{
    AnswerAnalysis, AnswerMetrics, CandidateProfile, ClientEvent, InterviewSummary, PeerEvent,
    Question, QuestionCategory, RoleProfile, Rubric,
};

#[test]
fn test_start_interview_wire_shape() {
    let event = ClientEvent::StartInterview {
        candidate_profile: CandidateProfile {
            name: "Ada".to_string(),
            summary: "Backend engineer".to_string(),
            skills: vec!["rust".to_string()],
            years_experience: 6,
        },
        role_profile: RoleProfile {
            title: "Staff Engineer".to_string(),
            company: "Acme".to_string(),
            requirements: vec!["distributed systems".to_string()],
        },
    };

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"start_interview\""));
    assert!(json.contains("\"candidate_profile\""));
    assert!(json.contains("\"role_profile\""));

    let deserialized: ClientEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.name(), "start_interview");
    assert_eq!(deserialized, event);
}

#[test]
fn test_submit_answer_wire_shape() {
    let event = ClientEvent::SubmitAnswer {
        question_id: "q-3".to_string(),
        audio_b64: "UklGRg==".to_string(),
    };

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"submit_answer\""));
    assert!(json.contains("\"question_id\":\"q-3\""));

    let deserialized: ClientEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, event);
}

#[test]
fn test_complete_interview_has_empty_payload() {
    let json = serde_json::to_string(&ClientEvent::CompleteInterview {}).unwrap();
    assert_eq!(json, r#"{"type":"complete_interview","payload":{}}"#);
}

#[test]
fn test_question_batch_payload_is_an_ordered_array() {
    let event = PeerEvent::QuestionsGenerated(vec![
        Question {
            id: "q-1".to_string(),
            text: "Tell me about a conflict you resolved.".to_string(),
            category: QuestionCategory::Behavioral,
        },
        Question {
            id: "q-2".to_string(),
            text: "Design a rate limiter.".to_string(),
            category: QuestionCategory::Technical,
        },
    ]);

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"questions_generated\""));
    assert!(json.contains(r#""payload":[{"#));
    assert!(json.contains("\"category\":\"behavioral\""));
    assert!(json.contains("\"category\":\"technical\""));

    let deserialized: PeerEvent = serde_json::from_str(&json).unwrap();
    match deserialized {
        PeerEvent::QuestionsGenerated(questions) => {
            assert_eq!(questions.len(), 2);
            assert_eq!(questions[0].id, "q-1");
            assert_eq!(questions[1].id, "q-2");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn test_answer_analyzed_round_trip() {
    let event = PeerEvent::AnswerAnalyzed(AnswerAnalysis {
        question_id: "q-5".to_string(),
        score: 82,
        rubric: Rubric {
            addresses_question: true,
            specific_examples: true,
            structured_response: false,
            outcome_oriented: true,
        },
        feedback: "Good arc, weak structure.".to_string(),
        metrics: AnswerMetrics {
            filler_words: 4,
            duration_secs: 61.5,
        },
    });

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"answer_analyzed\""));
    assert!(json.contains("\"score\":82"));
    assert!(json.contains("\"filler_words\":4"));

    let deserialized: PeerEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, event);
}

#[test]
fn test_interview_complete_round_trip() {
    let event = PeerEvent::InterviewComplete(InterviewSummary {
        overall_score: 77,
        per_question: Vec::new(),
        strengths: vec!["Concrete examples".to_string()],
        improvements: vec!["Tighter openings".to_string()],
        follow_up: "Re-run the technical questions.".to_string(),
    });

    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"type\":\"interview_complete\""));
    assert!(json.contains("\"overall_score\":77"));

    let deserialized: PeerEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, event);
}

#[test]
fn test_unknown_event_tag_is_rejected() {
    let json = r#"{"type":"question_regenerated","payload":{"id":"q-1"}}"#;
    assert!(serde_json::from_str::<PeerEvent>(json).is_err());

    let json = r#"{"type":"cancel_interview","payload":{}}"#;
    assert!(serde_json::from_str::<ClientEvent>(json).is_err());
}

#[test]
fn test_category_outside_the_closed_set_is_rejected() {
    let json = r#"{"id":"q-1","text":"x","category":"brainteaser"}"#;
    assert!(serde_json::from_str::<Question>(json).is_err());
}

#[test]
fn test_peer_error_event_parses() {
    let json = r#"{"type":"error","payload":{"kind":"scoring","message":"model overloaded"}}"#;
    let event: PeerEvent = serde_json::from_str(json).unwrap();
    match event {
        PeerEvent::Error { message, .. } => assert_eq!(message, "model overloaded"),
        other => panic!("unexpected event: {other:?}"),
    }
}
