// End-to-end orchestrator scenarios driven through the simulated peer.
//
// These tests use deterministic doubles everywhere (simulated transport,
// scripted capture, null playback) so every run observes the same phase
// trail and the same wire traffic.

mod common;

use std::time::Duration;

use common::{answer_until_terminal, expected_phase_log, scripted_session, wait_for};
use interview_coach::{
    ClientEvent, PeerFault, SessionErrorKind, SessionPhase, SimulatedPeerConfig,
};

fn quiet_peer(question_count: usize) -> SimulatedPeerConfig {
    SimulatedPeerConfig {
        question_count,
        response_delay: Duration::from_millis(5),
        audio_delay: Duration::from_millis(2),
        include_question_audio: false,
        fault: None,
    }
}

#[tokio::test]
async fn full_session_reaches_completed_with_bounded_score() {
    let (handle, sent) = scripted_session(quiet_peer(8), Duration::ZERO);
    handle.start().await.unwrap();

    let snap = answer_until_terminal(&handle).await.unwrap();

    assert_eq!(snap.phase, SessionPhase::Completed);
    let summary = snap.summary.expect("completed session carries a summary");
    assert!(summary.overall_score <= 100);
    assert_eq!(summary.per_question.len(), 8);
    assert_eq!(snap.feedback.len(), 8);
    assert_eq!(snap.answered, 8);

    // One start, eight submissions, one completion.
    let sent = sent.lock().await;
    assert_eq!(sent.len(), 10);
    assert!(matches!(sent[0], ClientEvent::StartInterview { .. }));
    assert!(matches!(sent[9], ClientEvent::CompleteInterview {}));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn submitted_question_ids_follow_batch_order_without_duplicates() {
    let (handle, sent) = scripted_session(quiet_peer(4), Duration::ZERO);
    handle.start().await.unwrap();
    answer_until_terminal(&handle).await.unwrap();

    let submitted: Vec<String> = sent
        .lock()
        .await
        .iter()
        .filter_map(|event| match event {
            ClientEvent::SubmitAnswer { question_id, .. } => Some(question_id.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(submitted, vec!["q-1", "q-2", "q-3", "q-4"]);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn phase_trail_matches_the_state_machine() {
    let (handle, _sent) = scripted_session(quiet_peer(2), Duration::ZERO);
    handle.start().await.unwrap();

    let snap = answer_until_terminal(&handle).await.unwrap();
    assert_eq!(snap.phase_log, expected_phase_log(2));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn recording_never_enabled_while_audio_is_playing() {
    let peer = SimulatedPeerConfig {
        include_question_audio: true,
        ..quiet_peer(3)
    };
    // Long enough that playback windows are observable.
    let (handle, _sent) = scripted_session(peer, Duration::from_millis(300));

    let mut rx = handle.snapshot();
    let collector = tokio::spawn(async move {
        let mut snaps = vec![rx.borrow().clone()];
        while rx.changed().await.is_ok() {
            snaps.push(rx.borrow_and_update().clone());
        }
        snaps
    });

    handle.start().await.unwrap();

    let mut next_index = 0usize;
    loop {
        // Audio for the presented question always arrives and plays before
        // anyone records, so wait through the playback window first.
        let snap = wait_for(&handle, |s| {
            s.phase.is_terminal() || (s.phase.audio_playing() && s.current_index == next_index)
        })
        .await
        .unwrap();
        if snap.phase.is_terminal() {
            break;
        }

        handle.skip_audio().await.unwrap();
        wait_for(&handle, |s| s.phase.recording_enabled())
            .await
            .unwrap();

        handle.start_recording().await.unwrap();
        wait_for(&handle, |s| s.recording).await.unwrap();
        handle.stop_recording().await.unwrap();

        next_index += 1;
    }

    handle.shutdown().await.unwrap();

    let snaps = collector.await.unwrap();
    assert!(snaps.len() > 4);
    for snap in snaps {
        assert!(
            !(snap.recording_enabled() && snap.phase.audio_playing()),
            "recording enabled during playback in phase {:?}",
            snap.phase
        );
        assert!(
            !(snap.recording && snap.phase.audio_playing()),
            "microphone active during playback"
        );
    }
}

#[tokio::test]
async fn skip_enables_recording_without_any_wire_traffic() {
    let peer = SimulatedPeerConfig {
        include_question_audio: true,
        ..quiet_peer(2)
    };
    let (handle, sent) = scripted_session(peer, Duration::from_secs(30));
    handle.start().await.unwrap();

    wait_for(&handle, |s| s.phase.audio_playing()).await.unwrap();
    let sent_before = sent.lock().await.len();

    handle.skip_audio().await.unwrap();
    let snap = wait_for(&handle, |s| s.phase.recording_enabled())
        .await
        .unwrap();

    assert!(!snap.phase.audio_playing());
    assert_eq!(sent.lock().await.len(), sent_before, "skip must not send");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn disconnect_while_awaiting_analysis_errors_and_stops_submitting() {
    let peer = SimulatedPeerConfig {
        fault: Some(PeerFault::DisconnectOnAnswer(1)),
        ..quiet_peer(3)
    };
    let (handle, sent) = scripted_session(peer, Duration::ZERO);
    handle.start().await.unwrap();

    let snap = answer_until_terminal(&handle).await.unwrap();
    match &snap.phase {
        SessionPhase::Errored { kind, .. } => assert_eq!(*kind, SessionErrorKind::Transport),
        other => panic!("expected errored phase, got {other:?}"),
    }

    let submissions_at_error = sent
        .lock()
        .await
        .iter()
        .filter(|e| matches!(e, ClientEvent::SubmitAnswer { .. }))
        .count();
    assert_eq!(submissions_at_error, 1);

    // Further commands must never produce another submission.
    handle.start_recording().await.unwrap();
    handle.stop_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let submissions_after = sent
        .lock()
        .await
        .iter()
        .filter(|e| matches!(e, ClientEvent::SubmitAnswer { .. }))
        .count();
    assert_eq!(submissions_after, 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn wrong_batch_size_is_a_fatal_protocol_violation() {
    let peer = SimulatedPeerConfig {
        fault: Some(PeerFault::WrongBatchSize(5)),
        ..quiet_peer(8)
    };
    let (handle, _sent) = scripted_session(peer, Duration::ZERO);
    handle.start().await.unwrap();

    let snap = wait_for(&handle, |s| s.phase.is_terminal()).await.unwrap();
    match &snap.phase {
        SessionPhase::Errored { kind, message } => {
            assert_eq!(*kind, SessionErrorKind::Protocol);
            assert!(message.contains("expected a batch of 8"));
        }
        other => panic!("expected errored phase, got {other:?}"),
    }

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn stray_analysis_for_unknown_question_is_ignored() {
    let peer = SimulatedPeerConfig {
        fault: Some(PeerFault::StrayAnalysis),
        ..quiet_peer(2)
    };
    let (handle, _sent) = scripted_session(peer, Duration::ZERO);
    handle.start().await.unwrap();

    let snap = answer_until_terminal(&handle).await.unwrap();

    // The stray identifier never advances or pollutes the session.
    assert_eq!(snap.phase, SessionPhase::Completed);
    assert_eq!(snap.feedback.len(), 2);
    assert!(snap.feedback.iter().all(|a| a.question_id != "q-stray"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn refused_connection_errors_the_session() {
    let peer = SimulatedPeerConfig {
        fault: Some(PeerFault::RefuseConnection),
        ..quiet_peer(2)
    };
    let (handle, _sent) = scripted_session(peer, Duration::ZERO);
    handle.start().await.unwrap();

    let snap = wait_for(&handle, |s| s.phase.is_terminal()).await.unwrap();
    match &snap.phase {
        SessionPhase::Errored { kind, .. } => assert_eq!(*kind, SessionErrorKind::Transport),
        other => panic!("expected errored phase, got {other:?}"),
    }

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn stop_recording_when_idle_changes_nothing() {
    let (handle, sent) = scripted_session(quiet_peer(2), Duration::ZERO);
    handle.start().await.unwrap();

    let before = wait_for(&handle, |s| s.phase.recording_enabled())
        .await
        .unwrap();

    handle.stop_recording().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let after = handle.snapshot().borrow().clone();
    assert_eq!(after.phase, before.phase);
    assert_eq!(after.phase_log, before.phase_log);
    assert_eq!(after.answered, 0);
    assert!(sent
        .lock()
        .await
        .iter()
        .all(|e| !matches!(e, ClientEvent::SubmitAnswer { .. })));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn late_question_audio_plays_until_an_answer_begins() {
    // Audio is delivered after the batch, so the first presentation starts
    // without it; arrival then flips the session back into the playback
    // window, but only because no recording has begun.
    let peer = SimulatedPeerConfig {
        include_question_audio: true,
        audio_delay: Duration::from_millis(30),
        ..quiet_peer(2)
    };
    let (handle, _sent) = scripted_session(peer, Duration::from_millis(300));
    handle.start().await.unwrap();

    // Presented first without audio...
    let snap = wait_for(&handle, |s| s.phase.recording_enabled())
        .await
        .unwrap();
    assert_eq!(snap.current_index, 0);

    // ...then the late clip arrives and playback begins.
    let snap = wait_for(&handle, |s| s.phase.audio_playing()).await.unwrap();
    assert_eq!(snap.current_index, 0);

    // Natural completion re-enables recording.
    wait_for(&handle, |s| s.phase.recording_enabled())
        .await
        .unwrap();

    handle.shutdown().await.unwrap();
}
