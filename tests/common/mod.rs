// Shared helpers for driving a session end to end with deterministic doubles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tokio::time::timeout;

use interview_coach::{
    CaptureConfig, ClientEvent, NullSink, ScriptedBackend, ScriptedCapture, SessionConfig,
    SessionHandle, SessionOrchestrator, SessionSnapshot, SimulatedPeerConfig, SimulatedTransport,
};

pub const WAIT: Duration = Duration::from_secs(10);

/// Spawn a session against the simulated peer with scripted capture and a
/// null playback sink. Returns the handle plus the transport's sent log.
pub fn scripted_session(
    peer: SimulatedPeerConfig,
    playback_latency: Duration,
) -> (SessionHandle, Arc<Mutex<Vec<ClientEvent>>>) {
    let question_count = peer.question_count;
    let transport = SimulatedTransport::new(peer);
    let sent = transport.sent_log();

    let capture_config = CaptureConfig::default();
    let capture = ScriptedBackend::new(ScriptedCapture::default(), capture_config.clone());

    let handle = SessionOrchestrator::spawn(
        SessionConfig {
            question_count,
            ..SessionConfig::default()
        },
        Box::new(transport),
        Box::new(capture),
        capture_config,
        Box::new(NullSink::new(playback_latency)),
    );

    (handle, sent)
}

/// Wait (bounded) until the published snapshot satisfies the predicate.
pub async fn wait_for<F>(handle: &SessionHandle, predicate: F) -> Result<SessionSnapshot>
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    timeout(WAIT, handle.wait_for(predicate)).await?
}

/// Answer every question as soon as recording is enabled, until the session
/// reaches a terminal phase. Returns the terminal snapshot.
pub async fn answer_until_terminal(handle: &SessionHandle) -> Result<SessionSnapshot> {
    let mut next_index = 0usize;
    loop {
        let snap = wait_for(handle, |s| {
            s.phase.is_terminal() || (s.phase.recording_enabled() && s.current_index == next_index)
        })
        .await?;
        if snap.phase.is_terminal() {
            return Ok(snap);
        }

        handle.start_recording().await?;
        let snap = wait_for(handle, |s| s.recording || s.phase.is_terminal()).await?;
        if snap.phase.is_terminal() {
            return Ok(snap);
        }
        handle.stop_recording().await?;

        next_index += 1;
    }
}

/// The phase trail of one clean N-question session.
pub fn expected_phase_log(question_count: usize) -> Vec<&'static str> {
    let mut log = vec!["idle", "connecting", "awaiting_questions"];
    for _ in 0..question_count {
        log.extend([
            "presenting_question",
            "submitting_answer",
            "awaiting_analysis",
            "advancing",
        ]);
    }
    log.push("completed");
    log
}
