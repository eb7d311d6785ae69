// Conformance suite for SessionTransport implementations.
//
// Both transports must carry the orchestrator through the identical phase
// sequence for the same peer behavior. The simulated variant always runs;
// the live variant is ignored by default because it needs a reachable NATS
// server (`cargo test -- --ignored` with a local broker to exercise it).

mod common;

use std::time::Duration;

use common::{answer_until_terminal, expected_phase_log, scripted_session};
use futures::StreamExt;
use interview_coach::{
    CaptureConfig, ClientEvent, NatsTransport, NullSink, PeerAction, PeerScript, ScriptedBackend,
    ScriptedCapture, SessionConfig, SessionOrchestrator, SessionTransport, SimulatedPeerConfig,
    SimulatedTransport,
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
async fn simulated_transport_drives_the_canonical_phase_sequence() {
    let (handle, _sent) = scripted_session(quiet_peer(3), Duration::ZERO);
    handle.start().await.unwrap();

    let snap = answer_until_terminal(&handle).await.unwrap();
    assert_eq!(snap.phase_log, expected_phase_log(3));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn connect_is_idempotent() {
    let mut transport = SimulatedTransport::new(quiet_peer(2));
    transport.connect().await.unwrap();
    assert!(transport.is_connected());

    // Second connect must not error or open a second live channel.
    transport.connect().await.unwrap();
    assert!(transport.is_connected());

    transport.close().await.unwrap();
}

#[tokio::test]
async fn close_is_idempotent_even_when_never_connected() {
    let mut transport = SimulatedTransport::new(quiet_peer(2));
    transport.close().await.unwrap();
    transport.close().await.unwrap();
    assert!(!transport.is_connected());

    let mut transport = NatsTransport::new("nats://localhost:4222", "conformance-close");
    transport.close().await.unwrap();
    transport.close().await.unwrap();
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn incoming_is_taken_once_per_connection() {
    let mut transport = SimulatedTransport::new(quiet_peer(2));
    assert!(transport.incoming().is_none(), "no receiver before connect");

    transport.connect().await.unwrap();
    assert!(transport.incoming().is_some());
    assert!(transport.incoming().is_none(), "receiver is single-take");

    transport.close().await.unwrap();
}

#[tokio::test]
async fn send_requires_a_connection() {
    let transport = SimulatedTransport::new(quiet_peer(2));
    let result = transport.send(ClientEvent::CompleteInterview {}).await;
    assert!(result.is_err());
}

#[tokio::test]
#[ignore = "requires a NATS server at nats://localhost:4222"]
async fn live_transport_matches_the_simulated_phase_sequence() {
    let nats_url = "nats://localhost:4222";
    let session_id = format!("conformance-{}", uuid::Uuid::new_v4());
    let peer_config = quiet_peer(3);

    // Reference run over the in-process double.
    let (handle, _sent) = scripted_session(peer_config.clone(), Duration::ZERO);
    handle.start().await.unwrap();
    let simulated = answer_until_terminal(&handle).await.unwrap();
    handle.shutdown().await.unwrap();

    // The same scripted peer, replayed over the real broker.
    let peer_task = spawn_nats_peer(nats_url, &session_id, peer_config).await;

    let capture_config = CaptureConfig::default();
    let handle = SessionOrchestrator::spawn(
        SessionConfig {
            session_id: session_id.clone(),
            question_count: 3,
            ..SessionConfig::default()
        },
        Box::new(NatsTransport::new(nats_url, &session_id)),
        Box::new(ScriptedBackend::new(
            ScriptedCapture::default(),
            capture_config.clone(),
        )),
        capture_config,
        Box::new(NullSink::new(Duration::ZERO)),
    );
    handle.start().await.unwrap();
    let live = answer_until_terminal(&handle).await.unwrap();
    handle.shutdown().await.unwrap();
    peer_task.abort();

    assert_eq!(live.phase_log, simulated.phase_log);
    assert_eq!(live.phase_log, expected_phase_log(3));
}

/// Replay [`PeerScript`] behavior over a real NATS broker.
async fn spawn_nats_peer(
    url: &str,
    session_id: &str,
    config: SimulatedPeerConfig,
) -> tokio::task::JoinHandle<()> {
    let client = async_nats::connect(url).await.expect("peer connects");
    let mut subscriber = client
        .subscribe(format!("interview.client.*.session-{session_id}"))
        .await
        .expect("peer subscribes");

    let session_id = session_id.to_string();
    let mut script = PeerScript::new(config);

    tokio::spawn(async move {
        while let Some(msg) = subscriber.next().await {
            let Ok(event) = serde_json::from_slice::<ClientEvent>(&msg.payload) else {
                continue;
            };
            for action in script.on_client_event(&event) {
                match action {
                    PeerAction::Emit { delay, event } => {
                        tokio::time::sleep(delay).await;
                        let subject =
                            format!("interview.peer.{}.session-{}", event.name(), session_id);
                        let payload = serde_json::to_vec(&event).expect("peer event serializes");
                        if client.publish(subject, payload.into()).await.is_err() {
                            return;
                        }
                    }
                    PeerAction::Disconnect { .. } => return,
                }
            }
        }
    })
}
