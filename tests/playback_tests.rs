// PlaybackController semantics: completion is signaled exactly once, and a
// skip travels the same completion path as a natural end.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use interview_coach::{AudioClip, NullSink, PlaybackController, PlaybackEvent};

fn test_clip() -> AudioClip {
    let samples: Vec<i16> = (0..1600).map(|i| (i % 64) as i16).collect();
    AudioClip::from_samples(&samples, 16_000, 1).unwrap()
}

#[tokio::test]
async fn natural_completion_signals_exactly_once() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut controller = PlaybackController::new(
        Box::new(NullSink::new(Duration::from_millis(20))),
        tx,
    );

    controller.play("q-1", &test_clip()).unwrap();
    assert!(controller.is_playing());

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        PlaybackEvent::Finished {
            question_id: "q-1".to_string()
        }
    );
    controller.on_finished("q-1");
    assert!(!controller.is_playing());

    // No second completion for the same play.
    let extra = timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn skip_signals_the_same_completion() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut controller = PlaybackController::new(
        Box::new(NullSink::new(Duration::from_secs(30))),
        tx,
    );

    controller.play("q-2", &test_clip()).unwrap();
    controller.skip();

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        PlaybackEvent::Finished {
            question_id: "q-2".to_string()
        }
    );
    controller.on_finished("q-2");
    assert!(!controller.is_playing());
}

#[tokio::test]
async fn skip_when_idle_is_a_noop() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut controller = PlaybackController::new(Box::new(NullSink::new(Duration::ZERO)), tx);

    controller.skip();
    assert!(!controller.is_playing());

    let nothing = timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(nothing.is_err());
}

#[tokio::test]
async fn teardown_cancels_and_is_idempotent() {
    let (tx, mut rx) = mpsc::channel(8);
    let mut controller = PlaybackController::new(
        Box::new(NullSink::new(Duration::from_secs(30))),
        tx,
    );

    controller.play("q-3", &test_clip()).unwrap();
    controller.teardown();
    controller.teardown();
    assert!(!controller.is_playing());

    // The watcher is aborted on teardown; no completion event leaks out.
    let nothing = timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(nothing.is_err());
}
