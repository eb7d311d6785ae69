//! The session orchestrator: a finite-state coordinator that reconciles the
//! transport, the microphone, and question playback into one consistent
//! session.
//!
//! All state lives behind a single task draining a single message queue, so
//! every transition runs to completion before the next message is looked at.
//! UI layers hold a [`SessionHandle`]: commands go in through the queue,
//! state comes back through a `watch`ed [`SessionSnapshot`]. There is no
//! other way to touch session state.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::state::{SessionPhase, SessionSnapshot};
use crate::audio::{AnswerRecorder, AudioClip, CaptureBackend, CaptureConfig};
use crate::error::{classify, SessionErrorKind};
use crate::playback::{PlaybackController, PlaybackEvent, PlaybackSink};
use crate::protocol::{
    AnswerAnalysis, ClientEvent, InterviewSummary, PeerErrorKind, PeerEvent, Question,
};
use crate::transport::{SessionTransport, TransportEvent};

const QUEUE_DEPTH: usize = 64;

/// Commands a UI may issue against a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Connect and send start_interview
    Start,
    /// Cut the current question audio short; enables recording
    SkipAudio,
    /// Arm the microphone for the current question
    StartRecording,
    /// Finalize the recording and submit it as the answer
    StopRecording,
    /// Tear everything down and stop the session task
    Shutdown,
}

/// A captured answer, owned by the orchestrator from submission until the
/// session ends.
#[derive(Debug, Clone)]
pub struct Answer {
    pub question_id: String,
    pub clip: AudioClip,
    pub submitted_at: DateTime<Utc>,
}

/// Everything the session task reacts to, in one queue.
enum SessionMessage {
    Command(SessionCommand),
    Transport(TransportEvent),
    Playback(PlaybackEvent),
}

struct SessionState {
    phase: SessionPhase,
    /// Phase labels in transition order (consecutive duplicates collapsed);
    /// drives the UI progress trail and the conformance tests
    phase_log: Vec<&'static str>,
    questions: Vec<Question>,
    current_index: usize,
    answers: HashMap<String, Answer>,
    /// Question id of the one submission awaiting analysis, if any
    outstanding: Option<String>,
    question_audio: HashMap<String, AudioClip>,
    /// Questions whose audio already played to completion or was skipped
    audio_done: HashSet<String>,
    feedback: Vec<AnswerAnalysis>,
    summary: Option<InterviewSummary>,
    notice: Option<String>,
    completion_requested: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            phase_log: vec![SessionPhase::Idle.label()],
            questions: Vec::new(),
            current_index: 0,
            answers: HashMap::new(),
            outstanding: None,
            question_audio: HashMap::new(),
            audio_done: HashSet::new(),
            feedback: Vec::new(),
            summary: None,
            notice: None,
            completion_requested: false,
        }
    }
}

pub struct SessionOrchestrator {
    config: SessionConfig,
    transport: Box<dyn SessionTransport>,
    recorder: AnswerRecorder,
    playback: PlaybackController,
    queue_tx: mpsc::Sender<SessionMessage>,
    queue_rx: mpsc::Receiver<SessionMessage>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    transport_pump: Option<JoinHandle<()>>,
    playback_pump: JoinHandle<()>,
    state: SessionState,
}

/// Owning handle to a spawned session.
///
/// Dropping the handle shuts the session down (recording stopped, playback
/// cancelled, transport closed), the same teardown an explicit
/// [`SessionHandle::shutdown`] performs.
pub struct SessionHandle {
    queue: mpsc::Sender<SessionMessage>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
    _drop_guard: oneshot::Sender<()>,
}

impl SessionHandle {
    pub fn snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub async fn start(&self) -> Result<()> {
        self.command(SessionCommand::Start).await
    }

    pub async fn skip_audio(&self) -> Result<()> {
        self.command(SessionCommand::SkipAudio).await
    }

    pub async fn start_recording(&self) -> Result<()> {
        self.command(SessionCommand::StartRecording).await
    }

    pub async fn stop_recording(&self) -> Result<()> {
        self.command(SessionCommand::StopRecording).await
    }

    async fn command(&self, command: SessionCommand) -> Result<()> {
        self.queue
            .send(SessionMessage::Command(command))
            .await
            .map_err(|_| anyhow::anyhow!("session task has stopped"))
    }

    /// Block until the published snapshot satisfies `predicate`.
    ///
    /// The watch channel only guarantees the latest value, so wait on
    /// phases that persist until the next external stimulus (presenting,
    /// awaiting analysis, completed, errored), not on in-between hops.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        loop {
            let snap = rx.borrow_and_update().clone();
            if predicate(&snap) {
                return Ok(snap);
            }
            rx.changed()
                .await
                .map_err(|_| anyhow::anyhow!("session task has stopped"))?;
        }
    }

    /// Graceful teardown: stop recording and playback, close the transport,
    /// and wait for the session task to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self
            .queue
            .send(SessionMessage::Command(SessionCommand::Shutdown))
            .await;
        self.task.await.context("session task panicked")?;
        Ok(())
    }
}

impl SessionOrchestrator {
    /// Spawn a session task with injected transport and media seams.
    pub fn spawn(
        config: SessionConfig,
        transport: Box<dyn SessionTransport>,
        capture: Box<dyn CaptureBackend>,
        capture_config: CaptureConfig,
        sink: Box<dyn PlaybackSink>,
    ) -> SessionHandle {
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_DEPTH);

        let (playback_tx, mut playback_rx) = mpsc::channel(8);
        let playback_pump = {
            let queue = queue_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = playback_rx.recv().await {
                    if queue.send(SessionMessage::Playback(event)).await.is_err() {
                        break;
                    }
                }
            })
        };

        let snapshot = SessionSnapshot::new(&config.session_id, config.question_count);
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot);

        let orchestrator = Self {
            recorder: AnswerRecorder::new(capture, capture_config),
            playback: PlaybackController::new(sink, playback_tx),
            config,
            transport,
            queue_tx: queue_tx.clone(),
            queue_rx,
            snapshot_tx,
            transport_pump: None,
            playback_pump,
            state: SessionState::new(),
        };

        // Abandoning the handle must tear the session down even without an
        // explicit shutdown (abrupt navigation away).
        let (drop_tx, drop_rx) = oneshot::channel::<()>();
        {
            let queue = queue_tx.clone();
            tokio::spawn(async move {
                let _ = drop_rx.await;
                let _ = queue
                    .send(SessionMessage::Command(SessionCommand::Shutdown))
                    .await;
            });
        }

        let task = tokio::spawn(orchestrator.run());

        SessionHandle {
            queue: queue_tx,
            snapshot: snapshot_rx,
            task,
            _drop_guard: drop_tx,
        }
    }

    async fn run(mut self) {
        info!("Session {} started", self.config.session_id);

        while let Some(message) = self.queue_rx.recv().await {
            let stop = self.handle_message(message).await;
            self.publish();
            if stop {
                break;
            }
        }

        self.teardown().await;
        info!("Session {} stopped", self.config.session_id);
    }

    async fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::Command(SessionCommand::Shutdown) => return true,
            SessionMessage::Command(SessionCommand::Start) => self.on_start().await,
            SessionMessage::Command(SessionCommand::SkipAudio) => self.on_skip_audio(),
            SessionMessage::Command(SessionCommand::StartRecording) => {
                self.on_start_recording().await
            }
            SessionMessage::Command(SessionCommand::StopRecording) => {
                self.on_stop_recording().await
            }
            SessionMessage::Transport(TransportEvent::Event(event)) => {
                self.on_peer_event(event).await
            }
            SessionMessage::Transport(TransportEvent::Disconnected { reason }) => {
                self.on_disconnect(reason).await
            }
            SessionMessage::Playback(PlaybackEvent::Finished { question_id }) => {
                self.on_playback_finished(question_id)
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    async fn on_start(&mut self) {
        if self.state.phase != SessionPhase::Idle {
            warn!("Start ignored in phase {}", self.state.phase.label());
            return;
        }

        self.set_phase(SessionPhase::Connecting);
        self.publish();

        if let Err(err) = self.transport.connect().await {
            let kind = classify(&err, SessionErrorKind::Transport);
            self.fail(kind, format!("failed to connect: {err:#}")).await;
            return;
        }

        let Some(incoming) = self.transport.incoming() else {
            self.fail(
                SessionErrorKind::Transport,
                "transport connected without an inbound channel".to_string(),
            )
            .await;
            return;
        };
        self.spawn_transport_pump(incoming);

        let start = ClientEvent::StartInterview {
            candidate_profile: self.config.candidate.clone(),
            role_profile: self.config.role.clone(),
        };
        if let Err(err) = self.transport.send(start).await {
            self.fail(
                SessionErrorKind::Transport,
                format!("failed to send start_interview: {err:#}"),
            )
            .await;
            return;
        }

        self.set_phase(SessionPhase::AwaitingQuestions);
    }

    fn on_skip_audio(&mut self) {
        if self.state.phase.audio_playing() {
            // No wire traffic; the completion event arrives through the
            // queue exactly as it would for natural playback end.
            self.playback.skip();
        } else {
            warn!("Skip ignored; no question audio is playing");
        }
    }

    async fn on_start_recording(&mut self) {
        if !self.state.phase.recording_enabled() {
            warn!(
                "Recording refused in phase {} (audio playing or answer outstanding)",
                self.state.phase.label()
            );
            return;
        }
        if self.recorder.is_recording() {
            return;
        }

        match self.recorder.start().await {
            Ok(()) => {
                self.state.notice = None;
            }
            Err(err) => {
                let kind = classify(&err, SessionErrorKind::Media);
                if kind.is_recoverable() {
                    // Re-prompt without losing session state.
                    warn!("Recording could not start: {err:#}");
                    self.state.notice = Some(format!("{err:#}"));
                } else {
                    self.fail(kind, format!("{err:#}")).await;
                }
            }
        }
    }

    async fn on_stop_recording(&mut self) {
        if !self.recorder.is_recording() {
            // Idempotent: no error, no state change.
            return;
        }

        match self.recorder.stop().await {
            Ok(Some(clip)) => self.submit_answer(clip).await,
            Ok(None) => {}
            Err(err) => {
                let kind = classify(&err, SessionErrorKind::Media);
                if kind.is_recoverable() {
                    warn!("Recording failed mid-capture: {err:#}");
                    self.state.notice = Some(format!("{err:#}"));
                } else {
                    self.fail(kind, format!("{err:#}")).await;
                }
            }
        }
    }

    async fn submit_answer(&mut self, clip: AudioClip) {
        let Some(question_id) = self.current_question_id() else {
            warn!("Discarding recording; no question is being presented");
            return;
        };

        // At most one outstanding answer, never two submissions per id.
        if self.state.outstanding.is_some() || self.state.answers.contains_key(&question_id) {
            warn!("Refusing duplicate submission for {}", question_id);
            return;
        }

        self.set_phase(SessionPhase::SubmittingAnswer);
        self.publish();

        let event = ClientEvent::SubmitAnswer {
            question_id: question_id.clone(),
            audio_b64: clip.to_b64(),
        };
        if let Err(err) = self.transport.send(event).await {
            self.fail(
                SessionErrorKind::Transport,
                format!("failed to submit answer for {question_id}: {err:#}"),
            )
            .await;
            return;
        }

        self.state.answers.insert(
            question_id.clone(),
            Answer {
                question_id: question_id.clone(),
                clip,
                submitted_at: Utc::now(),
            },
        );
        self.state.outstanding = Some(question_id);
        self.set_phase(SessionPhase::AwaitingAnalysis);
    }

    // ------------------------------------------------------------------
    // Peer events
    // ------------------------------------------------------------------

    async fn on_peer_event(&mut self, event: PeerEvent) {
        if self.state.phase.is_terminal() {
            return;
        }

        match event {
            PeerEvent::QuestionsGenerated(questions) => self.on_questions(questions).await,
            PeerEvent::QuestionAudio {
                question_id,
                audio_b64,
            } => self.on_question_audio(question_id, audio_b64).await,
            PeerEvent::AnswerAnalyzed(analysis) => self.on_analysis(analysis).await,
            PeerEvent::InterviewComplete(summary) => self.on_summary(summary),
            PeerEvent::Error { kind, message } => self.on_peer_error(kind, message).await,
        }
    }

    async fn on_questions(&mut self, questions: Vec<Question>) {
        if self.state.phase != SessionPhase::AwaitingQuestions {
            warn!(
                "Question batch ignored in phase {}",
                self.state.phase.label()
            );
            return;
        }

        if questions.len() != self.config.question_count {
            self.fail(
                SessionErrorKind::Protocol,
                format!(
                    "expected a batch of {} questions, received {}",
                    self.config.question_count,
                    questions.len()
                ),
            )
            .await;
            return;
        }

        info!("Received question batch ({} questions)", questions.len());
        self.state.questions = questions;
        self.state.current_index = 0;
        self.present_current();
    }

    async fn on_question_audio(&mut self, question_id: String, audio_b64: String) {
        let clip = match AudioClip::from_b64(&audio_b64) {
            Ok(clip) => clip,
            Err(err) => {
                self.fail(
                    SessionErrorKind::Protocol,
                    format!("undecodable question audio for {question_id}: {err:#}"),
                )
                .await;
                return;
            }
        };
        self.state.question_audio.insert(question_id.clone(), clip);

        // Audio that arrives late for the on-screen question still plays,
        // but only while the answer has not been started: playback must
        // never cut into an active or submitted recording.
        if self.state.phase == (SessionPhase::PresentingQuestion { audio_playing: false })
            && self.current_question_id().as_deref() == Some(question_id.as_str())
            && !self.recorder.is_recording()
            && self.state.outstanding.is_none()
            && !self.state.answers.contains_key(&question_id)
            && !self.state.audio_done.contains(&question_id)
        {
            self.present_current();
        }
    }

    async fn on_analysis(&mut self, analysis: AnswerAnalysis) {
        if self.state.phase != SessionPhase::AwaitingAnalysis {
            warn!(
                "Analysis for {} ignored in phase {}",
                analysis.question_id,
                self.state.phase.label()
            );
            return;
        }

        // Defensive against out-of-order or stray delivery: only the
        // currently outstanding identifier advances the session.
        if self.state.outstanding.as_deref() != Some(analysis.question_id.as_str()) {
            warn!(
                "Ignoring analysis for unexpected question {}",
                analysis.question_id
            );
            return;
        }

        let mut analysis = analysis;
        if analysis.score > 100 {
            warn!(
                "Clamping out-of-range score {} for {}",
                analysis.score, analysis.question_id
            );
            analysis.score = 100;
        }

        info!(
            "Answer for {} scored {} ({} filler words)",
            analysis.question_id, analysis.score, analysis.metrics.filler_words
        );

        self.state.outstanding = None;
        self.state.feedback.push(analysis);
        self.set_phase(SessionPhase::Advancing);
        self.publish();
        self.advance().await;
    }

    async fn advance(&mut self) {
        if self.state.current_index + 1 < self.state.questions.len() {
            self.state.current_index += 1;
            self.present_current();
            return;
        }

        // Last analysis is in: completion handshake, then wait for the
        // summary while still in Advancing.
        if let Err(err) = self.transport.send(ClientEvent::CompleteInterview {}).await {
            self.fail(
                SessionErrorKind::Transport,
                format!("failed to send complete_interview: {err:#}"),
            )
            .await;
            return;
        }
        self.state.completion_requested = true;
        info!(
            "All {} answers analyzed; awaiting final results",
            self.state.questions.len()
        );
    }

    fn on_summary(&mut self, summary: InterviewSummary) {
        if self.state.phase != SessionPhase::Advancing || !self.state.completion_requested {
            warn!(
                "Final results ignored in phase {}",
                self.state.phase.label()
            );
            return;
        }

        let mut summary = summary;
        if summary.overall_score > 100 {
            warn!("Clamping out-of-range overall score {}", summary.overall_score);
            summary.overall_score = 100;
        }

        info!(
            "Session {} completed with overall score {}",
            self.config.session_id, summary.overall_score
        );
        self.state.summary = Some(summary);
        self.set_phase(SessionPhase::Completed);
    }

    async fn on_peer_error(&mut self, kind: PeerErrorKind, message: String) {
        let kind = match kind {
            PeerErrorKind::Protocol => SessionErrorKind::Protocol,
            PeerErrorKind::Scoring | PeerErrorKind::Internal => SessionErrorKind::Transport,
        };
        self.fail(kind, format!("peer reported an error: {message}"))
            .await;
    }

    async fn on_disconnect(&mut self, reason: String) {
        if self.state.phase.is_terminal() {
            info!("Disconnect after terminal state ignored: {}", reason);
            return;
        }
        self.fail(
            SessionErrorKind::Transport,
            format!("transport disconnected: {reason}"),
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    fn on_playback_finished(&mut self, question_id: String) {
        self.playback.on_finished(&question_id);
        self.state.audio_done.insert(question_id.clone());

        if self.state.phase.audio_playing()
            && self.current_question_id().as_deref() == Some(question_id.as_str())
        {
            self.set_phase(SessionPhase::PresentingQuestion {
                audio_playing: false,
            });
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn spawn_transport_pump(&mut self, mut incoming: mpsc::Receiver<TransportEvent>) {
        let queue = self.queue_tx.clone();
        self.transport_pump = Some(tokio::spawn(async move {
            while let Some(event) = incoming.recv().await {
                if queue.send(SessionMessage::Transport(event)).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn current_question_id(&self) -> Option<String> {
        self.state
            .questions
            .get(self.state.current_index)
            .map(|q| q.id.clone())
    }

    fn present_current(&mut self) {
        let Some(question) = self.state.questions.get(self.state.current_index).cloned() else {
            warn!("No question at index {}", self.state.current_index);
            return;
        };

        let pending_clip = if self.state.audio_done.contains(&question.id) {
            None
        } else {
            self.state.question_audio.get(&question.id).cloned()
        };

        let mut audio_playing = false;
        if let Some(clip) = pending_clip {
            match self.playback.play(&question.id, &clip) {
                Ok(()) => audio_playing = true,
                Err(err) => {
                    // Playback trouble never blocks answering.
                    warn!("Question audio unavailable for {}: {err:#}", question.id);
                    self.state.audio_done.insert(question.id.clone());
                }
            }
        }

        info!(
            "Presenting question {}/{}: {} [{}]",
            self.state.current_index + 1,
            self.state.questions.len(),
            question.id,
            question.text
        );
        self.set_phase(SessionPhase::PresentingQuestion { audio_playing });
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.state.phase == phase {
            return;
        }
        info!(
            "Session {} phase {} -> {}",
            self.config.session_id,
            self.state.phase.label(),
            phase.label()
        );
        if self.state.phase_log.last() != Some(&phase.label()) {
            self.state.phase_log.push(phase.label());
        }
        self.state.phase = phase;
    }

    async fn fail(&mut self, kind: SessionErrorKind, message: String) {
        error!(
            "Session {} failed ({}): {}",
            self.config.session_id,
            kind.label(),
            message
        );

        // Release media and the channel immediately; the errored session
        // only exists to be read and restarted.
        self.recorder.teardown().await;
        self.playback.teardown();
        if let Err(err) = self.transport.close().await {
            warn!("Transport close during failure: {err:#}");
        }

        self.set_phase(SessionPhase::Errored { kind, message });
    }

    async fn teardown(&mut self) {
        self.recorder.teardown().await;
        self.playback.teardown();
        if let Err(err) = self.transport.close().await {
            warn!("Transport close during teardown: {err:#}");
        }
        if let Some(pump) = self.transport_pump.take() {
            pump.abort();
        }
        self.playback_pump.abort();
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            session_id: self.config.session_id.clone(),
            phase: self.state.phase.clone(),
            question_count: self.config.question_count,
            current_index: self.state.current_index,
            current_question: self
                .state
                .questions
                .get(self.state.current_index)
                .cloned(),
            recording: self.recorder.is_recording(),
            answered: self.state.answers.len(),
            feedback: self.state.feedback.clone(),
            summary: self.state.summary.clone(),
            notice: self.state.notice.clone(),
            phase_log: self.state.phase_log.clone(),
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}
