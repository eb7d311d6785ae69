//! Deterministic transport double.
//!
//! Reproduces the peer's event vocabulary and causal ordering (question
//! batch before question audio before any analysis; analysis only after a
//! submission for that identifier; summary only after the completion
//! request) without a network. Delays are fixed and configurable, and
//! scoring is a deterministic function of the submitted artifact, so a test
//! run is reproducible end to end.
//!
//! [`PeerScript`] holds the peer behavior itself, separate from the channel
//! plumbing, so a conformance harness can replay the same peer over a real
//! broker.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{SessionTransport, TransportEvent};
use crate::protocol::{
    AnswerAnalysis, AnswerMetrics, ClientEvent, InterviewSummary, PeerEvent, Question,
    QuestionCategory, Rubric,
};

/// Behavior knobs for the simulated peer.
#[derive(Debug, Clone)]
pub struct SimulatedPeerConfig {
    /// Number of questions in the generated batch
    pub question_count: usize,
    /// Artificial latency before each peer reply
    pub response_delay: Duration,
    /// Artificial latency before each question audio artifact
    pub audio_delay: Duration,
    /// Whether question audio artifacts are delivered at all
    pub include_question_audio: bool,
    /// Optional scripted misbehavior
    pub fault: Option<PeerFault>,
}

impl Default for SimulatedPeerConfig {
    fn default() -> Self {
        Self {
            question_count: 8,
            response_delay: Duration::from_millis(10),
            audio_delay: Duration::from_millis(5),
            include_question_audio: true,
            fault: None,
        }
    }
}

/// Scripted peer misbehavior for failure-path tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFault {
    /// Refuse the initial connection outright
    RefuseConnection,
    /// Deliver a question batch of this size instead of the advertised count
    WrongBatchSize(usize),
    /// Emit one analysis for an identifier that was never in the batch
    StrayAnalysis,
    /// Drop the connection when the k-th (1-based) submission arrives,
    /// instead of analyzing it
    DisconnectOnAnswer(usize),
}

/// One step of peer behavior: sleep `delay`, then perform the effect.
#[derive(Debug, Clone)]
pub enum PeerAction {
    Emit { delay: Duration, event: PeerEvent },
    Disconnect { delay: Duration, reason: String },
}

/// The peer's deterministic behavior, independent of any channel or broker.
pub struct PeerScript {
    config: SimulatedPeerConfig,
    questions: Vec<Question>,
    answered: HashSet<String>,
    analyses: Vec<AnswerAnalysis>,
    started: bool,
}

impl PeerScript {
    pub fn new(config: SimulatedPeerConfig) -> Self {
        let batch_size = match config.fault {
            Some(PeerFault::WrongBatchSize(size)) => size,
            _ => config.question_count,
        };
        let questions = question_bank(batch_size);

        Self {
            config,
            questions,
            answered: HashSet::new(),
            analyses: Vec::new(),
            started: false,
        }
    }

    /// React to one client message with an ordered list of actions.
    /// Executing the actions sequentially preserves the protocol's causal
    /// ordering by construction.
    pub fn on_client_event(&mut self, event: &ClientEvent) -> Vec<PeerAction> {
        match event {
            ClientEvent::StartInterview { .. } => self.on_start(),
            ClientEvent::SubmitAnswer {
                question_id,
                audio_b64,
            } => self.on_submit(question_id, audio_b64),
            ClientEvent::CompleteInterview {} => self.on_complete(),
        }
    }

    fn on_start(&mut self) -> Vec<PeerAction> {
        if self.started {
            warn!("Simulated peer received a second start_interview; ignoring");
            return Vec::new();
        }
        self.started = true;

        let mut actions = vec![PeerAction::Emit {
            delay: self.config.response_delay,
            event: PeerEvent::QuestionsGenerated(self.questions.clone()),
        }];

        if self.config.include_question_audio {
            for question in &self.questions {
                actions.push(PeerAction::Emit {
                    delay: self.config.audio_delay,
                    event: PeerEvent::QuestionAudio {
                        question_id: question.id.clone(),
                        audio_b64: question_audio_clip(&question.id),
                    },
                });
            }
        }

        actions
    }

    fn on_submit(&mut self, question_id: &str, audio_b64: &str) -> Vec<PeerAction> {
        if !self.started {
            warn!("Simulated peer received submit_answer before start; ignoring");
            return Vec::new();
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            warn!(
                "Simulated peer received submission for unknown question {}; ignoring",
                question_id
            );
            return Vec::new();
        }
        if !self.answered.insert(question_id.to_string()) {
            // A duplicate submission is a duplicate, not an overwrite.
            warn!(
                "Simulated peer received duplicate submission for {}; ignoring",
                question_id
            );
            return Vec::new();
        }

        if let Some(PeerFault::DisconnectOnAnswer(k)) = self.config.fault {
            if self.answered.len() >= k {
                return vec![PeerAction::Disconnect {
                    delay: self.config.response_delay,
                    reason: "simulated peer dropped the connection".to_string(),
                }];
            }
        }

        let mut actions = Vec::new();

        if self.config.fault == Some(PeerFault::StrayAnalysis) && self.analyses.is_empty() {
            actions.push(PeerAction::Emit {
                delay: self.config.response_delay,
                event: PeerEvent::AnswerAnalyzed(score_answer("q-stray", "")),
            });
        }

        let analysis = score_answer(question_id, audio_b64);
        self.analyses.push(analysis.clone());

        actions.push(PeerAction::Emit {
            delay: self.config.response_delay,
            event: PeerEvent::AnswerAnalyzed(analysis),
        });

        actions
    }

    fn on_complete(&mut self) -> Vec<PeerAction> {
        let scores: Vec<u32> = self.analyses.iter().map(|a| a.score as u32).collect();
        let overall_score = if scores.is_empty() {
            0
        } else {
            (scores.iter().sum::<u32>() / scores.len() as u32) as u8
        };

        let specific = self
            .analyses
            .iter()
            .filter(|a| a.rubric.specific_examples)
            .count();
        let structured = self
            .analyses
            .iter()
            .filter(|a| a.rubric.structured_response)
            .count();
        let half = self.analyses.len().div_ceil(2);

        let mut strengths = Vec::new();
        let mut improvements = Vec::new();
        if specific >= half {
            strengths.push("Answers are grounded in specific examples".to_string());
        } else {
            improvements.push("Back claims with concrete examples".to_string());
        }
        if structured >= half {
            strengths.push("Responses follow a clear structure".to_string());
        } else {
            improvements.push("Structure answers as situation, action, result".to_string());
        }

        let summary = InterviewSummary {
            overall_score,
            per_question: self.analyses.clone(),
            strengths,
            improvements,
            follow_up: "Practice the two lowest-scoring questions again tomorrow".to_string(),
        };

        vec![PeerAction::Emit {
            delay: self.config.response_delay,
            event: PeerEvent::InterviewComplete(summary),
        }]
    }
}

/// Deterministic question bank; cycles the closed category set.
fn question_bank(count: usize) -> Vec<Question> {
    const PROMPTS: &[(QuestionCategory, &str)] = &[
        (
            QuestionCategory::Behavioral,
            "Tell me about a time you had to resolve a conflict within your team.",
        ),
        (
            QuestionCategory::Technical,
            "Walk me through how you would design a rate limiter for a public API.",
        ),
        (
            QuestionCategory::Leadership,
            "Describe a situation where you had to get buy-in for an unpopular decision.",
        ),
        (
            QuestionCategory::Behavioral,
            "Tell me about a project that failed and what you learned from it.",
        ),
        (
            QuestionCategory::Technical,
            "How would you debug a service whose latency doubled overnight?",
        ),
        (
            QuestionCategory::Leadership,
            "How do you help engineers on your team who are struggling?",
        ),
        (
            QuestionCategory::Behavioral,
            "Describe a time you had to deliver under a hard deadline.",
        ),
        (
            QuestionCategory::Technical,
            "Explain a tradeoff you have made between consistency and availability.",
        ),
    ];

    (0..count)
        .map(|i| {
            let (category, text) = PROMPTS[i % PROMPTS.len()];
            Question {
                id: format!("q-{}", i + 1),
                text: text.to_string(),
                category,
            }
        })
        .collect()
}

/// Deterministic scoring: the same artifact always earns the same analysis.
fn score_answer(question_id: &str, audio_b64: &str) -> AnswerAnalysis {
    let len = audio_b64.len() as u32;
    let score = 55 + (len % 41) as u8;

    let rubric = Rubric {
        addresses_question: len % 2 == 0,
        specific_examples: len % 3 != 0,
        structured_response: len % 5 != 0,
        outcome_oriented: len % 7 != 0,
    };

    let feedback = if score >= 85 {
        "Strong answer with a clear arc from situation to outcome."
    } else if score >= 70 {
        "Solid answer; tighten the opening and quantify the result."
    } else {
        "The answer wanders; lead with the situation and your specific role."
    };

    // base64 inflates by 4/3; approximate the raw 16kHz mono PCM duration
    let pcm_bytes = len as f32 * 3.0 / 4.0;
    let metrics = AnswerMetrics {
        filler_words: len % 7,
        duration_secs: pcm_bytes / (16_000.0 * 2.0),
    };

    AnswerAnalysis {
        question_id: question_id.to_string(),
        score,
        rubric,
        feedback: feedback.to_string(),
        metrics,
    }
}

/// A tiny valid WAV clip standing in for generated question speech.
fn question_audio_clip(question_id: &str) -> String {
    let seed = question_id.len() as i16;
    let samples: Vec<i16> = (0..1600).map(|i| seed.wrapping_mul(i as i16 % 32)).collect();
    match crate::audio::AudioClip::from_samples(&samples, 16_000, 1) {
        Ok(clip) => clip.to_b64(),
        Err(_) => String::new(),
    }
}

/// In-process transport wired to a [`PeerScript`] task.
pub struct SimulatedTransport {
    config: SimulatedPeerConfig,
    to_peer: Option<mpsc::Sender<ClientEvent>>,
    incoming: Option<mpsc::Receiver<TransportEvent>>,
    peer_task: Option<JoinHandle<()>>,
    sent: Arc<Mutex<Vec<ClientEvent>>>,
}

impl SimulatedTransport {
    pub fn new(config: SimulatedPeerConfig) -> Self {
        Self {
            config,
            to_peer: None,
            incoming: None,
            peer_task: None,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every event passed to [`SessionTransport::send`], in order. Tests use
    /// this to assert at-most-once submission and quiet skips.
    pub fn sent_log(&self) -> Arc<Mutex<Vec<ClientEvent>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait::async_trait]
impl SessionTransport for SimulatedTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.to_peer.is_some() {
            warn!("Simulated transport already connected");
            return Ok(());
        }
        if self.config.fault == Some(PeerFault::RefuseConnection) {
            anyhow::bail!("simulated peer refused the connection");
        }

        let (client_tx, client_rx) = mpsc::channel(64);
        let (peer_tx, mut peer_rx) = mpsc::channel::<ClientEvent>(64);

        let mut script = PeerScript::new(self.config.clone());

        let peer_task = tokio::spawn(async move {
            while let Some(event) = peer_rx.recv().await {
                for action in script.on_client_event(&event) {
                    match action {
                        PeerAction::Emit { delay, event } => {
                            tokio::time::sleep(delay).await;
                            if client_tx.send(TransportEvent::Event(event)).await.is_err() {
                                return;
                            }
                        }
                        PeerAction::Disconnect { delay, reason } => {
                            tokio::time::sleep(delay).await;
                            let _ = client_tx
                                .send(TransportEvent::Disconnected { reason })
                                .await;
                            return;
                        }
                    }
                }
            }
        });

        self.to_peer = Some(peer_tx);
        self.incoming = Some(client_rx);
        self.peer_task = Some(peer_task);

        info!("Simulated transport connected");
        Ok(())
    }

    fn incoming(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.incoming.take()
    }

    async fn send(&self, event: ClientEvent) -> Result<()> {
        let to_peer = self
            .to_peer
            .as_ref()
            .context("simulated transport is not connected")?;

        self.sent.lock().await.push(event.clone());

        to_peer
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("simulated peer connection closed"))?;

        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(task) = self.peer_task.take() {
            task.abort();
        }
        self.to_peer = None;
        self.incoming = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.to_peer.is_some()
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
