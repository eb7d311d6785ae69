use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use interview_coach::{
    CandidateProfile, CaptureBackendFactory, CaptureConfig, CaptureSource, Config, NatsTransport,
    NullSink, PlaybackSink, RodioSink, RoleProfile, ScriptedCapture, SessionConfig, SessionHandle,
    SessionOrchestrator, SessionPhase, SessionTransport, SimulatedPeerConfig, SimulatedTransport,
};

/// Timed mock-interview practice sessions against a scoring peer.
#[derive(Parser, Debug)]
#[command(name = "interview-coach", version)]
struct Args {
    /// Config file path without extension
    #[arg(long, default_value = "config/interview-coach")]
    config: String,

    /// Use the live NATS transport instead of the built-in simulated peer
    #[arg(long)]
    live: bool,

    /// Override the NATS server URL from the config file
    #[arg(long)]
    nats_url: Option<String>,

    /// Override the number of questions per session
    #[arg(long)]
    questions: Option<usize>,

    /// Capture answers from a deterministic script instead of the microphone
    #[arg(long)]
    no_mic: bool,

    /// Discard question audio instead of playing it
    #[arg(long)]
    mute: bool,

    /// Candidate name for the session profile
    #[arg(long, default_value = "Practice Candidate")]
    name: String,

    /// Target role title
    #[arg(long, default_value = "Software Engineer")]
    role: String,

    /// Target company
    #[arg(long, default_value = "Acme")]
    company: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let question_count = args.questions.unwrap_or(cfg.interview.question_count);

    let session_config = SessionConfig {
        question_count,
        candidate: CandidateProfile {
            name: args.name.clone(),
            summary: "Practice session candidate".to_string(),
            skills: Vec::new(),
            years_experience: 0,
        },
        role: RoleProfile {
            title: args.role.clone(),
            company: args.company.clone(),
            requirements: Vec::new(),
        },
        ..SessionConfig::default()
    };

    let transport: Box<dyn SessionTransport> = if args.live {
        let url = args.nats_url.unwrap_or(cfg.peer.nats_url);
        info!("Using live NATS transport at {}", url);
        Box::new(NatsTransport::new(url, &session_config.session_id))
    } else {
        info!("Using simulated peer transport");
        Box::new(SimulatedTransport::new(SimulatedPeerConfig {
            question_count,
            response_delay: Duration::from_millis(cfg.peer.simulated_response_delay_ms),
            ..SimulatedPeerConfig::default()
        }))
    };

    let capture_config = CaptureConfig {
        target_sample_rate: cfg.audio.sample_rate,
        target_channels: cfg.audio.channels,
        ..CaptureConfig::default()
    };

    let source = if args.no_mic {
        CaptureSource::Scripted(ScriptedCapture::default())
    } else {
        CaptureSource::Microphone
    };
    let capture = CaptureBackendFactory::create(source, capture_config.clone())?;

    let sink: Box<dyn PlaybackSink> = if args.mute {
        Box::new(NullSink::new(Duration::ZERO))
    } else {
        Box::new(RodioSink)
    };

    let handle =
        SessionOrchestrator::spawn(session_config, transport, capture, capture_config, sink);

    run_interview(handle).await
}

/// Drive the session from stdin: Enter skips question audio, starts a
/// recording, and stops it again.
async fn run_interview(handle: SessionHandle) -> Result<()> {
    handle.start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_index = 0usize;

    loop {
        let snap = handle
            .wait_for(|s| {
                s.phase.is_terminal()
                    || (matches!(s.phase, SessionPhase::PresentingQuestion { .. })
                        && s.current_index == next_index)
            })
            .await?;

        match &snap.phase {
            SessionPhase::Completed => break,
            SessionPhase::Errored { kind, message } => {
                println!("\nSession failed ({}): {}", kind.label(), message);
                println!("Restart the session to try again.");
                return handle.shutdown().await;
            }
            _ => {}
        }

        let question = snap
            .current_question
            .clone()
            .map(|q| q.text)
            .unwrap_or_default();
        println!(
            "\nQuestion {}/{}: {}",
            snap.current_index + 1,
            snap.question_count,
            question
        );

        if snap.phase.audio_playing() {
            println!("(playing question audio; press Enter to skip)");
            tokio::select! {
                waited = handle.wait_for(|s| !s.phase.audio_playing()) => { waited?; }
                line = lines.next_line() => {
                    let _ = line?;
                    handle.skip_audio().await?;
                    handle.wait_for(|s| !s.phase.audio_playing()).await?;
                }
            }
        }

        record_answer(&handle, &mut lines).await?;

        let answered = snap.feedback.len();
        let snap = handle
            .wait_for(|s| s.phase.is_terminal() || s.feedback.len() > answered)
            .await?;
        if let Some(analysis) = snap.feedback.last() {
            println!(
                "Score: {}/100 ({} filler words) - {}",
                analysis.score, analysis.metrics.filler_words, analysis.feedback
            );
        }

        next_index += 1;
    }

    let snap = handle
        .wait_for(|s| s.phase == SessionPhase::Completed)
        .await?;
    if let Some(summary) = &snap.summary {
        println!(
            "\nInterview complete. Overall score: {}/100",
            summary.overall_score
        );
        for strength in &summary.strengths {
            println!("  + {}", strength);
        }
        for improvement in &summary.improvements {
            println!("  - {}", improvement);
        }
        println!("Next step: {}", summary.follow_up);
    }

    handle.shutdown().await
}

async fn record_answer(handle: &SessionHandle, lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    loop {
        println!("Press Enter to start your answer.");
        lines.next_line().await?;
        handle.start_recording().await?;

        let snap = handle
            .wait_for(|s| s.recording || s.notice.is_some() || s.phase.is_terminal())
            .await?;
        if snap.phase.is_terminal() {
            return Ok(());
        }
        if let Some(notice) = &snap.notice {
            // Microphone trouble is recoverable in place; offer a retry.
            println!("Could not record: {notice}");
            continue;
        }

        println!("Recording... press Enter to stop and submit.");
        lines.next_line().await?;
        handle.stop_recording().await?;
        return Ok(());
    }
}
