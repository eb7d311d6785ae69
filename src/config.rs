use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioSettings,
    pub interview: InterviewSettings,
    pub peer: PeerSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct InterviewSettings {
    /// Fixed number of questions per session
    pub question_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct PeerSettings {
    /// NATS server URL for the live transport
    pub nats_url: String,

    /// Artificial reply latency of the simulated peer, in milliseconds
    pub simulated_response_delay_ms: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
