//! Live transport over NATS subjects.
//!
//! Each wire event maps to one subject: the client publishes to
//! `interview.client.<event>.session-<id>` and subscribes to
//! `interview.peer.*.session-<id>`. Per-subject delivery order is what the
//! orchestrator relies on; no cross-subject ordering is assumed.

use anyhow::{Context, Result};
use async_nats::Client;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{SessionTransport, TransportEvent};
use crate::protocol::{ClientEvent, PeerEvent};

pub struct NatsTransport {
    url: String,
    session_id: String,
    client: Option<Client>,
    incoming: Option<mpsc::Receiver<TransportEvent>>,
    pump_task: Option<JoinHandle<()>>,
}

impl NatsTransport {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
            client: None,
            incoming: None,
            pump_task: None,
        }
    }

    fn outbound_subject(&self, event: &ClientEvent) -> String {
        format!("interview.client.{}.session-{}", event.name(), self.session_id)
    }

    fn inbound_subject(&self) -> String {
        format!("interview.peer.*.session-{}", self.session_id)
    }
}

#[async_trait::async_trait]
impl SessionTransport for NatsTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.client.is_some() {
            warn!("NATS transport already connected");
            return Ok(());
        }

        info!("Connecting to NATS at {}", self.url);

        let client = async_nats::connect(&self.url)
            .await
            .context("Failed to connect to NATS")?;

        let subject = self.inbound_subject();
        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to peer events")?;

        info!("Subscribed to {}", subject);

        let (tx, rx) = mpsc::channel(64);

        let pump_task = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<PeerEvent>(&msg.payload) {
                    Ok(event) => {
                        if tx.send(TransportEvent::Event(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!("Dropping unrecognized peer event on {}: {}", msg.subject, err);
                    }
                }
            }
            let _ = tx
                .send(TransportEvent::Disconnected {
                    reason: "NATS subscription closed".to_string(),
                })
                .await;
        });

        self.client = Some(client);
        self.incoming = Some(rx);
        self.pump_task = Some(pump_task);

        info!("Connected to NATS successfully");
        Ok(())
    }

    fn incoming(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.incoming.take()
    }

    async fn send(&self, event: ClientEvent) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .context("NATS transport is not connected")?;

        let subject = self.outbound_subject(&event);
        let payload = serde_json::to_vec(&event)?;

        client
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish {}", subject))?;

        info!("Published {} ({})", event.name(), subject);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(task) = self.pump_task.take() {
            task.abort();
        }
        if self.client.take().is_some() {
            // async-nats handles connection cleanup on drop
            info!("Closed NATS transport");
        }
        self.incoming = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn name(&self) -> &str {
        "nats"
    }
}
