pub mod nats;
pub mod simulated;

pub use nats::NatsTransport;
pub use simulated::{PeerAction, PeerFault, PeerScript, SimulatedPeerConfig, SimulatedTransport};

use anyhow::Result;
use tokio::sync::mpsc;

use crate::protocol::{ClientEvent, PeerEvent};

/// Items delivered by a transport's inbound channel, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A validated peer message
    Event(PeerEvent),
    /// The channel dropped; no further events will arrive
    Disconnected { reason: String },
}

/// Bidirectional named-event channel to the scoring peer.
///
/// Implementations must agree on vocabulary and causal ordering so the
/// orchestrator cannot tell them apart: the live NATS transport and the
/// in-process simulated double both satisfy this contract (exercised by the
/// shared conformance tests).
///
/// Inbound payloads that do not parse into [`PeerEvent`] are logged and
/// dropped at this boundary; the orchestrator never sees unknown event
/// names.
#[async_trait::async_trait]
pub trait SessionTransport: Send {
    /// Establish the channel. Calling again while connected is a no-op;
    /// a session never holds two live channels.
    async fn connect(&mut self) -> Result<()>;

    /// Take the inbound event receiver for the established connection.
    ///
    /// Available once per connection; `None` when not connected or already
    /// taken.
    fn incoming(&mut self) -> Option<mpsc::Receiver<TransportEvent>>;

    /// Enqueue one outbound message, at-most-once.
    async fn send(&self, event: ClientEvent) -> Result<()>;

    /// Release the channel. Safe to call repeatedly or when never connected.
    async fn close(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Transport name for logging
    fn name(&self) -> &str;
}
