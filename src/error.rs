use thiserror::Error;

/// Failure taxonomy for an interview session.
///
/// Only `Permission` and `Media` are recoverable in place: the session stays
/// where it is and the user may retry. Everything else surfaces to the user
/// and requires an explicit restart of the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connection refused, disconnect mid-session, send failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The peer broke an invariant the orchestrator depends on
    /// (wrong question batch size, undecodable artifact payload).
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Microphone access denied. Re-prompt without losing session state.
    #[error("microphone permission denied: {0}")]
    Permission(String),

    /// Recording or playback device failure. Session remains in place for retry.
    #[error("media device failure: {0}")]
    Media(String),
}

impl SessionError {
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            SessionError::Transport(_) => SessionErrorKind::Transport,
            SessionError::Protocol(_) => SessionErrorKind::Protocol,
            SessionError::Permission(_) => SessionErrorKind::Permission,
            SessionError::Media(_) => SessionErrorKind::Media,
        }
    }

    /// Whether the session can stay in its current state after this error.
    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }
}

/// Discriminant of [`SessionError`], carried in the errored session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    Transport,
    Protocol,
    Permission,
    Media,
}

impl SessionErrorKind {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionErrorKind::Permission | SessionErrorKind::Media)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionErrorKind::Transport => "transport",
            SessionErrorKind::Protocol => "protocol",
            SessionErrorKind::Permission => "permission",
            SessionErrorKind::Media => "media",
        }
    }
}

/// Classify an error raised by a controller or transport.
///
/// Controllers attach a [`SessionError`] to the chain where they can tell
/// permission failures from device failures; anything unclassified from a
/// media path counts as a device failure, anything else as transport.
pub fn classify(err: &anyhow::Error, fallback: SessionErrorKind) -> SessionErrorKind {
    match err.downcast_ref::<SessionError>() {
        Some(session_err) => session_err.kind(),
        None => fallback,
    }
}
