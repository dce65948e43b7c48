use thiserror::Error;

/// Errors surfaced by the conversation session manager.
///
/// Payloads are plain strings so the error can be cloned into a transport's
/// terminal state and handed to every caller that observes the end of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    /// Token missing, invalid, or the code exchange failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Channel could not be dialed or the service is unavailable
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Unexpected message sequence, empty response or exhausted retry
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote ended the stream
    #[error("Stream ended by remote")]
    StreamEnd,

    /// Conversation deadline elapsed or the conversation was closed
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid settings or configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AssistantError {
    pub fn is_stream_end(&self) -> bool {
        matches!(self, Self::StreamEnd)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, AssistantError>;
