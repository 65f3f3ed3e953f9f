//! Error handling for the outbound event stream.

use thiserror::Error;

/// The main result type used by encoders and transports.
pub type SseResult<T> = Result<T, SseError>;

/// Errors produced while encoding or writing frames.
///
/// [`Stream`](crate::Stream) never returns these to its caller: a failed
/// preamble turns into the stream's done flag, later failures are logged.
#[derive(Error, Debug)]
pub enum SseError {
    /// I/O errors from the underlying writer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer is no longer reading the stream
    #[error("Stream closed: {reason}")]
    Closed { reason: String },

    /// Event payload could not be rendered as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SseError {
    /// Create a closed-stream error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` if the peer went away.
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Closed { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}
