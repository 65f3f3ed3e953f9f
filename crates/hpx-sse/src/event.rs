//! Application events and the reserved protocol events.

use std::{convert::Infallible, fmt, time::Duration};

use serde::Serialize;
use serde_json::Value;

use crate::error::SseResult;

/// Event type of the opening frame.
pub const OPEN_EVENT: &str = "open";
/// Event type of the goodbye frame.
pub const CLOSE_EVENT: &str = "close";
/// Event type used for events carrying an [`EventError`].
pub const ERROR_EVENT: &str = "error";

/// Error delivered to the client in place of a payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventError {
    message: String,
}

impl EventError {
    /// Create an event error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Capture the display form of any error.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    /// The message rendered on the `data:` line(s).
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EventError {}

impl From<String> for EventError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for EventError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for EventError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::from_error(err.as_ref())
    }
}

impl From<std::io::Error> for EventError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<Infallible> for EventError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// One unit of output on the stream.
///
/// `data` is rendered as compact JSON. When `error` is set the event is
/// rendered as an `error` event carrying only the error message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Event {
    /// JSON payload.
    pub data: Value,
    /// Error sent instead of the payload.
    pub error: Option<EventError>,
    /// Event ID (`id:` field), used by clients to resume.
    pub id: Option<String>,
    /// Event type (`event:` field).
    pub event: Option<String>,
    /// Reconnect delay hint (`retry:` field).
    pub retry: Option<Duration>,
}

impl Event {
    /// Create an event with the given payload.
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Create an event by serializing `data`.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::Serialization`](crate::SseError::Serialization) if
    /// `data` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> SseResult<Self> {
        Ok(Self::new(serde_json::to_value(data)?))
    }

    /// Create an event carrying an error instead of a payload.
    pub fn error(error: impl Into<EventError>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// The opening event written as the stream preamble.
    pub fn hello(retry: Duration) -> Self {
        Self::new("hello").with_event(OPEN_EVENT).with_retry(retry)
    }

    /// The reserved event marking graceful termination.
    pub fn goodbye(retry: Duration) -> Self {
        Self::new("byebye").with_event(CLOSE_EVENT).with_retry(retry)
    }

    /// Set the event ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the event type.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the reconnect delay hint.
    #[must_use]
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Returns true if this event carries an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns true if this is the goodbye event.
    pub fn is_goodbye(&self) -> bool {
        self.error.is_none() && self.event.as_deref() == Some(CLOSE_EVENT)
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Ledger {
        sequence: u32,
        closed_at: &'static str,
    }

    #[test]
    fn test_event_json() {
        let event = Event::json(&Ledger {
            sequence: 7,
            closed_at: "2024-01-01T00:00:00Z",
        })
        .expect("serializable")
        .with_id("30064771072");

        assert_eq!(event.data["sequence"], 7);
        assert_eq!(event.id.as_deref(), Some("30064771072"));
        assert!(!event.is_error());
        assert!(!event.is_goodbye());
    }

    #[test]
    fn test_event_error() {
        let event = Event::error("database unavailable");
        assert!(event.is_error());
        assert_eq!(
            event.error.as_ref().map(EventError::message),
            Some("database unavailable")
        );
        assert_eq!(event.data, Value::Null);
    }

    #[test]
    fn test_event_error_from_io() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "query timed out");
        let event = Event::error(err);
        assert_eq!(event.error.map(|e| e.to_string()).as_deref(), Some("query timed out"));
    }

    #[test]
    fn test_reserved_events() {
        let hello = Event::hello(Duration::from_secs(1));
        assert_eq!(hello.event.as_deref(), Some(OPEN_EVENT));
        assert_eq!(hello.data, Value::from("hello"));
        assert!(!hello.is_goodbye());

        let goodbye = Event::goodbye(Duration::from_millis(10));
        assert_eq!(goodbye.event.as_deref(), Some(CLOSE_EVENT));
        assert_eq!(goodbye.retry, Some(Duration::from_millis(10)));
        assert!(goodbye.is_goodbye());
    }
}
