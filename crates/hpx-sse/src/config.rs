//! Stream configuration.

use std::time::Duration;

/// Default pause after the last write before a heartbeat is sent.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for an outbound event stream.
///
/// Follows the same builder pattern as the transport configs: sensible
/// defaults plus chainable setters, checked by [`validate`](Self::validate).
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Minimum idle time before [`Stream::try_send_heartbeat`](crate::Stream::try_send_heartbeat)
    /// writes a heartbeat.
    pub heartbeat_interval: Duration,
    /// Maximum number of application events (0 = unlimited).
    pub limit: usize,
    /// Capacity of the frame channel backing a [`ChannelTransport`](crate::ChannelTransport).
    pub channel_capacity: usize,
    /// Reconnect delay advertised to clients in the opening frame.
    pub hello_retry: Duration,
    /// Reconnect delay advertised to clients in the goodbye frame.
    pub goodbye_retry: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            limit: 0,
            channel_capacity: 64,
            hello_retry: Duration::from_secs(1),
            goodbye_retry: Duration::from_millis(10),
        }
    }
}

impl StreamConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the event limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the frame channel capacity.
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the retry hint sent with the opening frame.
    #[must_use]
    pub fn hello_retry(mut self, retry: Duration) -> Self {
        self.hello_retry = retry;
        self
    }

    /// Set the retry hint sent with the goodbye frame.
    #[must_use]
    pub fn goodbye_retry(mut self, retry: Duration) -> Self {
        self.goodbye_retry = retry;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval.is_zero() {
            return Err("Heartbeat interval must be > 0".to_string());
        }
        if self.channel_capacity == 0 {
            return Err("Channel capacity must be > 0".to_string());
        }
        Ok(())
    }
}
