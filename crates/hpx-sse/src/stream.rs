//! The outbound event stream state machine.
//!
//! A [`Stream`] owns one connection's transport and moves through three
//! states:
//!
//! ```text
//! Fresh ──preamble ok──► Established ──finish / err / limit──► Done
//!   │                                                           ▲
//!   └──────────────────preamble failed──────────────────────────┘
//! ```
//!
//! The preamble is written lazily by the first send, heartbeat or finish.
//! Only a failed preamble is treated as fatal; once the stream is
//! established, write failures are logged and otherwise absorbed, and the
//! caller learns about termination by polling [`Stream::is_done`].

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, MutexGuard},
    time::Instant,
};
use tracing::{debug, warn};

use crate::{
    clock::{Clock, TokioClock},
    config::{DEFAULT_HEARTBEAT_INTERVAL, StreamConfig},
    encoder::{FrameEncoder, TextEventEncoder},
    error::{SseError, SseResult},
    event::{Event, EventError},
    transport::TransportWriter,
};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`Stream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing written yet.
    Fresh,
    /// The preamble has been written.
    Established,
    /// Terminal: finished, errored, preamble failed, or limit reached.
    Done,
}

impl StreamState {
    /// Returns `true` if the stream is in the terminal state.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// One outbound event stream.
///
/// All mutating operations take `&mut self`, so a single owner serializes
/// writes to the transport. Use [`SharedStream`] to drive one stream from
/// several tasks.
///
/// Callers must stop driving the stream once [`is_done`](Self::is_done)
/// returns `true`; the stream does not reject late calls.
pub struct Stream<T, E = TextEventEncoder> {
    transport: T,
    encoder: E,
    clock: Arc<dyn Clock>,
    heartbeat_interval: Duration,
    done: bool,
    sent: usize,
    limit: usize,
    last_write_at: Option<Instant>,
    sent_preamble: bool,
}

impl<T: TransportWriter> Stream<T> {
    /// Create a stream with the default encoder and heartbeat interval.
    pub fn new(transport: T) -> Self {
        Self::with_encoder(transport, TextEventEncoder::default())
    }

    /// Create a stream from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_config(transport: T, config: &StreamConfig) -> SseResult<Self> {
        config.validate().map_err(SseError::config)?;

        let mut stream = Self::with_encoder(transport, TextEventEncoder::from_config(config))
            .with_heartbeat_interval(config.heartbeat_interval);
        stream.set_limit(config.limit);
        Ok(stream)
    }
}

impl<T: TransportWriter, E: FrameEncoder> Stream<T, E> {
    /// Create a stream with a custom frame encoder.
    pub fn with_encoder(transport: T, encoder: E) -> Self {
        Self {
            transport,
            encoder,
            clock: Arc::new(TokioClock),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            done: false,
            sent: 0,
            limit: 0,
            last_write_at: None,
            sent_preamble: false,
        }
    }

    /// Replace the clock used for heartbeat pacing.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Send an application event.
    ///
    /// Establishes the preamble first. If that fails the stream is done and
    /// the event is dropped.
    pub async fn send(&mut self, event: Event) {
        if !self.try_write_preamble().await {
            return;
        }

        if let Err(err) = self.encoder.write_event(&mut self.transport, &event).await {
            warn!(error = %err, id = ?event.id, "SSE event write failed");
        }
        self.last_write_at = Some(self.clock.now());
        self.sent += 1;
    }

    /// Send a heartbeat if nothing has been written for a full heartbeat
    /// interval. More frequent calls are no-ops.
    ///
    /// A fresh stream has written nothing, so its first call always goes
    /// through (and establishes the preamble).
    pub async fn try_send_heartbeat(&mut self) {
        if let Some(last) = self.last_write_at
            && self.clock.now().saturating_duration_since(last) < self.heartbeat_interval
        {
            return;
        }

        if !self.try_write_preamble().await {
            return;
        }

        match self.encoder.write_heartbeat(&mut self.transport).await {
            Ok(()) => debug!("SSE heartbeat sent"),
            Err(err) => warn!(error = %err, "SSE heartbeat write failed"),
        }
        self.last_write_at = Some(self.clock.now());
    }

    /// Write the goodbye frame and mark the stream done.
    ///
    /// Each call writes another goodbye frame; check
    /// [`is_done`](Self::is_done) first.
    pub async fn finish(&mut self) {
        if self.try_write_preamble().await {
            let goodbye = self.encoder.goodbye();
            if let Err(err) = self.encoder.write_event(&mut self.transport, &goodbye).await {
                warn!(error = %err, "SSE goodbye write failed");
            }
            self.last_write_at = Some(self.clock.now());
            debug!(sent = self.sent, "SSE stream finished");
        }
        self.done = true;
    }

    /// Write an error event and mark the stream done, whether or not the
    /// write succeeded.
    pub async fn err(&mut self, error: impl Into<EventError>) {
        let event = Event::error(error);
        if self.try_write_preamble().await {
            if let Err(err) = self.encoder.write_event(&mut self.transport, &event).await {
                warn!(error = %err, "SSE error event write failed");
            }
            self.last_write_at = Some(self.clock.now());
        }
        self.done = true;
    }

    /// Number of application events sent.
    pub fn sent_count(&self) -> usize {
        self.sent
    }

    /// Cap the number of application events (0 = unlimited).
    ///
    /// Compared against the cumulative count, so lowering the limit below
    /// [`sent_count`](Self::sent_count) makes the stream done immediately.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// The current event limit (0 = unlimited).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns `true` if a nonzero limit has been reached.
    pub fn limit_reached(&self) -> bool {
        self.limit != 0 && self.sent >= self.limit
    }

    /// Returns `true` if the stream is finished, errored, failed to
    /// establish, or has reached its limit.
    ///
    /// Reaching the limit does not finish the stream; the producer is
    /// expected to call [`finish`](Self::finish) when it observes it.
    pub fn is_done(&self) -> bool {
        self.done || self.limit_reached()
    }

    /// Returns `true` once the preamble has been written.
    ///
    /// A stream that is done but never established wrote nothing, so the
    /// caller may still be able to answer with a plain error response.
    pub fn is_established(&self) -> bool {
        self.sent_preamble
    }

    /// The current lifecycle state.
    pub fn state(&self) -> StreamState {
        if self.is_done() {
            StreamState::Done
        } else if self.sent_preamble {
            StreamState::Established
        } else {
            StreamState::Fresh
        }
    }

    /// The configured heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consume the stream, returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Returns `true` once the transport reports the peer is gone.
    ///
    /// Independent of [`is_done`](Self::is_done): writes to a closed
    /// transport are absorbed like any other post-preamble failure.
    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Wait until the transport reports the peer is gone.
    pub async fn closed(&mut self) {
        self.transport.closed().await;
    }

    /// Whether the stream itself was terminated, ignoring the limit.
    pub(crate) fn is_terminated(&self) -> bool {
        self.done
    }

    /// Establish the preamble if needed. Returns `false` if the requested
    /// write must be skipped.
    async fn try_write_preamble(&mut self) -> bool {
        if self.sent_preamble {
            return true;
        }
        if self.done {
            // A failed preamble is never retried.
            return false;
        }

        match self.encoder.write_preamble(&mut self.transport).await {
            Ok(()) => {
                self.sent_preamble = true;
                self.last_write_at = Some(self.clock.now());
                true
            }
            Err(err) => {
                warn!(error = %err, "SSE preamble failed, closing stream");
                self.done = true;
                false
            }
        }
    }
}

impl<T, E> std::fmt::Debug for Stream<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("sent_preamble", &self.sent_preamble)
            .field("done", &self.done)
            .field("sent", &self.sent)
            .field("limit", &self.limit)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SharedStream
// ---------------------------------------------------------------------------

/// Clone-able handle serializing access to one [`Stream`] through an async
/// mutex, for an event producer and a heartbeat ticker running as separate
/// tasks.
pub struct SharedStream<T, E = TextEventEncoder> {
    inner: Arc<Mutex<Stream<T, E>>>,
}

impl<T, E> Clone for SharedStream<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: TransportWriter, E: FrameEncoder> SharedStream<T, E> {
    /// Wrap a stream.
    pub fn new(stream: Stream<T, E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    /// Lock the stream for a sequence of operations that must not
    /// interleave with other tasks (e.g. send, then check the limit).
    pub async fn lock(&self) -> MutexGuard<'_, Stream<T, E>> {
        self.inner.lock().await
    }

    /// See [`Stream::send`].
    pub async fn send(&self, event: Event) {
        self.inner.lock().await.send(event).await;
    }

    /// See [`Stream::try_send_heartbeat`].
    pub async fn try_send_heartbeat(&self) {
        self.inner.lock().await.try_send_heartbeat().await;
    }

    /// See [`Stream::finish`].
    pub async fn finish(&self) {
        self.inner.lock().await.finish().await;
    }

    /// See [`Stream::err`].
    pub async fn err(&self, error: impl Into<EventError>) {
        self.inner.lock().await.err(error).await;
    }

    /// See [`Stream::set_limit`].
    pub async fn set_limit(&self, limit: usize) {
        self.inner.lock().await.set_limit(limit);
    }

    /// See [`Stream::sent_count`].
    pub async fn sent_count(&self) -> usize {
        self.inner.lock().await.sent_count()
    }

    /// See [`Stream::is_done`].
    pub async fn is_done(&self) -> bool {
        self.inner.lock().await.is_done()
    }

    /// See [`Stream::is_established`].
    pub async fn is_established(&self) -> bool {
        self.inner.lock().await.is_established()
    }
}
