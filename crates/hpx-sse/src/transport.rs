//! Transport writers: where encoded frames go.
//!
//! A [`TransportWriter`] accepts one complete frame per call and makes it
//! visible to the peer before returning. Two implementations are provided:
//!
//! - [`IoTransport`] writes to any [`AsyncWrite`] and flushes after every frame.
//! - [`ChannelTransport`] pushes frames into a bounded channel whose receiving
//!   half, [`SseBody`], is served as an HTTP response body.

use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};

use crate::error::{SseError, SseResult};

/// Sink for encoded frames.
#[async_trait]
pub trait TransportWriter: Send {
    /// Write one frame and flush it.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be delivered to the peer.
    async fn write_frame(&mut self, frame: Bytes) -> SseResult<()>;

    /// Returns `true` once the peer is known to be gone. Every later write
    /// would fail.
    fn is_closed(&self) -> bool {
        false
    }

    /// Resolve once the peer is gone.
    ///
    /// Transports that only learn about a disconnect by writing never
    /// resolve.
    async fn closed(&mut self) {
        std::future::pending::<()>().await;
    }
}

#[async_trait]
impl<T: TransportWriter + ?Sized> TransportWriter for Box<T> {
    async fn write_frame(&mut self, frame: Bytes) -> SseResult<()> {
        (**self).write_frame(frame).await
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }

    async fn closed(&mut self) {
        (**self).closed().await;
    }
}

// ---------------------------------------------------------------------------
// IoTransport
// ---------------------------------------------------------------------------

/// Transport over a raw async writer (socket, pipe, in-memory buffer).
///
/// The writer is considered closed after a write fails with a
/// disconnect-type error (see [`SseError::is_closed`]).
#[derive(Debug)]
pub struct IoTransport<W> {
    inner: W,
    closed: bool,
}

impl<W> IoTransport<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the transport, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W> TransportWriter for IoTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_frame(&mut self, frame: Bytes) -> SseResult<()> {
        let result = async {
            self.inner.write_all(&frame).await?;
            self.inner.flush().await
        }
        .await
        .map_err(SseError::from);

        if let Err(err) = &result
            && err.is_closed()
        {
            self.closed = true;
        }
        result
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

// ---------------------------------------------------------------------------
// ChannelTransport / SseBody
// ---------------------------------------------------------------------------

/// Transport feeding an HTTP response body through a bounded channel.
///
/// Writes wait while the channel is full, so a slow client slows the
/// producer down. Once the [`SseBody`] is dropped (the server stopped
/// serving the response) every write fails with [`SseError::Closed`].
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelTransport {
    /// Create a transport and the response body it feeds.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> (Self, SseBody) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, SseBody { rx })
    }
}

#[async_trait]
impl TransportWriter for ChannelTransport {
    async fn write_frame(&mut self, frame: Bytes) -> SseResult<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| SseError::closed("response body dropped"))
    }

    // True once the body has been dropped.
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn closed(&mut self) {
        self.tx.closed().await;
    }
}

/// Response body yielding the frames written to a [`ChannelTransport`].
///
/// Ends once every transport handle has been dropped.
#[derive(Debug)]
pub struct SseBody {
    rx: mpsc::Receiver<Bytes>,
}

impl SseBody {
    /// Receive the next frame.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Body for SseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut()
            .rx
            .poll_recv(cx)
            .map(|frame| frame.map(|data| Ok(Frame::data(data))))
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}

impl futures_util::Stream for SseBody {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
